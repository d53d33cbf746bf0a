//! Integration tests for `extends` and root-level expansion

use pipex_compiler::Expander;
use pipex_core::{Mapping, Value};
use pipex_parser::YamlParser;
use pipex_runtime::{ExecutionContext, Session};
use std::fs;
use tempfile::TempDir;

fn expand(root: &str, ctx: &ExecutionContext) -> Value {
    let session = Session::new();
    let expander = Expander::new(&session);
    expander
        .expand_document(&YamlParser::parse(root).unwrap(), ctx)
        .unwrap()
}

#[test]
fn test_extends_merges_template_root() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("base.yml"),
        r#"
parameters:
  - name: stageName
    default: Build
stages:
  - stage: ${{ parameters.stageName }}
    jobs:
      - job: main
        steps:
          - script: echo ${{ variables.flavor }}
"#,
    )
    .unwrap();

    let root = r#"
trigger: none
variables:
  flavor: nightly
extends:
  template: base.yml
  parameters:
    stageName: Package
"#;
    let out = expand(root, &ExecutionContext::new(dir.path()));
    let map = out.as_mapping().unwrap();

    assert!(!map.contains_key("extends"));
    assert_eq!(
        map.keys().cloned().collect::<Vec<_>>(),
        vec!["trigger", "variables", "stages"]
    );
    let stage = &map.get("stages").unwrap().as_sequence().unwrap()[0];
    assert_eq!(stage.get("stage"), Some(&Value::string("Package")));

    let step = &stage.get("jobs").unwrap().as_sequence().unwrap()[0]
        .get("steps")
        .unwrap()
        .as_sequence()
        .unwrap()[0];
    assert_eq!(
        step.get("inputs").and_then(|i| i.get("script")),
        Some(&Value::string("echo nightly"))
    );
}

#[test]
fn test_caller_variables_are_pinned() {
    let mut pinned = Mapping::new();
    pinned.insert("flavor", Value::string("override"));
    let ctx = ExecutionContext::new(".").with_pinned_variables(pinned);

    let out = expand(
        "variables:\n  flavor: nightly\nsteps:\n  - script: echo ${{ variables.flavor }}\n",
        &ctx,
    );
    let steps = out.get("steps").unwrap().as_sequence().unwrap();
    assert_eq!(
        steps[0].get("inputs").and_then(|i| i.get("script")),
        Some(&Value::string("echo override"))
    );
    // The document still carries what it declared
    assert_eq!(
        out.get("variables").and_then(|v| v.get("flavor")),
        Some(&Value::string("nightly"))
    );
}

#[test]
fn test_conditional_expansion_is_idempotent() {
    let root = r#"
steps:
  - ${{ if eq(parameters.os, 'linux') }}:
    - bash: echo linux
  - ${{ else }}:
    - pwsh: echo other
"#;
    let mut params = Mapping::new();
    params.insert("os", Value::string("linux"));
    let ctx = ExecutionContext::new(".").with_parameters(params);

    let session = Session::new();
    let expander = Expander::new(&session);
    let once = expander
        .expand_document(&YamlParser::parse(root).unwrap(), &ctx)
        .unwrap();
    let twice = expander.expand_document(&once, &ctx).unwrap();

    assert_eq!(once, twice);
    assert_eq!(once.get("steps").unwrap().as_sequence().unwrap().len(), 1);
}

#[test]
fn test_each_yields_one_entry_per_element() {
    let root = r#"
jobs:
  - ${{ each size in parameters.sizes }}:
    - job: test_${{ size }}
      displayName: Test ${{ sizeIndex }}
"#;
    let sizes: Vec<Value> = ["s", "m", "l", "xl"].iter().map(|s| Value::string(*s)).collect();
    let mut params = Mapping::new();
    params.insert("sizes", Value::Sequence(sizes));
    let out = expand(root, &ExecutionContext::new(".").with_parameters(params));

    let jobs = out.get("jobs").unwrap().as_sequence().unwrap();
    assert_eq!(jobs.len(), 4);
    assert_eq!(jobs[3].get("displayName"), Some(&Value::string("Test 3")));
}

#[test]
fn test_counter_is_shared_within_one_expansion() {
    let root = "a: ${{ counter('v', 10) }}\nb: ${{ counter('v', 10) }}\n";
    let out = expand(root, &ExecutionContext::new("."));
    assert_eq!(out.get("a"), Some(&Value::Number(10.0)));
    assert_eq!(out.get("b"), Some(&Value::Number(11.0)));
}
