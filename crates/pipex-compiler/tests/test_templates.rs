//! Integration tests for template resolution
//!
//! Each test lays out a small repository in a temp directory and expands
//! a root document that references templates in it.

use pipex_compiler::{CompileError, Expander, MAX_TEMPLATE_DEPTH};
use pipex_core::{Mapping, Value};
use pipex_parser::YamlParser;
use pipex_runtime::{ExecutionContext, RepositoryEntry, Resources, Session};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write(dir: &Path, relative: &str, content: &str) {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

fn expand(root: &str, ctx: &ExecutionContext) -> Result<Value, CompileError> {
    let session = Session::new();
    let expander = Expander::new(&session);
    expander.expand_document(&YamlParser::parse(root).unwrap(), ctx)
}

fn script_of(step: &Value) -> Option<&Value> {
    step.get("inputs").and_then(|i| i.get("script"))
}

#[test]
fn test_step_template_with_parameters() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "templates/build.yml",
        r#"
parameters:
  - name: config
    type: string
    default: debug
  - name: extraSteps
    type: stepList
    default: []
steps:
  - script: build --config ${{ parameters.config }}
  - ${{ parameters.extraSteps }}
"#,
    );

    let root = r#"
steps:
  - template: templates/build.yml
    parameters:
      config: release
      extraSteps:
        - script: echo extra
  - script: echo after
"#;
    let ctx = ExecutionContext::new(dir.path());
    let out = expand(root, &ctx).unwrap();
    let steps = out.get("steps").unwrap().as_sequence().unwrap();

    assert_eq!(steps.len(), 3);
    assert_eq!(script_of(&steps[0]), Some(&Value::string("build --config release")));
    assert_eq!(script_of(&steps[1]), Some(&Value::string("echo extra")));
    assert_eq!(script_of(&steps[2]), Some(&Value::string("echo after")));
}

#[test]
fn test_nested_template_paths_are_relative_to_includer() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "ci/jobs/job.yml",
        "jobs:\n  - job: build\n    steps:\n      - template: ../steps/common.yml\n",
    );
    write(dir.path(), "ci/steps/common.yml", "steps:\n  - bash: echo common\n");

    let out = expand("jobs:\n  - template: ci/jobs/job.yml\n", &ExecutionContext::new(dir.path())).unwrap();
    let jobs = out.get("jobs").unwrap().as_sequence().unwrap();
    let steps = jobs[0].get("steps").unwrap().as_sequence().unwrap();
    assert_eq!(steps[0].get("task"), Some(&Value::string("Bash@3")));
}

#[test]
fn test_parameter_contract_violation() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "t.yml",
        "parameters:\n  - name: build\n    type: number\nsteps: []\n",
    );

    let err = expand(
        "steps:\n  - template: t.yml\n    parameters:\n      build: abc\n      bogus: 1\n",
        &ExecutionContext::new(dir.path()),
    )
    .unwrap_err();
    match err {
        CompileError::ParameterValidation(err) => {
            assert_eq!(err.unknown(), vec!["bogus"]);
            assert!(err.to_string().contains("'build' expects number, got string"));
        }
        other => panic!("expected a validation error, got {other}"),
    }
}

#[test]
fn test_runtime_placeholder_passes_contract() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "t.yml",
        "parameters:\n  - name: build\n    type: number\nsteps:\n  - script: echo ${{ parameters.build }}\n",
    );

    let root = "parameters:\n  - name: build\n    type: number\nsteps:\n  - template: t.yml\n    parameters:\n      build: ${{ parameters.build }}\n";
    let out = expand(root, &ExecutionContext::new(dir.path())).unwrap();
    let steps = out.get("steps").unwrap().as_sequence().unwrap();
    assert_eq!(script_of(&steps[0]), Some(&Value::string("echo $(build)")));
}

#[test]
fn test_repository_template_through_resource_locations() {
    let dir = TempDir::new().unwrap();
    let shared = dir.path().join("shared");
    write(&shared, "a/b.yml", "steps:\n  - script: from shared\n");

    let mut locations = HashMap::new();
    locations.insert("tpl".to_string(), shared.display().to_string());
    let ctx = ExecutionContext::new(dir.path().join("pipelines"))
        .with_resources(Resources {
            repositories: vec![RepositoryEntry::new("tpl").with_name("org/tpl")],
            other: Mapping::new(),
        })
        .with_resource_locations(locations);

    let out = expand("steps:\n  - template: a/b.yml@tpl\n", &ctx).unwrap();
    let steps = out.get("steps").unwrap().as_sequence().unwrap();
    assert_eq!(script_of(&steps[0]), Some(&Value::string("from shared")));
}

#[test]
fn test_root_relative_path_inside_repository() {
    let dir = TempDir::new().unwrap();
    let repo = dir.path().join("repo");
    write(&repo, "templates/outer.yml", "steps:\n  - template: /common/inner.yml\n");
    write(&repo, "common/inner.yml", "steps:\n  - script: inner\n");

    let ctx = ExecutionContext::new(dir.path()).with_resources(Resources {
        repositories: vec![RepositoryEntry::new("templates").with_location(repo.display().to_string())],
        other: Mapping::new(),
    });
    let out = expand("steps:\n  - template: templates/outer.yml@templates\n", &ctx).unwrap();
    let steps = out.get("steps").unwrap().as_sequence().unwrap();
    assert_eq!(script_of(&steps[0]), Some(&Value::string("inner")));
}

#[test]
fn test_missing_template_lists_candidates() {
    let dir = TempDir::new().unwrap();
    let err = expand("steps:\n  - template: nope.yml\n", &ExecutionContext::new(dir.path())).unwrap_err();
    match err {
        CompileError::TemplateNotFound { template, candidates, .. } => {
            assert_eq!(template, "nope.yml");
            assert!(candidates.iter().any(|c| c.ends_with("nope.yml")));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_self_reference_hits_depth_limit() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "loop.yml", "steps:\n  - template: loop.yml\n");

    let root_dir = dir.path().to_path_buf();
    // Each nesting level costs several stack frames
    let err = std::thread::Builder::new()
        .stack_size(32 * 1024 * 1024)
        .spawn(move || {
            expand("steps:\n  - template: loop.yml\n", &ExecutionContext::new(root_dir))
                .unwrap_err()
                .to_string()
        })
        .unwrap()
        .join()
        .unwrap();
    assert!(err.contains("exceeds the maximum nesting depth of 100"));
    assert!(err.contains("Template call stack:"));
}

#[test]
fn test_depth_error_carries_stack() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "loop.yml", "steps:\n  - template: loop.yml\n");
    let root_dir = dir.path().to_path_buf();
    let (limit, depth) = std::thread::Builder::new()
        .stack_size(32 * 1024 * 1024)
        .spawn(move || {
            let session = Session::new();
            let expander = Expander::new(&session);
            let root = YamlParser::parse("steps:\n  - template: loop.yml\n").unwrap();
            match expander.expand_document(&root, &ExecutionContext::new(root_dir)) {
                Err(CompileError::TemplateDepthExceeded { limit, stack, .. }) => (limit, stack.len()),
                other => panic!("unexpected result: {:?}", other.map(|_| ())),
            }
        })
        .unwrap()
        .join()
        .unwrap();
    assert_eq!(limit, MAX_TEMPLATE_DEPTH);
    assert_eq!(depth, MAX_TEMPLATE_DEPTH);
}

#[test]
fn test_template_variables_visible_to_later_entries() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "vars.yml",
        "variables:\n  - name: toolVersion\n    value: '1.2'\n",
    );

    let root = r#"
variables:
  - template: vars.yml
steps:
  - ${{ if eq(variables.toolVersion, '1.2') }}:
    - script: pinned
"#;
    let out = expand(root, &ExecutionContext::new(dir.path())).unwrap();
    let steps = out.get("steps").unwrap().as_sequence().unwrap();
    assert_eq!(steps.len(), 1);
    assert_eq!(
        out.get("variables").and_then(Value::as_sequence).map(Vec::len),
        Some(1)
    );
}

#[test]
fn test_each_over_template_parameter() {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "matrix.yml",
        r#"
parameters:
  - name: platforms
    type: object
jobs:
  - ${{ each p in parameters.platforms }}:
    - job: build_${{ p }}
      pool: ${{ p }}-pool
"#,
    );

    let root = "jobs:\n  - template: matrix.yml\n    parameters:\n      platforms: [linux, mac, windows]\n";
    let out = expand(root, &ExecutionContext::new(dir.path())).unwrap();
    let jobs = out.get("jobs").unwrap().as_sequence().unwrap();
    assert_eq!(jobs.len(), 3);
    assert_eq!(jobs[2].get("job"), Some(&Value::string("build_windows")));
    assert_eq!(
        jobs[0].get("pool").and_then(|p| p.get("name")),
        Some(&Value::string("linux-pool"))
    );
}
