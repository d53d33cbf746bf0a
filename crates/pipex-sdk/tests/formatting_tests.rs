//! Integration tests for formatting fidelity of the written output

mod common;

use common::TestRepo;
use pipex_sdk::{expand_pipeline_to_string, insert_heredoc_separators, ExpandOptions, Pipex};

#[test]
fn test_quoted_numeric_string_stays_double_quoted() {
    let out = expand_pipeline_to_string(
        "variables:\n  key: \"42\"\n  plain: 42\nsteps:\n  - script: echo hi\n",
        &ExpandOptions::new(),
    )
    .unwrap();
    assert!(out.contains("key: \"42\"\n"));
    assert!(out.contains("plain: 42\n"));
}

#[test]
fn test_template_quotes_follow_step_context() {
    let repo = TestRepo::new().with_file(
        "lint.yml",
        r#"
steps:
  - displayName: Lint
    script: 'npm run lint'
"#,
    );
    let out = Pipex::new()
        .expand_to_string(
            "jobs:\n  - job: check\n    steps:\n      - template: lint.yml\n",
            &repo.options(),
        )
        .unwrap();
    assert!(out.contains("script: 'npm run lint'\n"));
    assert!(out.contains("displayName: Lint\n"));
}

#[test]
fn test_shorthand_step_keeps_quotes_after_normalization() {
    let out = expand_pipeline_to_string("steps:\n  - bash: 'make all'\n", &ExpandOptions::new()).unwrap();
    assert!(out.contains("task: Bash@3"));
    assert!(out.contains("script: 'make all'\n"));
}

#[test]
fn test_trailing_expression_strips_in_compatible_mode() {
    let source = r#"
parameters:
  - name: target
    default: app
steps:
  - script: |
      make build
      make ${{ parameters.target }}
"#;
    let repo = TestRepo::new();
    let compatible = repo.expand_azure(source);
    assert!(compatible.contains("script: |-\n"));
    assert!(compatible.contains("make app\n"));

    let standard = repo.expand(source).to_yaml_string();
    assert!(standard.contains("script: |\n"));
}

#[test]
fn test_folded_heredoc_is_separated_and_stable() {
    let source = r#"
steps:
  - bash: >
      cat <<EOF > out.txt

      line one

      EOF
"#;
    let repo = TestRepo::new();
    let first = repo.expand_azure(source);
    assert!(first.contains("script: >\n"));
    assert!(first.contains("out.txt\n\n"));
    assert!(first.contains("line one\n\n"));

    let second = repo.expand_azure(&first);
    assert_eq!(first, second);
}

#[test]
fn test_heredoc_separators_are_idempotent() {
    let script = "set -e\ncat <<-'SQL' | psql\nselect 1;\nselect 2;\nSQL\necho ok";
    let once = insert_heredoc_separators(script);
    assert_eq!(
        once,
        "set -e\ncat <<-'SQL' | psql\n\nselect 1;\n\nselect 2;\n\nSQL\necho ok"
    );
    assert_eq!(insert_heredoc_separators(&once), once);
}

#[test]
fn test_output_reparses_to_same_document() {
    let source = r#"
trigger:
  branches:
    include:
      - main
      - 'release/*'
variables:
  empty: ''
  version: '1.0'
stages:
  - stage: Build
    jobs:
      - job: compile
        pool: ubuntu-latest
        steps:
          - checkout: self
            clean: true
          - script: |
              echo "building"
              echo done
            displayName: 'Build: all'
"#;
    let pipex = Pipex::new();
    let first = pipex.expand_str(source, &ExpandOptions::new()).unwrap();
    let yaml = first.to_yaml_string();
    assert!(yaml.contains("- 'release/*'\n"));
    assert!(yaml.contains("empty: ''\n"));
    assert!(yaml.contains("displayName: 'Build: all'\n"));

    let second = pipex.expand_str(&yaml, &ExpandOptions::new()).unwrap();
    assert_eq!(first.document, second.document);
}
