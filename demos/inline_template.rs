//! Inline template example
//!
//! This example demonstrates:
//! - A step template with a typed parameter contract
//! - Conditional and loop directives
//! - Writing the result with the source quoting restored

use pipex_sdk::{ExpandOptions, Pipex};
use serde_json::json;
use std::fs;

const TEMPLATE: &str = r#"
parameters:
  - name: runtimes
    type: object
    default: []
  - name: publish
    type: boolean
    default: false
steps:
  - ${{ each runtime in parameters.runtimes }}:
    - script: cargo +${{ runtime }} test --workspace
      displayName: 'Test on ${{ runtime }}'
  - ${{ if parameters.publish }}:
    - script: cargo publish --dry-run
"#;

const PIPELINE: &str = r#"
trigger:
  branches:
    include:
      - main
parameters:
  - name: publish
    type: boolean
    default: false
jobs:
  - job: test
    pool: ubuntu-latest
    steps:
      - checkout: self
        fetchDepth: 1
      - template: templates/test.yml
        parameters:
          runtimes: [stable, beta]
          publish: ${{ parameters.publish }}
"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    println!("=== Inline Template Example ===\n");

    let dir = tempfile::tempdir()?;
    fs::create_dir_all(dir.path().join("templates"))?;
    fs::write(dir.path().join("templates/test.yml"), TEMPLATE)?;

    let pipex = Pipex::new();
    let options = ExpandOptions::new()
        .with_base_dir(dir.path())
        .with_file_name("azure-pipelines.yml");

    println!("--- Default parameters ---");
    println!("{}", pipex.expand_to_string(PIPELINE, &options)?);

    println!("--- With publish enabled ---");
    let options = options.with_parameter("publish", json!(true));
    println!("{}", pipex.expand_to_string(PIPELINE, &options)?);

    Ok(())
}
