//! Expand a pipeline file
//!
//! Usage: cargo run --example expand_file -- <pipeline.yml> [options.yml]
//!
//! Set `RUST_LOG=pipex_compiler=debug` to see template resolution.

use anyhow::Context;
use pipex_sdk::{ExpandOptions, Pipex};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pipex_sdk=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(pipeline) = args.next() else {
        eprintln!("usage: expand_file <pipeline.yml> [options.yml]");
        std::process::exit(2);
    };
    let options = match args.next() {
        Some(path) => ExpandOptions::from_file(&path).with_context(|| format!("loading options from {}", path))?,
        None => ExpandOptions::new(),
    };

    let expanded = Pipex::new()
        .expand_file(&pipeline, &options)
        .with_context(|| format!("expanding {}", pipeline))?;
    print!("{}", expanded.to_yaml_string());
    Ok(())
}
