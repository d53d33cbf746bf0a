//! Common test utilities for SDK integration tests

#![allow(dead_code)]

use pipex_sdk::{ExpandOptions, ExpandedPipeline, Pipex, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A throwaway repository of pipeline files
pub struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    /// Write a file relative to the repository root
    pub fn with_file(self, relative: &str, content: &str) -> Self {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content.trim_start()).unwrap();
        self
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn file(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    /// Options rooted at this repository
    pub fn options(&self) -> ExpandOptions {
        ExpandOptions::new().with_base_dir(self.dir.path())
    }

    pub fn expand(&self, source: &str) -> ExpandedPipeline {
        Pipex::new().expand_str(source, &self.options()).unwrap()
    }

    pub fn expand_azure(&self, source: &str) -> String {
        Pipex::new()
            .expand_to_string(source, &self.options().azure_compatible(true))
            .unwrap()
    }
}

/// `inputs.script` of the step at `index`
pub fn step_script(pipeline: &ExpandedPipeline, index: usize) -> Option<String> {
    pipeline
        .document
        .get("steps")
        .and_then(Value::as_sequence)
        .and_then(|steps| steps.get(index))
        .and_then(|step| step.get("inputs"))
        .and_then(|inputs| inputs.get("script"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

pub fn step_count(pipeline: &ExpandedPipeline) -> usize {
    pipeline
        .document
        .get("steps")
        .and_then(Value::as_sequence)
        .map_or(0, Vec::len)
}
