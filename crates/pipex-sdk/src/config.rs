//! Configuration types for pipeline expansion

use crate::error::{Result, SdkError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Caller overrides for one expansion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct ExpandOptions {
    /// Merged over the root document's parameter defaults
    pub parameters: Map<String, JsonValue>,

    /// Seeded before expansion; the document cannot overwrite them
    pub variables: Map<String, JsonValue>,

    /// Merged into the document's `resources`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<JsonValue>,

    /// Initial loop-style bindings
    pub locals: Map<String, JsonValue>,

    /// Directory relative template paths resolve against
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<PathBuf>,

    /// Name of the root document, used for diagnostics and as the
    /// base directory fallback
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,

    /// Root for repository-relative template paths
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_base_dir: Option<PathBuf>,

    /// Repository alias to local directory
    pub resource_locations: HashMap<String, String>,

    /// Seed labels for the template call stack in error messages
    pub template_stack: Vec<String>,

    /// Apply the target service's block-scalar conventions on output
    pub azure_compatible: bool,
}

impl ExpandOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter override
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    /// Set a variable override
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn with_local(mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.locals.insert(name.into(), value.into());
        self
    }

    /// Set resource overrides, e.g. `{"repositories": [...]}`
    pub fn with_resources(mut self, resources: JsonValue) -> Self {
        self.resources = Some(resources);
        self
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn with_repository_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.repository_base_dir = Some(dir.into());
        self
    }

    /// Map a repository alias to a local directory
    pub fn with_resource_location(mut self, alias: impl Into<String>, path: impl Into<String>) -> Self {
        self.resource_locations.insert(alias.into(), path.into());
        self
    }

    pub fn with_template_stack(mut self, stack: Vec<String>) -> Self {
        self.template_stack = stack;
        self
    }

    pub fn azure_compatible(mut self, enable: bool) -> Self {
        self.azure_compatible = enable;
        self
    }

    /// Load options from YAML text
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).map_err(|e| SdkError::ConfigError(e.to_string()))
    }

    /// Load options from JSON text
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| SdkError::ConfigError(e.to_string()))
    }

    /// Load options from a `.json`, `.yml` or `.yaml` file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        let result = if is_json {
            Self::from_json_str(&text)
        } else {
            Self::from_yaml_str(&text)
        };
        result.map_err(|e| match e {
            SdkError::ConfigError(message) => {
                SdkError::ConfigError(format!("{}: {}", path.display(), message))
            }
            other => other,
        })
    }

    /// Directory the root document resolves templates against
    pub fn resolved_base_dir(&self, document_path: Option<&Path>) -> PathBuf {
        if let Some(dir) = &self.base_dir {
            return dir.clone();
        }
        let from_name = self.file_name.as_deref().map(Path::new);
        document_path
            .or(from_name)
            .and_then(Path::parent)
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
