//! Pipex - main API for expanding pipeline documents

use crate::config::ExpandOptions;
use crate::emitter;
use crate::error::Result;
use crate::fidelity::{restore_styles, StylePlan};
use pipex_compiler::{default_parameters, CompileError, Expander};
use pipex_core::{BlockScalarHints, Mapping, StyleRecords, Value};
use pipex_parser::YamlParser;
use pipex_runtime::{ExecutionContext, Resources, Session};
use std::path::Path;

/// A fully expanded pipeline with the formatting facts needed to write it
#[derive(Debug, Clone)]
pub struct ExpandedPipeline {
    pub document: Value,
    pub styles: StyleRecords,
    pub block_hints: BlockScalarHints,
    pub azure_compatible: bool,
}

impl ExpandedPipeline {
    /// Output decisions for every restyled scalar
    pub fn style_plan(&self) -> StylePlan {
        restore_styles(
            &self.document,
            &self.styles,
            &self.block_hints,
            self.azure_compatible,
        )
    }

    /// Render as YAML, restoring source formatting where recorded
    pub fn to_yaml_string(&self) -> String {
        emitter::to_yaml_string(&self.document, &self.style_plan())
    }

    pub fn to_json(&self) -> serde_json::Value {
        self.document.to_json()
    }
}

/// Pipeline expander.
///
/// Owns the `Session` that caches parsed expressions and holds `counter`
/// state. Counters keep counting across expansions on the same instance
/// until `reset` is called.
pub struct Pipex {
    session: Session,
}

impl Pipex {
    pub fn new() -> Self {
        Self {
            session: Session::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Clear cached expressions and counters
    pub fn reset(&self) {
        self.session.reset();
    }

    /// Expand the pipeline at `path`
    pub fn expand_file(&self, path: impl AsRef<Path>, options: &ExpandOptions) -> Result<ExpandedPipeline> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| CompileError::Io {
            path: path.display().to_string(),
            source,
        })?;
        self.expand_source(&source, Some(path), options)
    }

    /// Expand pipeline text
    pub fn expand_str(&self, source: &str, options: &ExpandOptions) -> Result<ExpandedPipeline> {
        self.expand_source(source, None, options)
    }

    /// Expand pipeline text and render the result as YAML
    pub fn expand_to_string(&self, source: &str, options: &ExpandOptions) -> Result<String> {
        Ok(self.expand_str(source, options)?.to_yaml_string())
    }

    fn expand_source(
        &self,
        source: &str,
        document_path: Option<&Path>,
        options: &ExpandOptions,
    ) -> Result<ExpandedPipeline> {
        let label = document_path
            .map(|p| p.display().to_string())
            .or_else(|| options.file_name.clone())
            .unwrap_or_else(|| "<inline>".to_string());

        let parsed = YamlParser::parse_with_styles(source, true).map_err(|source| CompileError::Parse {
            path: label.clone(),
            source,
        })?;

        let mut parameters = default_parameters(&parsed.root);
        for (name, value) in &options.parameters {
            parameters.insert(name.clone(), Value::from_json(value));
        }

        let mut resources = Resources::from_value(parsed.root.get("resources"))?;
        if let Some(overrides) = &options.resources {
            resources.merge(&Resources::from_value(Some(&Value::from_json(overrides)))?);
        }

        let base_dir = options.resolved_base_dir(document_path);
        tracing::debug!(
            document = %label,
            base_dir = %base_dir.display(),
            parameters = parameters.len(),
            "expanding pipeline"
        );

        let ctx = ExecutionContext::new(base_dir)
            .with_parameters(parameters)
            .with_pinned_variables(json_mapping(&options.variables))
            .with_resources(resources)
            .with_locals(json_mapping(&options.locals))
            .with_repository_base_dir(options.repository_base_dir.clone())
            .with_resource_locations(options.resource_locations.clone())
            .with_template_stack(options.template_stack.clone())
            .with_styles(parsed.styles);

        let expander = Expander::new(&self.session);
        let document = expander.expand_document(&parsed.root, &ctx)?;
        tracing::info!(
            document = %label,
            templates = expander.cached_templates(),
            "pipeline expanded"
        );

        let formatting = ctx.formatting.borrow().clone();
        Ok(ExpandedPipeline {
            document,
            styles: formatting.styles,
            block_hints: formatting.blocks,
            azure_compatible: options.azure_compatible,
        })
    }
}

impl Default for Pipex {
    fn default() -> Self {
        Self::new()
    }
}

/// Expand the pipeline at `path` with a fresh session
pub fn expand_pipeline_from_file(path: impl AsRef<Path>, options: &ExpandOptions) -> Result<ExpandedPipeline> {
    Pipex::new().expand_file(path, options)
}

/// Expand pipeline text with a fresh session and render it as YAML
pub fn expand_pipeline_to_string(source: &str, options: &ExpandOptions) -> Result<String> {
    Pipex::new().expand_to_string(source, options)
}

fn json_mapping(map: &serde_json::Map<String, serde_json::Value>) -> Mapping {
    map.iter()
        .map(|(k, v)| (k.clone(), Value::from_json(v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_inline_with_parameter_override() {
        let source = "parameters:\n  - name: env\n    default: dev\nsteps:\n  - script: deploy ${{ parameters.env }}\n";
        let pipex = Pipex::new();

        let out = pipex.expand_str(source, &ExpandOptions::new()).unwrap();
        assert_eq!(
            out.document.get("steps").unwrap().as_sequence().unwrap()[0]
                .get("inputs")
                .and_then(|i| i.get("script")),
            Some(&Value::string("deploy dev"))
        );

        let out = pipex
            .expand_str(source, &ExpandOptions::new().with_parameter("env", "prod"))
            .unwrap();
        assert!(out.to_yaml_string().contains("script: deploy prod"));
        assert!(out.document.get("parameters").is_none());
    }

    #[test]
    fn test_parse_error_names_document() {
        let err = Pipex::new()
            .expand_str("a: [1, 2\n", &ExpandOptions::new().with_file_name("ci.yml"))
            .unwrap_err();
        assert!(err.to_string().contains("ci.yml"));
    }

    #[test]
    fn test_resource_overrides_merge() {
        let source = "resources:\n  repositories:\n    - repository: tpl\n      name: org/tpl\nsteps: []\n";
        let options = ExpandOptions::new().with_resources(serde_json::json!({
            "repositories": [{"repository": "extra", "name": "org/extra"}]
        }));
        let out = Pipex::new().expand_str(source, &options).unwrap();
        assert!(out.document.get("resources").is_some());
    }
}
