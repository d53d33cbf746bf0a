//! Template resolver
//!
//! Locates, loads and expands the template behind a `template:`
//! reference. Call-site parameters are expanded in the caller's frame,
//! checked against the template's declarations, merged over its
//! defaults, and the template body is then expanded in a fresh frame.

use crate::error::{CompileError, Result};
use crate::expander::{Expander, Mode};
use crate::normalize::Position;
use crate::repository::{repository_root, TemplatePath};
use crate::validator::{call_site_parameters, default_parameters, validate_template_parameters};
use pipex_core::{Mapping, Value};
use pipex_parser::{ParsedDocument, YamlParser};
use pipex_runtime::ExecutionContext;
use std::path::{Path, PathBuf};

/// Nesting limit for template references
pub const MAX_TEMPLATE_DEPTH: usize = 100;

/// Keys a template body is taken from, in priority order
const BODY_KEYS: [&str; 8] = [
    "stages",
    "jobs",
    "steps",
    "variables",
    "stage",
    "job",
    "deployment",
    "deployments",
];

/// Template resolver
pub struct TemplateResolver<'e, 's> {
    expander: &'e Expander<'s>,
}

impl<'e, 's> TemplateResolver<'e, 's> {
    pub fn new(expander: &'e Expander<'s>) -> Self {
        Self { expander }
    }

    /// Items a template reference contributes to the enclosing sequence
    pub fn resolve(&self, reference: &Mapping, ctx: &ExecutionContext) -> Result<Vec<Value>> {
        let (_, expanded) = self.load_and_expand(reference, ctx)?;

        Ok(match expanded {
            Value::Mapping(mut map) => {
                let body = BODY_KEYS
                    .iter()
                    .find(|k| map.contains_key(k))
                    .and_then(|k| map.remove(k));
                match body {
                    Some(Value::Sequence(items)) => items,
                    Some(Value::Null) => Vec::new(),
                    Some(other) => vec![other],
                    None if map.is_empty() => Vec::new(),
                    None => vec![Value::Mapping(map)],
                }
            }
            Value::Sequence(items) => items,
            Value::Null => Vec::new(),
            other => vec![other],
        })
    }

    /// Root mapping of a template used through `extends`
    pub fn resolve_document(&self, reference: &Mapping, ctx: &ExecutionContext) -> Result<Mapping> {
        let (label, expanded) = self.load_and_expand(reference, ctx)?;
        match expanded {
            Value::Mapping(map) => Ok(map),
            Value::Null => Ok(Mapping::new()),
            other => Err(CompileError::InvalidDocument(format!(
                "extended template '{}' must be a mapping, got {}",
                label,
                other.type_name()
            ))),
        }
    }

    fn load_and_expand(&self, reference: &Mapping, ctx: &ExecutionContext) -> Result<(String, Value)> {
        let evaluator = self.expander.evaluator();
        let raw = reference
            .get("template")
            .map(Value::to_display_string)
            .unwrap_or_default();
        let label = evaluator.interpolate(&raw, ctx).text.trim().to_string();

        if ctx.depth() >= MAX_TEMPLATE_DEPTH {
            return Err(CompileError::TemplateDepthExceeded {
                template: label,
                limit: MAX_TEMPLATE_DEPTH,
                stack: ctx.template_stack.clone(),
            });
        }

        let template_path = TemplatePath::parse(&label);
        let repository = match &template_path.alias {
            Some(alias) => Some(repository_root(alias, &label, ctx, evaluator)?),
            None => None,
        };
        let file = self.locate(&template_path, repository.as_deref(), &label, ctx)?;
        let document = self.load(&file)?;
        ctx.merge_styles(document.styles);

        let call_site = match reference.get("parameters") {
            Some(params) => Some(self.expander.expand_node(
                params,
                ctx,
                Position::Value("parameters"),
                Mode::Parameters,
            )?),
            None => None,
        };
        let provided = call_site_parameters(call_site.as_ref());
        validate_template_parameters(&document.root, &provided, &label, ctx)?;

        let mut parameters = default_parameters(&document.root);
        parameters.merge(provided);

        let base_dir = file
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| ctx.base_dir.clone());
        let repository_base_dir = repository.or_else(|| ctx.repository_base_dir.clone());
        let frame = ctx.template_frame(parameters, base_dir, repository_base_dir, label.clone());

        tracing::debug!(
            template = %label,
            path = %file.display(),
            depth = frame.depth(),
            "expanding template"
        );

        let body = match document.root {
            Value::Mapping(mut map) => {
                map.remove("parameters");
                Value::Mapping(map)
            }
            other => other,
        };
        let expanded = self
            .expander
            .expand_node(&body, &frame, Position::Root, Mode::Resolve)?;
        Ok((label, expanded))
    }

    /// First candidate location that holds a file
    fn locate(
        &self,
        template_path: &TemplatePath,
        repository: Option<&Path>,
        label: &str,
        ctx: &ExecutionContext,
    ) -> Result<PathBuf> {
        let candidates = template_path.candidates(repository, ctx);
        for candidate in &candidates {
            tracing::debug!(candidate = %candidate.display(), "checking template location");
            if candidate.is_file() {
                return Ok(candidate.clone());
            }
        }
        Err(CompileError::TemplateNotFound {
            template: label.to_string(),
            candidates,
            stack: ctx.template_stack.clone(),
        })
    }

    fn load(&self, file: &Path) -> Result<ParsedDocument> {
        if let Some(document) = self.expander.cached_template(file) {
            return Ok(document);
        }

        let path = file.display().to_string();
        let source = std::fs::read_to_string(file).map_err(|e| CompileError::Io {
            path: path.clone(),
            source: e,
        })?;
        let document = YamlParser::parse_with_styles(&source, false)
            .map_err(|e| CompileError::Parse { path, source: e })?;

        self.expander.cache_template(file.to_path_buf(), document.clone());
        Ok(document)
    }
}
