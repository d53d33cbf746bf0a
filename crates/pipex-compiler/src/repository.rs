//! Template path and repository location resolution

use crate::error::{CompileError, Result};
use pipex_runtime::{Evaluator, ExecutionContext};
use std::path::{Path, PathBuf};

/// Alias naming the repository of the current document
pub const SELF_ALIAS: &str = "self";

/// A template reference split into file path and repository alias
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplatePath {
    pub path: String,
    /// `None` for local templates and `@self`
    pub alias: Option<String>,
}

impl TemplatePath {
    /// Split on the last `@`
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        match raw.rsplit_once('@') {
            Some((path, alias)) if !path.is_empty() => {
                let alias = alias.trim();
                Self {
                    path: path.trim().to_string(),
                    alias: (!alias.is_empty() && alias != SELF_ALIAS).then(|| alias.to_string()),
                }
            }
            _ => Self {
                path: raw.to_string(),
                alias: None,
            },
        }
    }

    fn relative(&self) -> &str {
        self.path.trim_start_matches(['/', '\\'])
    }

    fn is_root_relative(&self) -> bool {
        self.path.starts_with('/') || self.path.starts_with('\\')
    }

    /// Ordered file locations to try
    pub fn candidates(&self, repository_root: Option<&Path>, ctx: &ExecutionContext) -> Vec<PathBuf> {
        let relative = self.relative();
        let mut candidates = Vec::new();

        match repository_root {
            Some(root) => {
                candidates.push(root.join(relative));
                if !self.is_root_relative() {
                    candidates.push(ctx.base_dir.join(relative));
                }
            }
            None if self.is_root_relative() => {
                let root = ctx.repository_base_dir.as_deref().unwrap_or(ctx.root_dir.as_path());
                candidates.push(root.join(relative));
                candidates.push(PathBuf::from(&self.path));
            }
            None => {
                candidates.push(ctx.base_dir.join(relative));
                if let Some(repo) = &ctx.repository_base_dir {
                    candidates.push(repo.join(relative));
                }
                candidates.push(PathBuf::from(relative));
            }
        }

        let mut unique: Vec<PathBuf> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if !unique.contains(&candidate) {
                unique.push(candidate);
            }
        }
        unique
    }
}

/// Local root directory of the repository behind `alias`.
///
/// Document entries come first; `resourceLocations` only fills in an
/// entry without a location of its own, or stands in for an alias the
/// document never declared.
pub fn repository_root(
    alias: &str,
    template: &str,
    ctx: &ExecutionContext,
    evaluator: &Evaluator<'_>,
) -> Result<PathBuf> {
    let location = match ctx.resources.find(alias) {
        Some(entry) => entry
            .location
            .clone()
            .filter(|l| !l.trim().is_empty())
            .or_else(|| ctx.resource_locations.get(alias).cloned())
            .or_else(|| {
                entry
                    .name
                    .as_ref()
                    .and_then(|name| ctx.resource_locations.get(name).cloned())
            })
            .or_else(|| entry.local_location().map(str::to_string))
            .ok_or_else(|| CompileError::TemplateNotFound {
                template: template.to_string(),
                candidates: Vec::new(),
                stack: ctx.template_stack.clone(),
            })?,
        None => ctx
            .resource_locations
            .get(alias)
            .cloned()
            .ok_or_else(|| CompileError::RepositoryResolution {
                alias: alias.to_string(),
                template: template.to_string(),
            })?,
    };

    let location = evaluator.interpolate(&location, ctx).text;
    let root = absolutize(&expand_home(location.trim()), &ctx.root_dir);
    tracing::debug!(alias = %alias, root = %root.display(), "resolved repository location");
    Ok(root)
}

/// Expand a leading `~` to the home directory
pub fn expand_home(path: &str) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with(['/', '\\']) => rest,
        _ => return PathBuf::from(path),
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest.trim_start_matches(['/', '\\'])),
        None => PathBuf::from(path),
    }
}

fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipex_runtime::{RepositoryEntry, Resources, Session};
    use std::collections::HashMap;

    #[test]
    fn test_parse_template_path() {
        assert_eq!(
            TemplatePath::parse("build/steps.yml@templates"),
            TemplatePath {
                path: "build/steps.yml".to_string(),
                alias: Some("templates".to_string()),
            }
        );
        assert_eq!(TemplatePath::parse("a.yml@self").alias, None);
        assert_eq!(TemplatePath::parse("a.yml").alias, None);
        assert_eq!(TemplatePath::parse("a@b/c.yml@repo").path, "a@b/c.yml");
    }

    #[test]
    fn test_local_candidates() {
        let ctx = ExecutionContext::new("/work/pipelines")
            .with_repository_base_dir(Some(PathBuf::from("/repo")));
        let candidates = TemplatePath::parse("steps/a.yml").candidates(None, &ctx);
        assert_eq!(
            candidates,
            vec![
                PathBuf::from("/work/pipelines/steps/a.yml"),
                PathBuf::from("/repo/steps/a.yml"),
                PathBuf::from("steps/a.yml"),
            ]
        );

        let candidates = TemplatePath::parse("/steps/a.yml").candidates(None, &ctx);
        assert_eq!(candidates[0], PathBuf::from("/repo/steps/a.yml"));
    }

    #[test]
    fn test_resource_locations_fill_missing_location() {
        let session = Session::new();
        let evaluator = Evaluator::new(&session);
        let resources = Resources {
            repositories: vec![RepositoryEntry::new("tpl").with_name("x")],
            ..Default::default()
        };
        let mut locations = HashMap::new();
        locations.insert("tpl".to_string(), "/abs/path".to_string());
        let ctx = ExecutionContext::new("/work")
            .with_resources(resources)
            .with_resource_locations(locations);

        let root = repository_root("tpl", "a/b.yml@tpl", &ctx, &evaluator).unwrap();
        let candidates = TemplatePath::parse("a/b.yml@tpl").candidates(Some(&root), &ctx);
        assert_eq!(candidates[0], PathBuf::from("/abs/path/a/b.yml"));
    }

    #[test]
    fn test_document_location_wins() {
        let session = Session::new();
        let evaluator = Evaluator::new(&session);
        let resources = Resources {
            repositories: vec![RepositoryEntry::new("tpl").with_location("shared")],
            ..Default::default()
        };
        let mut locations = HashMap::new();
        locations.insert("tpl".to_string(), "/elsewhere".to_string());
        let ctx = ExecutionContext::new("/work")
            .with_resources(resources)
            .with_resource_locations(locations);

        let root = repository_root("tpl", "a.yml@tpl", &ctx, &evaluator).unwrap();
        assert_eq!(root, PathBuf::from("/work/shared"));
    }

    #[test]
    fn test_unknown_alias() {
        let session = Session::new();
        let ctx = ExecutionContext::new("/work");
        let err = repository_root("nope", "a.yml@nope", &ctx, &Evaluator::new(&session)).unwrap_err();
        assert!(matches!(err, CompileError::RepositoryResolution { .. }));
    }

    #[test]
    fn test_entry_without_location() {
        let session = Session::new();
        let resources = Resources {
            repositories: vec![RepositoryEntry::new("tpl").with_name("org/tpl")],
            ..Default::default()
        };
        let ctx = ExecutionContext::new("/work").with_resources(resources);
        let err = repository_root("tpl", "a.yml@tpl", &ctx, &Evaluator::new(&session)).unwrap_err();
        assert!(matches!(err, CompileError::TemplateNotFound { .. }));
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("plain/dir"), PathBuf::from("plain/dir"));
        assert_eq!(expand_home("~user"), PathBuf::from("~user"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/repos"), home.join("repos"));
        }
    }
}
