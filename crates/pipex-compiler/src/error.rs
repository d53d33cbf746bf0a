//! Compiler error types

use crate::validator::{format_stack, ParameterValidationError};
use pipex_parser::ParseError;
use pipex_runtime::RuntimeError;
use std::path::PathBuf;
use thiserror::Error;

/// Compiler error
#[derive(Error, Debug)]
pub enum CompileError {
    /// A template or root document could not be parsed
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: ParseError,
    },

    /// A file could not be read
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// No candidate location held the template
    #[error("{}", not_found_message(.template, .candidates, .stack))]
    TemplateNotFound {
        template: String,
        candidates: Vec<PathBuf>,
        stack: Vec<String>,
    },

    /// Repository alias not declared anywhere
    #[error(
        "Repository '{alias}' referenced by template '{template}' is not declared in resources.repositories or resourceLocations"
    )]
    RepositoryResolution { alias: String, template: String },

    /// Call-site parameters violate the template's declarations
    #[error(transparent)]
    ParameterValidation(#[from] ParameterValidationError),

    /// Template nesting went past the configured limit
    #[error("Template '{template}' exceeds the maximum nesting depth of {limit}{}", format_stack(.stack))]
    TemplateDepthExceeded {
        template: String,
        limit: usize,
        stack: Vec<String>,
    },

    /// Invalid document content
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

fn not_found_message(template: &str, candidates: &[PathBuf], stack: &[String]) -> String {
    let mut message = format!("Template '{}' not found", template);
    if candidates.is_empty() {
        message.push_str(": its repository has no local location");
    } else {
        message.push_str(". Searched:");
        for candidate in candidates {
            message.push_str(&format!("\n  - {}", candidate.display()));
        }
    }
    message.push_str(&format_stack(stack));
    message
}

/// Result type for compiler operations
pub type Result<T> = std::result::Result<T, CompileError>;
