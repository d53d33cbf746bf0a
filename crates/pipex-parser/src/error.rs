//! Parser error types

use thiserror::Error;

/// Parser error
#[derive(Error, Debug)]
pub enum ParseError {
    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Document shape not usable as a pipeline
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// Invalid expression syntax
    #[error("Invalid expression syntax: {0}")]
    InvalidExpression(String),
}

/// Result type for parser operations
pub type Result<T> = std::result::Result<T, ParseError>;
