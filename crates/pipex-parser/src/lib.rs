//! pipex Parser - YAML and expression parsing for the pipex pipeline expander
//!
//! This crate turns pipeline text into the structures the expander works on:
//! - `YamlParser` loads documents into the `Value` tree
//! - `StyleScanner` records the original quote and block styles
//! - `ExpressionParser` parses `${{ }}` expression text into an AST

pub mod error;
pub mod expression_parser;
pub mod style_scanner;
pub mod yaml_parser;

// Re-export main parser types
pub use error::{ParseError, Result};
pub use expression_parser::ExpressionParser;
pub use style_scanner::StyleScanner;
pub use yaml_parser::{ParsedDocument, YamlParser};
