//! pipex Core - Core types and definitions for the pipex pipeline expander
//!
//! This crate provides the fundamental types used across the pipex ecosystem:
//! - The document tree (`Value`, `Mapping`)
//! - Expression AST definitions
//! - Directive classification for control-flow keys
//! - Scalar style records shared by the formatting tracker
//! - Error types

pub mod ast;
pub mod error;
pub mod style;
pub mod types;

// Re-export commonly used types
pub use ast::{Directive, Expression};
pub use error::CoreError;
pub use style::{BlockScalarHints, FormattingState, ScalarStyle, StyleRecords};
pub use types::{Mapping, Value};
