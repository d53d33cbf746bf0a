//! pipex SDK - Pipeline expansion
//!
//! High-level API for expanding templated pipeline documents into their
//! final form and writing them back with their source formatting.

pub mod config;
pub mod emitter;
pub mod engine;
pub mod error;
pub mod fidelity;

// Re-export main types
pub use config::ExpandOptions;
pub use emitter::to_yaml_string;
pub use engine::{expand_pipeline_from_file, expand_pipeline_to_string, ExpandedPipeline, Pipex};
pub use error::{Result, SdkError};
pub use fidelity::{insert_heredoc_separators, restore_styles, Chomping, ScalarFormat, StylePlan};

// Re-export commonly used types from dependencies
pub use pipex_compiler::{validate_template_parameters, ParameterValidationError, Violation};
pub use pipex_core::{Mapping, Value};
