//! pipex Runtime - Expression evaluation for the pipex pipeline expander
//!
//! This crate provides the evaluation side of the expression language:
//! the scoped `ExecutionContext`, the lifetime-scoped `Session`, the
//! evaluator with its builtin function table, and string interpolation.

pub mod compare;
pub mod context;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod interpolate;
pub mod resources;
pub mod session;

// Re-export main types
pub use compare::{compare_values, to_boolean, values_equal};
pub use context::ExecutionContext;
pub use error::{Result, RuntimeError};
pub use evaluator::Evaluator;
pub use interpolate::{find_expressions, whole_expression, Interpolated};
pub use resources::{RepositoryEntry, Resources};
pub use session::Session;
