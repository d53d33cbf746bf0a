//! pipex Compiler - Template expansion
//!
//! This crate turns a parsed pipeline document into its fully expanded
//! form: directives are applied, templates are located and inlined, and
//! template parameter contracts are enforced.

pub mod error;
pub mod expander;
pub mod normalize;
pub mod repository;
pub mod template_resolver;
pub mod validator;

// Re-export main types
pub use error::{CompileError, Result};
pub use expander::{is_template_reference, Expander, Mode};
pub use normalize::{normalize, Position};
pub use repository::{expand_home, repository_root, TemplatePath};
pub use template_resolver::{TemplateResolver, MAX_TEMPLATE_DEPTH};

// Re-export validation types
pub use validator::{
    declarations, default_parameters, validate_template_parameters, ParameterDecl,
    ParameterValidationError, Violation,
};
