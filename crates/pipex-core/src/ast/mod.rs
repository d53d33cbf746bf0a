//! Abstract Syntax Tree (AST) definitions for pipex
//!
//! This module contains:
//! - Expression nodes produced from `${{ ... }}` text
//! - Directives recognized from mapping keys

pub mod directive;
pub mod expression;

pub use directive::Directive;
pub use expression::{BinaryOperator, Expression, LogicalOperator, UnaryOperator};
