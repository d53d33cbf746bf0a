//! Scalar style records
//!
//! Parsing a document into a `Value` tree loses how each scalar was written.
//! These records capture the original quote and block styles so they can be
//! re-applied to the expanded tree. Three lookup tiers exist:
//!
//! 1. exact document path (`jobs.0.steps.2.displayName`)
//! 2. context key (`ctx:<context>:<key>:<value>`), where the context is the
//!    nearest enclosing `displayName`, `task` or `name`
//! 3. universal fallback (`empty-string`, `glob:<value>`)
//!
//! An exact path always wins over a context key, which wins over a fallback.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// How a scalar was written in the source document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScalarStyle {
    /// `'value'`
    SingleQuoted,
    /// `"value"`
    DoubleQuoted,
    /// `|` block scalar
    Literal,
    /// `>` block scalar
    Folded,
}

impl ScalarStyle {
    /// Detect a style from the first character of a scalar's source text
    pub fn from_indicator(c: char) -> Option<Self> {
        match c {
            '\'' => Some(ScalarStyle::SingleQuoted),
            '"' => Some(ScalarStyle::DoubleQuoted),
            '|' => Some(ScalarStyle::Literal),
            '>' => Some(ScalarStyle::Folded),
            _ => None,
        }
    }

    pub fn is_quoted(&self) -> bool {
        matches!(self, ScalarStyle::SingleQuoted | ScalarStyle::DoubleQuoted)
    }

    pub fn is_block(&self) -> bool {
        matches!(self, ScalarStyle::Literal | ScalarStyle::Folded)
    }
}

/// Style records collected from one or more source documents
#[derive(Debug, Clone, Default)]
pub struct StyleRecords {
    by_path: HashMap<String, ScalarStyle>,
    by_context: HashMap<String, ScalarStyle>,
    fallback: HashMap<String, ScalarStyle>,
}

impl StyleRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty() && self.by_context.is_empty() && self.fallback.is_empty()
    }

    /// Number of records across all tiers
    pub fn len(&self) -> usize {
        self.by_path.len() + self.by_context.len() + self.fallback.len()
    }

    pub fn record_path(&mut self, path: impl Into<String>, style: ScalarStyle) {
        self.by_path.insert(path.into(), style);
    }

    pub fn record_context(&mut self, context: &str, key: &str, value: &str, style: ScalarStyle) {
        self.by_context
            .insert(Self::context_key(context, key, value), style);
    }

    /// Record a universal fallback for empty or glob-like values.
    ///
    /// The first writer of a fallback key wins.
    pub fn record_fallback(&mut self, value: &str, style: ScalarStyle) {
        if let Some(key) = Self::fallback_key(value) {
            self.fallback.entry(key).or_insert(style);
        }
    }

    /// Resolve the style for a scalar, exact path first
    pub fn lookup(
        &self,
        path: &str,
        context: &str,
        key: &str,
        value: &str,
    ) -> Option<ScalarStyle> {
        if let Some(style) = self.by_path.get(path) {
            return Some(*style);
        }
        if let Some(style) = self.by_context.get(&Self::context_key(context, key, value)) {
            return Some(*style);
        }
        Self::fallback_key(value).and_then(|k| self.fallback.get(&k).copied())
    }

    pub fn path_style(&self, path: &str) -> Option<ScalarStyle> {
        self.by_path.get(path).copied()
    }

    /// Merge records from another document; existing entries are kept
    pub fn merge(&mut self, other: StyleRecords) {
        for (k, v) in other.by_path {
            self.by_path.entry(k).or_insert(v);
        }
        for (k, v) in other.by_context {
            self.by_context.entry(k).or_insert(v);
        }
        for (k, v) in other.fallback {
            self.fallback.entry(k).or_insert(v);
        }
    }

    pub fn context_key(context: &str, key: &str, value: &str) -> String {
        format!("ctx:{}:{}:{}", context, key, value)
    }

    /// `empty-string` for empty values, `glob:<value>` for values containing
    /// `*` or `?`, otherwise none
    pub fn fallback_key(value: &str) -> Option<String> {
        if value.is_empty() {
            Some("empty-string".to_string())
        } else if value.contains('*') || value.contains('?') {
            Some(format!("glob:{}", value))
        } else {
            None
        }
    }
}

/// Facts about multi-line scalars seen during expansion, keyed by the
/// trimmed expanded content
#[derive(Debug, Clone, Default)]
pub struct BlockScalarHints {
    with_expressions: HashSet<String>,
    with_trailing_expression: HashSet<String>,
}

impl BlockScalarHints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, content: &str, had_expression: bool, last_line_had_expression: bool) {
        let key = content.trim().to_string();
        if had_expression {
            self.with_expressions.insert(key.clone());
        }
        if last_line_had_expression {
            self.with_trailing_expression.insert(key);
        }
    }

    /// Whether the original of this content contained an expression
    pub fn had_expression(&self, content: &str) -> bool {
        self.with_expressions.contains(content.trim())
    }

    /// Whether the last non-blank line of the original held an expression
    pub fn had_trailing_expression(&self, content: &str) -> bool {
        self.with_trailing_expression.contains(content.trim())
    }

    pub fn is_empty(&self) -> bool {
        self.with_expressions.is_empty() && self.with_trailing_expression.is_empty()
    }
}

/// Formatting state shared by every frame of one expansion
#[derive(Debug, Clone, Default)]
pub struct FormattingState {
    pub styles: StyleRecords,
    pub blocks: BlockScalarHints,
}
