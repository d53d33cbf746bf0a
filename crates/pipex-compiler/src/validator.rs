//! Template parameter contracts
//!
//! A template declares its parameters either as a sequence of
//! `{name, type, default, values}` entries or as a plain mapping of
//! name to default. Call sites are checked against the declarations
//! before the template body is expanded, and every violation is
//! reported at once.

use crate::error::{CompileError, Result};
use pipex_core::{Mapping, Value};
use pipex_runtime::{values_equal, ExecutionContext};
use std::fmt;

/// One declared template parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDecl {
    pub name: String,
    pub type_name: Option<String>,
    /// Default value; `None` makes the parameter required
    pub default: Option<Value>,
    /// Allowed values, from `values`
    pub allowed: Option<Vec<Value>>,
}

impl ParameterDecl {
    fn from_entry(entry: &Mapping) -> Option<Self> {
        let name = entry.get("name")?.as_str()?.trim().to_string();
        if name.is_empty() {
            return None;
        }
        let default = ["default", "value", "values"]
            .iter()
            .find_map(|k| entry.get(k).cloned());
        let allowed = entry.get("values").and_then(|v| v.as_sequence()).cloned();
        Some(Self {
            name,
            type_name: entry
                .get("type")
                .map(|t| t.to_display_string().trim().to_string()),
            default,
            allowed,
        })
    }
}

/// Parameter declarations of a template document
pub fn declarations(template_doc: &Value) -> Vec<ParameterDecl> {
    match template_doc.get("parameters") {
        Some(Value::Sequence(items)) => items
            .iter()
            .filter_map(|item| item.as_mapping().and_then(ParameterDecl::from_entry))
            .collect(),
        Some(Value::Mapping(map)) => map
            .iter()
            .map(|(name, default)| ParameterDecl {
                name: name.clone(),
                type_name: None,
                default: Some(default.clone()),
                allowed: None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Declared defaults as a parameter mapping
pub fn default_parameters(template_doc: &Value) -> Mapping {
    declarations(template_doc)
        .into_iter()
        .filter_map(|decl| decl.default.map(|d| (decl.name, d)))
        .collect()
}

/// Call-site parameters in mapping form.
///
/// Accepts a mapping, or a sequence of `{name, value}` entries and
/// single-key mappings.
pub fn call_site_parameters(value: Option<&Value>) -> Mapping {
    let mut provided = Mapping::new();
    match value {
        Some(Value::Mapping(map)) => {
            for (k, v) in map {
                provided.insert(k.clone(), v.clone());
            }
        }
        Some(Value::Sequence(items)) => {
            for item in items {
                let Some(entry) = item.as_mapping() else {
                    continue;
                };
                match entry.get("name").and_then(|n| n.as_str()) {
                    Some(name) => {
                        let value = entry.get("value").cloned().unwrap_or(Value::Null);
                        provided.insert(name, value);
                    }
                    None => {
                        if let Some((k, v)) = entry.single_entry() {
                            provided.insert(k.clone(), v.clone());
                        }
                    }
                }
            }
        }
        _ => {}
    }
    provided
}

/// A single contract violation
#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    Missing {
        name: String,
    },
    TypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },
    NotAllowed {
        name: String,
        value: String,
        allowed: Vec<String>,
    },
    Unknown {
        name: String,
    },
}

/// Every contract violation of one template call
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterValidationError {
    pub template: String,
    pub violations: Vec<Violation>,
    /// Templates being expanded when the call was made, outermost first
    pub stack: Vec<String>,
}

impl ParameterValidationError {
    pub fn missing(&self) -> Vec<&str> {
        self.violations
            .iter()
            .filter_map(|v| match v {
                Violation::Missing { name } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn unknown(&self) -> Vec<&str> {
        self.violations
            .iter()
            .filter_map(|v| match v {
                Violation::Unknown { name } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl fmt::Display for ParameterValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Template '{}' parameter validation failed", self.template)?;

        let missing = self.missing();
        if !missing.is_empty() {
            write!(f, "\n\nMissing required parameters: {}", missing.join(", "))?;
        }

        let mismatches: Vec<String> = self
            .violations
            .iter()
            .filter_map(|v| match v {
                Violation::TypeMismatch {
                    name,
                    expected,
                    actual,
                } => Some(format!("  - '{}' expects {}, got {}", name, expected, actual)),
                _ => None,
            })
            .collect();
        if !mismatches.is_empty() {
            write!(f, "\n\nType mismatches:\n{}", mismatches.join("\n"))?;
        }

        let rejected: Vec<String> = self
            .violations
            .iter()
            .filter_map(|v| match v {
                Violation::NotAllowed {
                    name,
                    value,
                    allowed,
                } => Some(format!(
                    "  - '{}' = '{}' (allowed: {})",
                    name,
                    value,
                    allowed.join(", ")
                )),
                _ => None,
            })
            .collect();
        if !rejected.is_empty() {
            write!(f, "\n\nValues not allowed:\n{}", rejected.join("\n"))?;
        }

        let unknown = self.unknown();
        if !unknown.is_empty() {
            write!(f, "\n\nUnknown parameters: {}", unknown.join(", "))?;
        }

        f.write_str(&format_stack(&self.stack))
    }
}

impl std::error::Error for ParameterValidationError {}

/// Template call stack as an indented tree, empty for no stack
pub fn format_stack(stack: &[String]) -> String {
    if stack.is_empty() {
        return String::new();
    }
    let mut out = String::from("\n\nTemplate call stack:");
    for (depth, label) in stack.iter().enumerate() {
        out.push('\n');
        if depth == 0 {
            out.push_str("  ");
        } else {
            out.push_str(&"   ".repeat(depth));
            out.push_str("└─ ");
        }
        out.push_str(label);
    }
    out
}

/// Check call-site parameters against a template's declarations
pub fn validate_template_parameters(
    template_doc: &Value,
    provided: &Mapping,
    template_path: &str,
    ctx: &ExecutionContext,
) -> Result<()> {
    let decls = declarations(template_doc);
    let mut violations = Vec::new();

    for decl in &decls {
        match provided.get(&decl.name) {
            None => {
                if decl.default.is_none() {
                    violations.push(Violation::Missing {
                        name: decl.name.clone(),
                    });
                }
            }
            Some(value) => check_value(decl, value, &mut violations),
        }
    }

    for name in provided.keys() {
        // `${{ insert }}` merges can leave an empty key behind
        if name.is_empty() {
            continue;
        }
        if !decls.iter().any(|d| &d.name == name) {
            violations.push(Violation::Unknown { name: name.clone() });
        }
    }

    if violations.is_empty() {
        return Ok(());
    }

    tracing::debug!(
        template = %template_path,
        violations = violations.len(),
        "template parameters rejected"
    );
    Err(CompileError::ParameterValidation(ParameterValidationError {
        template: template_path.to_string(),
        violations,
        stack: ctx.template_stack.clone(),
    }))
}

fn check_value(decl: &ParameterDecl, value: &Value, violations: &mut Vec<Violation>) {
    // Unresolved values and runtime placeholders are only known later
    if value.is_null() || is_runtime_placeholder(value) {
        return;
    }

    if let Some(expected) = &decl.type_name {
        if !type_accepts(expected, value) {
            violations.push(Violation::TypeMismatch {
                name: decl.name.clone(),
                expected: expected.clone(),
                actual: value.type_name().to_string(),
            });
            return;
        }
    }

    if let Some(allowed) = &decl.allowed {
        if value.is_scalar() && !allowed.iter().any(|a| values_equal(Some(a), Some(value))) {
            violations.push(Violation::NotAllowed {
                name: decl.name.clone(),
                value: value.to_display_string(),
                allowed: allowed.iter().map(Value::to_display_string).collect(),
            });
        }
    }
}

fn is_runtime_placeholder(value: &Value) -> bool {
    value.as_str().is_some_and(|s| {
        let s = s.trim();
        s.starts_with("$(") && s.ends_with(')')
    })
}

/// Whether `value` fits the declared parameter type
pub fn type_accepts(type_name: &str, value: &Value) -> bool {
    match type_name.to_ascii_lowercase().as_str() {
        "string" => value.is_scalar(),
        "number" => match value {
            Value::Number(_) => true,
            Value::String(s) => pipex_runtime::compare::parse_number(s).is_some(),
            _ => false,
        },
        "boolean" => match value {
            Value::Bool(_) | Value::Truth(_) => true,
            Value::String(s) => {
                s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("false")
            }
            _ => false,
        },
        "object" => matches!(value, Value::Mapping(_) | Value::Sequence(_)),
        "step" | "job" | "deployment" | "stage" => matches!(value, Value::Mapping(_)),
        "steplist" | "joblist" | "deploymentlist" | "stagelist" => {
            matches!(value, Value::Sequence(_))
        }
        // filePath, pool, container and friends are passed through
        _ => true,
    }
}
