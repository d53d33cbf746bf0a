//! Value comparison and truthiness
//!
//! Both sides of a comparison are normalized first so that `1`, `"1"` and
//! `" 1 "` compare equal, as do `true` and `"True"`.

use once_cell::sync::Lazy;
use pipex_core::Value;
use regex::Regex;
use std::cmp::Ordering;

static NUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-+]?(\d+\.?\d*|\.\d+)$").unwrap());

/// Normalized comparison operand
#[derive(Debug, Clone, PartialEq)]
enum Normalized {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Normalized {
    fn text(&self) -> String {
        match self {
            Normalized::Bool(b) => b.to_string(),
            Normalized::Number(n) => pipex_core::types::format_number(*n),
            Normalized::Text(s) => s.clone(),
        }
    }
}

fn normalize(value: Option<&Value>) -> Normalized {
    match value {
        None | Some(Value::Null) => Normalized::Text(String::new()),
        Some(Value::Bool(b)) | Some(Value::Truth(b)) => Normalized::Bool(*b),
        Some(Value::Number(n)) => Normalized::Number(*n),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.eq_ignore_ascii_case("true") {
                Normalized::Bool(true)
            } else if trimmed.eq_ignore_ascii_case("false") {
                Normalized::Bool(false)
            } else if let Some(n) = parse_number(trimmed) {
                Normalized::Number(n)
            } else {
                Normalized::Text(trimmed.to_string())
            }
        }
        Some(other) => Normalized::Text(other.to_display_string()),
    }
}

/// Parse an integer or decimal literal
pub fn parse_number(text: &str) -> Option<f64> {
    if NUMERIC.is_match(text) {
        text.parse::<f64>().ok()
    } else {
        None
    }
}

/// Order two values after normalization
pub fn compare_values(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    let left = normalize(left);
    let right = normalize(right);

    if left == right {
        return Ordering::Equal;
    }

    match (&left, &right) {
        (Normalized::Number(a), Normalized::Number(b)) => {
            a.partial_cmp(b).unwrap_or(Ordering::Equal)
        }
        (Normalized::Bool(a), Normalized::Bool(b)) => a.cmp(b),
        _ => left.text().cmp(&right.text()),
    }
}

pub fn values_equal(left: Option<&Value>, right: Option<&Value>) -> bool {
    compare_values(left, right) == Ordering::Equal
}

/// Permissive truthiness
pub fn to_boolean(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) | Some(Value::Truth(b)) => *b,
        Some(Value::Number(n)) => *n != 0.0 && !n.is_nan(),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.eq_ignore_ascii_case("false") {
                false
            } else if trimmed.eq_ignore_ascii_case("true") {
                true
            } else {
                !s.is_empty()
            }
        }
        Some(Value::Sequence(_)) | Some(Value::Mapping(_)) => true,
    }
}

/// Numeric view of a value, `None` when it has none
pub fn to_number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Null => Some(0.0),
        Value::Bool(b) | Value::Truth(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => Some(*n),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Some(0.0)
            } else if let Some(hex) = trimmed.strip_prefix("0x") {
                i64::from_str_radix(hex, 16).ok().map(|n| n as f64)
            } else {
                parse_number(trimmed)
            }
        }
        Value::Sequence(_) | Value::Mapping(_) => None,
    }
}
