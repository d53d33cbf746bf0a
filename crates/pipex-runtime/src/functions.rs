//! Builtin function library
//!
//! Names are matched case-insensitively. Arguments arrive already
//! evaluated; `None` is an undefined argument. Unknown names and calls
//! with unusable arguments yield `None`.

use crate::compare::{compare_values, to_boolean, to_number, values_equal};
use crate::session::Session;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike};
use pipex_core::{Mapping, Value};
use std::cmp::Ordering;

/// Builtins that accept the receiver of a method call as first argument
const RECEIVER_METHODS: [&str; 15] = [
    "lower",
    "upper",
    "tolowercase",
    "touppercase",
    "trim",
    "replace",
    "split",
    "join",
    "startswith",
    "endswith",
    "contains",
    "containsvalue",
    "includes",
    "indexof",
    "length",
];

pub fn is_receiver_method(name: &str) -> bool {
    RECEIVER_METHODS.contains(&name.to_ascii_lowercase().as_str())
}

/// Call the builtin `name`
pub fn call(name: &str, args: &[Option<Value>], session: &Session) -> Option<Value> {
    let arg = |i: usize| args.get(i).and_then(Option::as_ref);
    let text = |i: usize| arg(i).map(Value::to_display_string).unwrap_or_default();

    let result = match name.to_ascii_lowercase().as_str() {
        "eq" => truth(compare2(args)? == Ordering::Equal),
        "ne" => truth(compare2(args)? != Ordering::Equal),
        "gt" => truth(compare2(args)? == Ordering::Greater),
        "ge" => truth(compare2(args)? != Ordering::Less),
        "lt" => truth(compare2(args)? == Ordering::Less),
        "le" => truth(compare2(args)? != Ordering::Greater),

        "and" => truth(!args.is_empty() && args.iter().all(|a| to_boolean(a.as_ref()))),
        "or" => truth(args.iter().any(|a| to_boolean(a.as_ref()))),
        "not" => truth(!to_boolean(arg(0))),
        "xor" => truth(to_boolean(arg(0)) != to_boolean(arg(1))),

        "coalesce" => args
            .iter()
            .flatten()
            .find(|v| !v.is_null() && v.as_str() != Some(""))
            .cloned()
            .unwrap_or_else(|| Value::string("")),
        "contains" => truth(contains(arg(0), arg(1))),
        "containsvalue" => truth(contains_value(arg(0), arg(1))),
        "in" => truth(args.iter().skip(1).any(|c| values_equal(arg(0), c.as_ref()))),
        "notin" => truth(!args.iter().skip(1).any(|c| values_equal(arg(0), c.as_ref()))),
        "includes" => truth(match arg(0) {
            Some(Value::String(s)) => s.contains(&text(1)),
            other => contains_value(other, arg(1)),
        }),
        "indexof" => Value::Number(index_of(arg(0), arg(1))),

        "lower" | "tolowercase" => Value::String(text(0).to_lowercase()),
        "upper" | "touppercase" => Value::String(text(0).to_uppercase()),
        "trim" => Value::String(text(0).trim().to_string()),
        "startswith" => truth(text(0).to_lowercase().starts_with(&text(1).to_lowercase())),
        "endswith" => truth(text(0).to_lowercase().ends_with(&text(1).to_lowercase())),
        "replace" => {
            let from = text(1);
            if from.is_empty() {
                Value::String(text(0))
            } else {
                Value::String(text(0).replace(&from, &text(2)))
            }
        }
        "split" => split(&text(0), &text(1)),
        "join" => join(arg(0), arg(1)),
        "format" => Value::String(format(&text(0), args.get(1..).unwrap_or_default())),
        "length" => Value::Number(length(arg(0)) as f64),
        "converttojson" => Value::String(convert_to_json(arg(0))),

        "counter" => {
            let seed = to_number(arg(1)).unwrap_or(0.0) as i64;
            Value::Number(session.next_counter(&text(0), seed) as f64)
        }
        "iif" => {
            return if to_boolean(arg(0)) {
                arg(1).cloned()
            } else {
                arg(2).cloned()
            }
        }

        // no run state exists while expanding
        "always" | "succeeded" | "succeededorfailed" => truth(true),
        "canceled" | "failed" => truth(false),

        _ => {
            tracing::trace!(function = name, "unknown function");
            return None;
        }
    };

    Some(result)
}

fn truth(b: bool) -> Value {
    Value::Truth(b)
}

fn compare2(args: &[Option<Value>]) -> Option<Ordering> {
    if args.len() < 2 {
        return None;
    }
    Some(compare_values(args[0].as_ref(), args[1].as_ref()))
}

/// Case-insensitive substring test; sequences test their elements
fn contains(haystack: Option<&Value>, needle: Option<&Value>) -> bool {
    match haystack {
        Some(Value::Sequence(items)) => items.iter().any(|i| values_equal(Some(i), needle)),
        Some(value) => {
            let needle = needle.map(Value::to_display_string).unwrap_or_default();
            value
                .to_display_string()
                .to_lowercase()
                .contains(&needle.to_lowercase())
        }
        None => false,
    }
}

fn contains_value(collection: Option<&Value>, needle: Option<&Value>) -> bool {
    match collection {
        Some(Value::Sequence(items)) => items.iter().any(|i| values_equal(Some(i), needle)),
        Some(Value::Mapping(map)) => map.values().any(|v| values_equal(Some(v), needle)),
        other => values_equal(other, needle),
    }
}

fn index_of(haystack: Option<&Value>, needle: Option<&Value>) -> f64 {
    let position = match haystack {
        Some(Value::Sequence(items)) => items.iter().position(|i| values_equal(Some(i), needle)),
        Some(value) => {
            let text = value.to_display_string();
            let needle = needle.map(Value::to_display_string).unwrap_or_default();
            text.find(&needle).map(|byte| text[..byte].chars().count())
        }
        None => None,
    };
    position.map(|p| p as f64).unwrap_or(-1.0)
}

fn split(text: &str, delimiter: &str) -> Value {
    let parts: Vec<Value> = if delimiter.is_empty() {
        text.chars().map(|c| Value::String(c.to_string())).collect()
    } else {
        text.split(delimiter).map(Value::string).collect()
    };
    Value::Sequence(parts)
}

/// `join(separator, collection)`; the method form `collection.join(sep)`
/// arrives with the collection first
fn join(first: Option<&Value>, second: Option<&Value>) -> Value {
    let (separator, collection) = match (first, second) {
        (Some(Value::Sequence(_)), _) => (second, first),
        _ => (first, second),
    };
    let separator = separator.map(Value::to_display_string).unwrap_or_default();

    let joined = match collection {
        Some(Value::Sequence(items)) => items
            .iter()
            .map(Value::to_display_string)
            .collect::<Vec<_>>()
            .join(&separator),
        Some(Value::Mapping(map)) => map.keys().cloned().collect::<Vec<_>>().join(&separator),
        Some(other) => other.to_display_string(),
        None => String::new(),
    };
    Value::String(joined)
}

fn length(value: Option<&Value>) -> usize {
    match value {
        Some(Value::String(s)) => s.chars().count(),
        Some(Value::Sequence(items)) => items.len(),
        Some(Value::Mapping(map)) => map.len(),
        Some(Value::Null) | None => 0,
        Some(other) => other.to_display_string().chars().count(),
    }
}

/// Positional formatting: `{0}`, `{1:yyyy-MM-dd}`, `{{` and `}}` escapes
pub fn format(template: &str, args: &[Option<Value>]) -> String {
    let chars: Vec<char> = template.chars().collect();
    let mut out = String::with_capacity(template.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == '{' && chars.get(i + 1) == Some(&'{') {
            out.push('{');
            i += 2;
            continue;
        }
        if c == '}' && chars.get(i + 1) == Some(&'}') {
            out.push('}');
            i += 2;
            continue;
        }
        if c == '{' {
            if let Some(close) = chars[i + 1..].iter().position(|&c| c == '}') {
                let placeholder: String = chars[i + 1..i + 1 + close].iter().collect();
                let (index, spec) = match placeholder.split_once(':') {
                    Some((index, spec)) => (index, Some(spec)),
                    None => (placeholder.as_str(), None),
                };
                if let Ok(index) = index.trim().parse::<usize>() {
                    let value = args.get(index).and_then(Option::as_ref);
                    out.push_str(&format_argument(value, spec));
                    i += close + 2;
                    continue;
                }
            }
        }
        out.push(c);
        i += 1;
    }

    out
}

fn format_argument(value: Option<&Value>, spec: Option<&str>) -> String {
    let text = value.map(Value::to_display_string).unwrap_or_default();
    match spec.and_then(|spec| parse_date(&text).map(|date| (spec, date))) {
        Some((spec, date)) => format_date(&date, spec),
        None => text,
    }
}

fn parse_date(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    const FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];
    for fmt in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Render a date with .NET-style custom format tokens
fn format_date(date: &NaiveDateTime, spec: &str) -> String {
    // longest tokens first so `yyyy` is not read as two `yy`
    const TOKENS: [&str; 19] = [
        "yyyy", "ffff", "fff", "yy", "MM", "dd", "HH", "hh", "mm", "ss", "ff", "tt", "M", "d",
        "H", "h", "m", "s", "f",
    ];

    let hour12 = match date.hour() % 12 {
        0 => 12,
        h => h,
    };
    let fraction = date.nanosecond();

    let mut out = String::new();
    let mut rest = spec;
    while !rest.is_empty() {
        match TOKENS.iter().find(|t| rest.starts_with(**t)) {
            Some(token) => {
                out.push_str(&match *token {
                    "yyyy" => format!("{:04}", date.year()),
                    "yy" => format!("{:02}", date.year() % 100),
                    "MM" => format!("{:02}", date.month()),
                    "M" => date.month().to_string(),
                    "dd" => format!("{:02}", date.day()),
                    "d" => date.day().to_string(),
                    "HH" => format!("{:02}", date.hour()),
                    "H" => date.hour().to_string(),
                    "hh" => format!("{:02}", hour12),
                    "h" => hour12.to_string(),
                    "mm" => format!("{:02}", date.minute()),
                    "m" => date.minute().to_string(),
                    "ss" => format!("{:02}", date.second()),
                    "s" => date.second().to_string(),
                    "ffff" => format!("{:04}", fraction / 100_000),
                    "fff" => format!("{:03}", fraction / 1_000_000),
                    "ff" => format!("{:02}", fraction / 10_000_000),
                    "f" => (fraction / 100_000_000).to_string(),
                    _ => (if date.hour() < 12 { "AM" } else { "PM" }).to_string(),
                });
                rest = &rest[token.len()..];
            }
            None => {
                let mut chars = rest.chars();
                if let Some(c) = chars.next() {
                    out.push(c);
                }
                rest = chars.as_str();
            }
        }
    }
    out
}

/// Pretty JSON with `True`/`False` strings and numeric strings as numbers
fn convert_to_json(value: Option<&Value>) -> String {
    let json = match value {
        Some(v) => json_for_output(v),
        None => serde_json::Value::Null,
    };
    serde_json::to_string_pretty(&json).unwrap_or_default()
}

fn json_for_output(value: &Value) -> serde_json::Value {
    match value {
        Value::Bool(b) | Value::Truth(b) => {
            serde_json::Value::String(if *b { "True" } else { "False" }.to_string())
        }
        Value::String(s) => match crate::compare::parse_number(s.trim()) {
            Some(n) => Value::Number(n).to_json(),
            None => serde_json::Value::String(s.clone()),
        },
        Value::Sequence(items) => serde_json::Value::Array(items.iter().map(json_for_output).collect()),
        Value::Mapping(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), json_for_output(v)))
                .collect(),
        ),
        other => other.to_json(),
    }
}

/// Mapping entries as `{key, value}` items
pub fn key_value_pairs(map: &Mapping) -> Vec<Value> {
    map.iter()
        .map(|(k, v)| {
            let mut pair = Mapping::new();
            pair.insert("key", Value::string(k));
            pair.insert("value", v.clone());
            Value::Mapping(pair)
        })
        .collect()
}
