//! YAML Parser
//!
//! Loads pipeline documents into the `Value` tree.
//!
//! Expression text is not valid YAML in every position (`${{` opens a flow
//! mapping inside flow collections, `: ` inside an expression reads as a
//! mapping indicator), so delimiters are replaced by plain-scalar-safe
//! placeholders before parsing and restored in every key and string
//! afterwards. Opening placeholders are numbered so repeated directive keys
//! such as `${{ insert }}` stay distinct mapping keys.

use crate::error::{ParseError, Result};
use crate::style_scanner::StyleScanner;
use once_cell::sync::Lazy;
use pipex_core::types::format_number;
use pipex_core::{Mapping, StyleRecords, Value};
use regex::Regex;
use serde_yaml::Value as YamlValue;

const OPEN: &str = "${{";
const CLOSE: &str = "}}";

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"__PIPEX_O\d+__|__PIPEX_C__|__PIPEX_CS__|__PIPEX_H__").unwrap());

/// A parsed document together with the styles of its scalars
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub root: Value,
    pub styles: StyleRecords,
}

/// YAML parser utilities
pub struct YamlParser;

impl YamlParser {
    /// Parse YAML text into a document tree
    pub fn parse(source: &str) -> Result<Value> {
        let protected = Self::protect(source);
        Self::parse_protected(&protected)
    }

    /// Parse YAML text and scan its scalar styles.
    ///
    /// `record_paths` controls whether exact-path records are kept; only the
    /// root document of an expansion is addressed by path.
    pub fn parse_with_styles(source: &str, record_paths: bool) -> Result<ParsedDocument> {
        let protected = Self::protect(source);
        let styles = StyleScanner::new(record_paths).scan(&protected);
        let root = Self::parse_protected(&protected)?;
        Ok(ParsedDocument { root, styles })
    }

    fn parse_protected(protected: &str) -> Result<Value> {
        let yaml: YamlValue = serde_yaml::from_str(protected)?;
        Self::convert(yaml)
    }

    /// Replace expression delimiters with placeholders
    pub fn protect(source: &str) -> String {
        let mut out = String::with_capacity(source.len() + 32);
        let mut rest = source;
        let mut counter = 0usize;

        while let Some(start) = rest.find(OPEN) {
            out.push_str(&rest[..start]);
            let after_open = &rest[start + OPEN.len()..];

            let Some(end) = after_open.find(CLOSE) else {
                out.push_str(&rest[start..]);
                return out;
            };

            // an expression never spans lines in a plain scalar; leave it be
            let inner = &after_open[..end];
            if inner.contains('\n') {
                out.push_str(OPEN);
                rest = after_open;
                continue;
            }

            out.push_str(&format!("__PIPEX_O{}__", counter));
            counter += 1;
            out.push_str(&inner.replace(": ", "__PIPEX_CS__").replace(" #", "__PIPEX_H__"));
            out.push_str("__PIPEX_C__");
            rest = &after_open[end + CLOSE.len()..];
        }

        out.push_str(rest);
        out
    }

    /// Undo `protect` on a single key or string
    pub fn restore(text: &str) -> String {
        if !text.contains("__PIPEX_") {
            return text.to_string();
        }
        PLACEHOLDER
            .replace_all(text, |caps: &regex::Captures| match &caps[0] {
                "__PIPEX_C__" => CLOSE.to_string(),
                "__PIPEX_CS__" => ": ".to_string(),
                "__PIPEX_H__" => " #".to_string(),
                _ => OPEN.to_string(),
            })
            .into_owned()
    }

    /// Convert a serde_yaml value into the document tree
    pub fn convert(yaml: YamlValue) -> Result<Value> {
        Ok(match yaml {
            YamlValue::Null => Value::Null,
            YamlValue::Bool(b) => Value::Bool(b),
            YamlValue::Number(n) => match n.as_f64() {
                Some(f) => Value::Number(f),
                None => {
                    return Err(ParseError::InvalidDocument(format!(
                        "Unrepresentable number: {}",
                        n
                    )))
                }
            },
            YamlValue::String(s) => Value::String(Self::restore(&s)),
            YamlValue::Sequence(items) => Value::Sequence(
                items
                    .into_iter()
                    .map(Self::convert)
                    .collect::<Result<Vec<_>>>()?,
            ),
            YamlValue::Mapping(map) => {
                let mut mapping = Mapping::with_capacity(map.len());
                for (key, value) in map {
                    mapping.push(Self::key_to_string(key)?, Self::convert(value)?);
                }
                Value::Mapping(mapping)
            }
            YamlValue::Tagged(tagged) => Self::convert(tagged.value)?,
        })
    }

    fn key_to_string(key: YamlValue) -> Result<String> {
        match key {
            YamlValue::String(s) => Ok(Self::restore(&s)),
            YamlValue::Null => Ok("null".to_string()),
            YamlValue::Bool(b) => Ok(b.to_string()),
            YamlValue::Number(n) => Ok(n
                .as_f64()
                .map(format_number)
                .unwrap_or_else(|| n.to_string())),
            YamlValue::Tagged(tagged) => Self::key_to_string(tagged.value),
            other => Err(ParseError::InvalidDocument(format!(
                "Unsupported mapping key: {:?}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protect_and_restore() {
        let source = "key: ${{ parameters.a }}-${{ iif(x, 'a: b', c) }}";
        let protected = YamlParser::protect(source);
        assert!(!protected.contains("${{"));
        assert_eq!(YamlParser::restore(&protected), source);
    }

    #[test]
    fn test_parse_simple_document() {
        let value = YamlParser::parse("name: build\ncount: 3\nenabled: true\n").unwrap();
        let map = value.as_mapping().unwrap();
        assert_eq!(map.get("name"), Some(&Value::string("build")));
        assert_eq!(map.get("count"), Some(&Value::Number(3.0)));
        assert_eq!(map.get("enabled"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_parse_directive_keys() {
        let yaml = r#"
steps:
- ${{ if eq(parameters.env, 'prod') }}:
  - script: echo prod
- ${{ else }}:
  - script: echo dev
"#;
        let value = YamlParser::parse(yaml).unwrap();
        let steps = value.get("steps").and_then(Value::as_sequence).unwrap();
        let (key, _) = steps[0].as_mapping().unwrap().single_entry().unwrap();
        assert_eq!(key, "${{ if eq(parameters.env, 'prod') }}");
        let (key, _) = steps[1].as_mapping().unwrap().single_entry().unwrap();
        assert_eq!(key, "${{ else }}");
    }

    #[test]
    fn test_duplicate_insert_keys_survive() {
        let yaml = "job:\n  ${{ insert }}: { a: 1 }\n  ${{ insert }}: { b: 2 }\n";
        let value = YamlParser::parse(yaml).unwrap();
        let job = value.get("job").and_then(Value::as_mapping).unwrap();
        assert_eq!(job.len(), 2);
        assert!(job.keys().all(|k| k == "${{ insert }}"));
    }

    #[test]
    fn test_expression_in_flow_sequence() {
        let value = YamlParser::parse("items: [${{ parameters.a }}, b]\n").unwrap();
        let items = value.get("items").and_then(Value::as_sequence).unwrap();
        assert_eq!(items[0], Value::string("${{ parameters.a }}"));
    }

    #[test]
    fn test_non_string_keys_are_stringified() {
        let value = YamlParser::parse("1: one\ntrue: yes\n").unwrap();
        let map = value.as_mapping().unwrap();
        assert!(map.contains_key("1"));
        assert!(map.contains_key("true"));
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(YamlParser::parse("key: [unclosed").is_err());
    }
}
