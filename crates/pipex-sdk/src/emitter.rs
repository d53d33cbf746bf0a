//! YAML emitter
//!
//! Writes an expanded document in block style with two-space indentation,
//! consulting a `StylePlan` for scalars whose source formatting should
//! survive. Strings without a plan entry are written plain when that reads
//! back as the same string, otherwise quoted; multi-line strings become
//! literal blocks.

use crate::fidelity::{Chomping, ScalarFormat, StylePlan};
use once_cell::sync::Lazy;
use pipex_core::types::format_number;
use pipex_core::{Mapping, Value};
use regex::Regex;

const INDENT: usize = 2;

/// Words a YAML 1.1 reader resolves to something other than a string
const RESERVED: [&str; 15] = [
    "null", "~", "true", "false", "yes", "no", "on", "off", "y", "n", ".inf", "-.inf", "+.inf",
    ".nan", "<<",
];

static NUMERIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:[-+]?(?:[0-9][0-9_]*(?:\.[0-9_]*)?|\.[0-9_]+)(?:[eE][-+]?[0-9]+)?|0x[0-9a-fA-F_]+|0o[0-7_]+|0b[01_]+|[-+]?[0-9][0-9_]*(?::[0-5]?[0-9])+(?:\.[0-9_]*)?)$",
    )
    .unwrap()
});

/// Render `value` as a YAML document
pub fn to_yaml_string(value: &Value, plan: &StylePlan) -> String {
    let mut emitter = Emitter {
        plan,
        out: String::new(),
    };
    emitter.document(value);
    emitter.out
}

struct Emitter<'a> {
    plan: &'a StylePlan,
    out: String,
}

impl<'a> Emitter<'a> {
    fn document(&mut self, value: &Value) {
        match value {
            Value::Mapping(map) if !map.is_empty() => self.mapping(map, "", 0, false),
            Value::Sequence(items) if !items.is_empty() => self.sequence(items, "", 0),
            Value::String(text) if text.contains('\n') => {
                let quoted = double_quoted(text);
                self.out.push_str(&quoted);
                self.out.push('\n');
            }
            other => self.scalar(other, "", 0),
        }
    }

    /// Write mapping entries at `indent`; with `inline_first` the first
    /// entry continues the current line (after `- `).
    fn mapping(&mut self, map: &Mapping, path: &str, indent: usize, inline_first: bool) {
        for (index, (key, value)) in map.iter().enumerate() {
            if index > 0 || !inline_first {
                self.pad(indent);
            }
            self.out.push_str(&render_key(key));
            self.out.push(':');
            let child = join_path(path, key);
            self.value_after_key(value, &child, indent);
        }
    }

    fn value_after_key(&mut self, value: &Value, path: &str, indent: usize) {
        match value {
            Value::Mapping(map) if !map.is_empty() => {
                self.out.push('\n');
                self.mapping(map, path, indent + INDENT, false);
            }
            Value::Sequence(items) if !items.is_empty() => {
                self.out.push('\n');
                self.sequence(items, path, indent + INDENT);
            }
            scalar => {
                self.out.push(' ');
                self.scalar(scalar, path, indent);
            }
        }
    }

    fn sequence(&mut self, items: &[Value], path: &str, indent: usize) {
        for (index, item) in items.iter().enumerate() {
            let child = join_path(path, &index.to_string());
            self.pad(indent);
            self.out.push('-');
            match item {
                Value::Mapping(map) if !map.is_empty() => {
                    self.out.push(' ');
                    self.mapping(map, &child, indent + INDENT, true);
                }
                Value::Sequence(nested) if !nested.is_empty() => {
                    self.out.push('\n');
                    self.sequence(nested, &child, indent + INDENT);
                }
                scalar => {
                    self.out.push(' ');
                    self.scalar(scalar, &child, indent);
                }
            }
        }
    }

    /// Write a scalar and its line break. `indent` is the indentation of
    /// the owning key or sequence entry.
    fn scalar(&mut self, value: &Value, path: &str, indent: usize) {
        let text = match value {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Truth(true) => "True".to_string(),
            Value::Truth(false) => "False".to_string(),
            Value::Number(n) => render_number(*n),
            Value::Mapping(_) => "{}".to_string(),
            Value::Sequence(_) => "[]".to_string(),
            Value::String(s) => {
                self.string(s, path, indent);
                return;
            }
        };
        self.out.push_str(&text);
        self.out.push('\n');
    }

    fn string(&mut self, text: &str, path: &str, indent: usize) {
        let plan = self.plan;
        let content = plan.rewrite(path).unwrap_or(text);
        let format = plan.format(path);

        if !content.contains('\n') {
            let rendered = match format {
                Some(ScalarFormat::SingleQuoted) if !has_control(content) => single_quoted(content),
                Some(ScalarFormat::DoubleQuoted) => double_quoted(content),
                _ => render_plain_or_quoted(content),
            };
            self.out.push_str(&rendered);
            self.out.push('\n');
            return;
        }

        if !block_safe(content) {
            self.out.push_str(&double_quoted(content));
            self.out.push('\n');
            return;
        }

        match format {
            Some(ScalarFormat::Folded { chomp, raw }) => {
                self.block('>', content, *chomp, indent, |lines| {
                    if *raw {
                        lines.iter().map(|l| l.to_string()).collect()
                    } else {
                        fold_exact(lines)
                    }
                })
            }
            Some(ScalarFormat::Literal { chomp }) => {
                self.block('|', content, *chomp, indent, |lines| {
                    lines.iter().map(|l| l.to_string()).collect()
                })
            }
            _ => self.block('|', content, None, indent, |lines| {
                lines.iter().map(|l| l.to_string()).collect()
            }),
        }
    }

    fn block<F>(&mut self, indicator: char, content: &str, chomp: Option<Chomping>, indent: usize, render: F)
    where
        F: FnOnce(&[&str]) -> Vec<String>,
    {
        let chomp = chomp.unwrap_or_else(|| Chomping::for_content(content));
        let body = content.trim_end_matches('\n');
        let trailing = content.len() - body.len();
        let lines: Vec<&str> = body.split('\n').collect();

        self.out.push(indicator);
        if lines
            .iter()
            .find(|l| !l.is_empty())
            .is_some_and(|l| is_more_indented(l))
        {
            self.out.push_str(&INDENT.to_string());
        }
        self.out.push_str(chomp.indicator());
        self.out.push('\n');

        for line in render(&lines) {
            if line.is_empty() {
                self.out.push('\n');
            } else {
                self.pad(indent + INDENT);
                self.out.push_str(&line);
                self.out.push('\n');
            }
        }
        if chomp == Chomping::Keep {
            for _ in 1..trailing {
                self.out.push('\n');
            }
        }
    }

    fn pad(&mut self, width: usize) {
        self.out.extend(std::iter::repeat(' ').take(width));
    }
}

/// Lines for a `>` block that reads back as exactly `lines` joined by
/// newlines: a break between two unindented text lines folds to a space,
/// so it is written as one more blank line.
fn fold_exact(lines: &[&str]) -> Vec<String> {
    let mut out = Vec::with_capacity(lines.len() * 2);
    let mut previous: Option<&str> = None;
    let mut blanks = 0usize;

    for line in lines {
        if line.is_empty() {
            blanks += 1;
            continue;
        }
        let folds = previous.is_some_and(|p| !is_more_indented(p)) && !is_more_indented(line);
        let empties = if folds { blanks + 1 } else { blanks };
        out.extend(std::iter::repeat(String::new()).take(empties));
        out.push(line.to_string());
        previous = Some(line);
        blanks = 0;
    }
    out
}

fn is_more_indented(line: &str) -> bool {
    line.starts_with(' ') || line.starts_with('\t')
}

fn block_safe(content: &str) -> bool {
    !content.chars().any(|c| c.is_control() && c != '\n' && c != '\t')
        && !content
            .split('\n')
            .any(|line| !line.is_empty() && line.trim().is_empty())
}

fn render_key(key: &str) -> String {
    if key.contains('\n') || has_control(key) {
        double_quoted(key)
    } else {
        render_plain_or_quoted(key)
    }
}

fn render_plain_or_quoted(text: &str) -> String {
    if is_plain_safe(text) {
        text.to_string()
    } else if has_control(text) {
        double_quoted(text)
    } else {
        single_quoted(text)
    }
}

fn render_number(n: f64) -> String {
    if n.is_nan() {
        ".nan".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { ".inf" } else { "-.inf" }.to_string()
    } else {
        format_number(n)
    }
}

/// Whether `text` reads back as the same string when written plain
pub fn is_plain_safe(text: &str) -> bool {
    let Some(first) = text.chars().next() else {
        return false;
    };
    if text.trim() != text || has_control(text) {
        return false;
    }
    if RESERVED.iter().any(|w| w.eq_ignore_ascii_case(text)) || NUMERIC.is_match(text) {
        return false;
    }
    if ",[]{}#&*!|>'\"%@`".contains(first) {
        return false;
    }
    if "-?:".contains(first) {
        let second = text[first.len_utf8()..].chars().next();
        if second.map_or(true, char::is_whitespace) {
            return false;
        }
    }
    if text.starts_with("---") || text.starts_with("...") {
        return false;
    }
    !(text.contains(": ") || text.contains(" #") || text.ends_with(':'))
}

fn has_control(text: &str) -> bool {
    text.chars().any(char::is_control)
}

fn single_quoted(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

fn double_quoted(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\0' => out.push_str("\\0"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn join_path(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_string()
    } else {
        format!("{}.{}", path, segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipex_parser::YamlParser;

    fn emit(value: &Value) -> String {
        to_yaml_string(value, &StylePlan::new())
    }

    #[test]
    fn test_block_layout() {
        let value = YamlParser::parse(
            "trigger: none\nsteps:\n- task: CmdLine@2\n  inputs:\n    script: echo hi\n- checkout: self\nempty: {}\nnone: []\n",
        )
        .unwrap();
        assert_eq!(
            emit(&value),
            "trigger: none\nsteps:\n  - task: CmdLine@2\n    inputs:\n      script: echo hi\n  - checkout: self\nempty: {}\nnone: []\n"
        );
    }

    #[test]
    fn test_nested_sequences() {
        let value = YamlParser::parse("matrix:\n- - a\n  - b\n- - c\n").unwrap();
        assert_eq!(emit(&value), "matrix:\n  -\n    - a\n    - b\n  -\n    - c\n");
    }

    #[test]
    fn test_scalar_kinds() {
        let mut map = Mapping::new();
        map.insert("a", Value::Null);
        map.insert("b", Value::Bool(true));
        map.insert("c", Value::Truth(false));
        map.insert("d", Value::Number(3.0));
        map.insert("e", Value::Number(2.5));
        assert_eq!(
            emit(&Value::Mapping(map)),
            "a: null\nb: true\nc: False\nd: 3\ne: 2.5\n"
        );
    }

    #[test]
    fn test_unsafe_strings_are_quoted() {
        let mut map = Mapping::new();
        map.insert("num", Value::string("42"));
        map.insert("word", Value::string("yes"));
        map.insert("colon", Value::string("a: b"));
        map.insert("comment", Value::string("x #y"));
        map.insert("star", Value::string("*.yml"));
        map.insert("empty", Value::string(""));
        map.insert("quote", Value::string("it's"));
        map.insert("plain", Value::string("$(Build.SourcesDirectory)/out"));
        assert_eq!(
            emit(&Value::Mapping(map)),
            "num: '42'\nword: 'yes'\ncolon: 'a: b'\ncomment: 'x #y'\nstar: '*.yml'\nempty: ''\nquote: it's\nplain: $(Build.SourcesDirectory)/out\n"
        );
    }

    #[test]
    fn test_literal_block_chomping() {
        let mut map = Mapping::new();
        map.insert("clip", Value::string("a\nb\n"));
        map.insert("strip", Value::string("a\nb"));
        map.insert("keep", Value::string("a\n\n"));
        assert_eq!(
            emit(&Value::Mapping(map)),
            "clip: |\n  a\n  b\nstrip: |-\n  a\n  b\nkeep: |+\n  a\n\n"
        );
    }

    #[test]
    fn test_literal_round_trips() {
        let source = "steps:\n  - script: |\n      echo one\n\n        indented\n      echo two\n";
        let value = YamlParser::parse(source).unwrap();
        let emitted = emit(&value);
        assert_eq!(YamlParser::parse(&emitted).unwrap(), value);
    }

    #[test]
    fn test_fold_exact_round_trips() {
        let parsed = YamlParser::parse_with_styles("text: >\n  one\n  two\n\n  three\n", true).unwrap();
        let value = Value::Mapping(
            [("text", Value::string("one\ntwo\n\nthree\n"))]
                .into_iter()
                .collect(),
        );
        let plan = crate::fidelity::restore_styles(
            &value,
            &parsed.styles,
            &pipex_core::BlockScalarHints::new(),
            false,
        );
        let emitted = to_yaml_string(&value, &plan);
        assert!(emitted.starts_with("text: >\n"));
        assert_eq!(YamlParser::parse(&emitted).unwrap(), value);
    }

    #[test]
    fn test_plain_safety() {
        assert!(is_plain_safe("echo hello"));
        assert!(is_plain_safe("-foo"));
        assert!(!is_plain_safe("- foo"));
        assert!(!is_plain_safe("1e3"));
        assert!(!is_plain_safe("0x1F"));
        assert!(!is_plain_safe(" padded"));
        assert!(!is_plain_safe("key:"));
        assert!(is_plain_safe("1.2.3"));
    }
}
