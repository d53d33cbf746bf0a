//! `${{ }}` interpolation inside strings

use crate::context::ExecutionContext;
use crate::evaluator::Evaluator;
use once_cell::sync::Lazy;
use pipex_core::Value;
use regex::Regex;

static PARAMETER_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^parameters\.([A-Za-z_][\w.-]*)$").unwrap());

/// Location of one `${{ ... }}` in a string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpressionSpan {
    /// Byte offset of `${{`
    pub start: usize,
    /// Byte offset just past `}}`
    pub end: usize,
    /// Trimmed text between the delimiters
    pub inner: String,
}

/// Find every complete `${{ ... }}` in `text`.
///
/// A `}}` inside a quoted string literal does not close the expression.
pub fn find_expressions(text: &str) -> Vec<ExpressionSpan> {
    let mut spans = Vec::new();
    let mut offset = 0;

    while let Some(found) = text[offset..].find("${{") {
        let start = offset + found;
        let body_start = start + 3;
        let Some(body_len) = closing_delimiter(&text[body_start..]) else {
            break;
        };
        let end = body_start + body_len + 2;
        spans.push(ExpressionSpan {
            start,
            end,
            inner: text[body_start..body_start + body_len].trim().to_string(),
        });
        offset = end;
    }

    spans
}

/// Byte length of the body before its closing `}}`
fn closing_delimiter(body: &str) -> Option<usize> {
    let bytes = body.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            // '' inside a single-quoted literal toggles out and back in
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'\'' || b == b'"' => quote = Some(b),
            None if b == b'}' && bytes.get(i + 1) == Some(&b'}') => return Some(i),
            None => {}
        }
        i += 1;
    }
    None
}

pub fn contains_expression(text: &str) -> bool {
    !find_expressions(text).is_empty()
}

/// The inner text when `text` is exactly one expression and nothing else
pub fn whole_expression(text: &str) -> Option<String> {
    let trimmed = text.trim();
    let spans = find_expressions(trimmed);
    match spans.as_slice() {
        [span] if span.start == 0 && span.end == trimmed.len() => Some(span.inner.clone()),
        _ => None,
    }
}

/// `$(name)` for an expression that is a bare `parameters.name` path
pub fn runtime_placeholder(inner: &str) -> Option<String> {
    PARAMETER_PATH
        .captures(inner.trim())
        .map(|caps| format!("$({})", &caps[1]))
}

/// Text form of an evaluation result inside a larger string
pub fn render(value: Option<&Value>, inner: &str) -> String {
    match value {
        Some(v) => v.to_display_string(),
        None => runtime_placeholder(inner).unwrap_or_default(),
    }
}

/// Result of interpolating one string
#[derive(Debug, Clone, PartialEq)]
pub struct Interpolated {
    pub text: String,
    /// The source held at least one expression
    pub had_expression: bool,
    /// The last non-blank source line held an expression
    pub last_line_had_expression: bool,
}

impl<'s> Evaluator<'s> {
    /// Replace every embedded expression with its rendered value.
    ///
    /// Expressions may span lines. A line whose expressions rendered it
    /// whitespace-only is emptied but keeps its line break.
    pub fn interpolate(&self, text: &str, ctx: &ExecutionContext) -> Interpolated {
        let spans = find_expressions(text);
        let last_line_had_expression = last_content_line(text)
            .is_some_and(|(start, end)| spans.iter().any(|span| span.start < end && span.end > start));

        if spans.is_empty() {
            return Interpolated {
                text: text.to_string(),
                had_expression: false,
                last_line_had_expression,
            };
        }

        let mut rendered = String::with_capacity(text.len());
        let mut touched = Vec::with_capacity(spans.len());
        let mut cursor = 0;
        for span in &spans {
            rendered.push_str(&text[cursor..span.start]);
            let value = self.evaluate(&span.inner, ctx);
            let from = rendered.len();
            rendered.push_str(&render(value.as_ref(), &span.inner));
            touched.push((from, rendered.len()));
            cursor = span.end;
        }
        rendered.push_str(&text[cursor..]);

        let mut out = String::with_capacity(rendered.len());
        let mut line_start = 0;
        for line in rendered.split_inclusive('\n') {
            let (body, newline) = match line.strip_suffix('\n') {
                Some(body) => (body, "\n"),
                None => (line, ""),
            };
            let body_end = line_start + body.len();
            let from_expression = touched
                .iter()
                .any(|&(from, to)| from <= body_end && (to > line_start || from >= line_start));
            if from_expression && body.trim().is_empty() {
                out.push_str(newline);
            } else {
                out.push_str(line);
            }
            line_start += line.len();
        }

        Interpolated {
            text: out,
            had_expression: true,
            last_line_had_expression,
        }
    }
}

/// Byte range of the last line holding more than whitespace
fn last_content_line(text: &str) -> Option<(usize, usize)> {
    let mut start = 0;
    let mut last = None;
    for line in text.split_inclusive('\n') {
        if !line.trim().is_empty() {
            last = Some((start, start + line.len()));
        }
        start += line.len();
    }
    last
}
