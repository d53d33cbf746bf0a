//! Scalar style scanner
//!
//! Walks the position-marked tree of a document and records which scalars
//! were quoted or written as block scalars. Records are keyed by exact
//! path, by context key and, for empty or glob-like values, by a universal
//! fallback key (see `pipex_core::style`).

use crate::yaml_parser::YamlParser;
use marked_yaml::Node;
use pipex_core::{ScalarStyle, StyleRecords};

/// Keys that name the context of the mapping they appear in, by priority
const CONTEXT_KEYS: [&str; 3] = ["displayName", "task", "name"];

/// Style scanner over protected YAML text
pub struct StyleScanner {
    record_paths: bool,
}

impl StyleScanner {
    pub fn new(record_paths: bool) -> Self {
        Self { record_paths }
    }

    /// Scan `protected` and collect style records.
    ///
    /// A document the positional parser rejects yields no records.
    pub fn scan(&self, protected: &str) -> StyleRecords {
        let mut records = StyleRecords::new();

        let node = match marked_yaml::parse_yaml(0, protected) {
            Ok(node) => node,
            Err(e) => {
                tracing::warn!(error = %e, "style scan failed, quote styles will not be preserved");
                return records;
            }
        };

        let lines: Vec<&str> = protected.lines().collect();
        let mut walk = Walk {
            lines: &lines,
            records: &mut records,
            record_paths: self.record_paths,
        };
        walk.node(&node, "", "", "");

        tracing::trace!(count = records.len(), "scanned scalar styles");
        records
    }
}

struct Walk<'a> {
    lines: &'a [&'a str],
    records: &'a mut StyleRecords,
    record_paths: bool,
}

impl<'a> Walk<'a> {
    fn node(&mut self, node: &Node, path: &str, key: &str, context: &str) {
        match node {
            Node::Scalar(scalar) => {
                let Some(style) = self.style_at(node) else {
                    return;
                };
                let value = YamlParser::restore(scalar.as_str());
                if self.record_paths && !path.is_empty() {
                    self.records.record_path(path, style);
                }
                self.records.record_context(context, key, &value, style);
                self.records.record_fallback(&value, style);
            }
            Node::Sequence(items) => {
                for (index, item) in items.iter().enumerate() {
                    let child = join_path(path, &index.to_string());
                    self.node(item, &child, key, context);
                }
            }
            Node::Mapping(map) => {
                let context = mapping_context(map).unwrap_or_else(|| context.to_string());
                for (k, v) in map.iter() {
                    let name = YamlParser::restore(k.as_str());
                    let child = join_path(path, &name);
                    self.node(v, &child, &name, &context);
                }
            }
        }
    }

    /// Style of a scalar node.
    ///
    /// Marker columns are 1-based. Quote indicators sit at the marker, or
    /// one further when the reported column is a separator. Block scalars
    /// are marked at their first content line, so their header is the last
    /// non-blank text before the marker.
    fn style_at(&self, node: &Node) -> Option<ScalarStyle> {
        let marker = node.span().start()?;
        let row = marker.line().checked_sub(1)?;
        let line = self.lines.get(row)?;
        let chars: Vec<char> = line.chars().collect();
        let column = marker.column().checked_sub(1)?;

        let quote = |c: Option<&char>| {
            c.and_then(|c| ScalarStyle::from_indicator(*c))
                .filter(ScalarStyle::is_quoted)
        };
        let at = *chars.get(column)?;
        if let Some(style) = quote(Some(&at)) {
            return Some(style);
        }
        if at.is_whitespace() || at == ':' || at == '-' {
            if let Some(style) = quote(chars.get(column + 1)) {
                return Some(style);
            }
        }
        if matches!(at, '|' | '>') {
            if let Some(style) = block_header(strip_comment(line).trim_end()) {
                return Some(style);
            }
        }
        self.block_header_before(row, &chars[..column])
    }

    fn block_header_before(&self, row: usize, head: &[char]) -> Option<ScalarStyle> {
        let mut text: String = head.iter().collect();
        let mut row = row;
        loop {
            let trimmed = strip_comment(&text).trim_end();
            if !trimmed.is_empty() {
                return block_header(trimmed);
            }
            row = row.checked_sub(1)?;
            text = self.lines.get(row)?.to_string();
        }
    }
}

/// `|` or `>` ending `text`, with any chomping and indentation indicators
fn block_header(text: &str) -> Option<ScalarStyle> {
    let header = text.trim_end_matches(|c: char| c == '-' || c == '+' || c.is_ascii_digit());
    if header.len() == text.len() && !text.ends_with(['|', '>']) {
        return None;
    }
    let mut rest = header.chars().rev();
    let indicator = rest.next()?;
    if !matches!(rest.next(), None | Some(' ') | Some('\t') | Some(':') | Some('-')) {
        return None;
    }
    match indicator {
        '|' => Some(ScalarStyle::Literal),
        '>' => Some(ScalarStyle::Folded),
        _ => None,
    }
}

fn strip_comment(text: &str) -> &str {
    match text.find(" #") {
        Some(index) => &text[..index],
        None => text,
    }
}

/// Context named by a mapping's own `displayName`, `task` or `name`
fn mapping_context(map: &marked_yaml::types::MarkedMappingNode) -> Option<String> {
    CONTEXT_KEYS.iter().find_map(|wanted| {
        map.iter().find_map(|(k, v)| match v {
            Node::Scalar(s) if k.as_str() == *wanted => Some(YamlParser::restore(s.as_str())),
            _ => None,
        })
    })
}

fn join_path(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_string()
    } else {
        format!("{}.{}", path, segment)
    }
}
