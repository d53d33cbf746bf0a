//! Formatting-fidelity restoration
//!
//! Maps the style records taken from the source documents onto the
//! expanded tree. Each string scalar is matched by exact path, then by
//! context key, then by universal fallback; the result is a `StylePlan`
//! keyed by output path that the emitter consults.

use once_cell::sync::Lazy;
use pipex_core::{BlockScalarHints, ScalarStyle, StyleRecords, Value};
use regex::Regex;
use std::collections::HashMap;

/// Keys that name the context of the mapping they appear in, by priority
const CONTEXT_KEYS: [&str; 3] = ["displayName", "task", "name"];

/// Source keys a normalized step's `inputs.script` can come from
const SHORTHAND_KEYS: [&str; 4] = ["script", "bash", "pwsh", "powershell"];

static HEREDOC_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<<-?\s*['"]?([A-Za-z_][A-Za-z0-9_]*)['"]?"#).unwrap());

/// Block scalar chomping indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chomping {
    /// No indicator: one trailing newline
    Clip,
    /// `-`: no trailing newline
    Strip,
    /// `+`: every trailing newline
    Keep,
}

impl Chomping {
    /// Chomping that reproduces `content` exactly
    pub fn for_content(content: &str) -> Self {
        let trailing = content.len() - content.trim_end_matches('\n').len();
        match trailing {
            0 => Chomping::Strip,
            1 => Chomping::Clip,
            _ => Chomping::Keep,
        }
    }

    pub fn indicator(&self) -> &'static str {
        match self {
            Chomping::Clip => "",
            Chomping::Strip => "-",
            Chomping::Keep => "+",
        }
    }
}

/// How the emitter writes one string scalar
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScalarFormat {
    SingleQuoted,
    DoubleQuoted,
    Literal {
        chomp: Option<Chomping>,
    },
    /// `raw` writes content lines as they are instead of preserving
    /// every line break
    Folded {
        chomp: Option<Chomping>,
        raw: bool,
    },
}

/// Per-path output decisions
#[derive(Debug, Clone, Default)]
pub struct StylePlan {
    formats: HashMap<String, ScalarFormat>,
    rewrites: HashMap<String, String>,
}

impl StylePlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn format(&self, path: &str) -> Option<&ScalarFormat> {
        self.formats.get(path)
    }

    /// Replacement content for the scalar at `path`
    pub fn rewrite(&self, path: &str) -> Option<&str> {
        self.rewrites.get(path).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }
}

/// Build the output plan for an expanded document
pub fn restore_styles(
    document: &Value,
    records: &StyleRecords,
    hints: &BlockScalarHints,
    azure_compatible: bool,
) -> StylePlan {
    let mut restorer = Restorer {
        records,
        hints,
        azure_compatible,
        plan: StylePlan::new(),
    };
    restorer.node(document, "", "", "", "");
    tracing::trace!(formats = restorer.plan.len(), "restored scalar styles");
    restorer.plan
}

struct Restorer<'a> {
    records: &'a StyleRecords,
    hints: &'a BlockScalarHints,
    azure_compatible: bool,
    plan: StylePlan,
}

impl<'a> Restorer<'a> {
    /// `outer` is the context in force before the nearest mapping that
    /// named a new one; a step's synthesized `task` shadows what the
    /// source step was recorded under.
    fn node(&mut self, value: &Value, path: &str, key: &str, context: &str, outer: &str) {
        match value {
            Value::String(text) => self.scalar(text, path, key, context, outer),
            Value::Sequence(items) => {
                for (index, item) in items.iter().enumerate() {
                    let child = join_path(path, &index.to_string());
                    self.node(item, &child, key, context, outer);
                }
            }
            Value::Mapping(map) => {
                let named = CONTEXT_KEYS
                    .iter()
                    .find_map(|k| map.get(k).filter(|v| v.is_scalar()))
                    .map(Value::to_display_string);
                let (inner, outer) = match named {
                    Some(name) if name != context => (name, context.to_string()),
                    _ => (context.to_string(), outer.to_string()),
                };
                for (k, v) in map {
                    let child = join_path(path, k);
                    self.node(v, &child, k, &inner, &outer);
                }
            }
            _ => {}
        }
    }

    fn lookup(&self, text: &str, path: &str, key: &str, context: &str, outer: &str) -> Option<ScalarStyle> {
        let found = self
            .records
            .lookup(path, context, key, text)
            .or_else(|| self.records.lookup(path, outer, key, text));
        if found.is_some() {
            return found;
        }

        let step = path.strip_suffix(".inputs.script")?;
        SHORTHAND_KEYS.iter().find_map(|alias| {
            let source_path = join_path(step, alias);
            self.records
                .lookup(&source_path, context, alias, text)
                .or_else(|| self.records.lookup(&source_path, outer, alias, text))
        })
    }

    fn scalar(&mut self, text: &str, path: &str, key: &str, context: &str, outer: &str) {
        let style = self.lookup(text, path, key, context, outer);

        if !text.contains('\n') {
            match style {
                Some(ScalarStyle::SingleQuoted) => {
                    self.plan.formats.insert(path.to_string(), ScalarFormat::SingleQuoted);
                }
                Some(ScalarStyle::DoubleQuoted) => {
                    self.plan.formats.insert(path.to_string(), ScalarFormat::DoubleQuoted);
                }
                _ => {}
            }
            return;
        }

        // Quote styles cannot carry a multi-line value
        let folded = style == Some(ScalarStyle::Folded);
        let chomp = (self.azure_compatible && self.hints.had_trailing_expression(text))
            .then_some(Chomping::Strip);

        let format = if folded {
            if self.azure_compatible {
                let separated = insert_heredoc_separators(text);
                if separated != text {
                    self.plan.rewrites.insert(path.to_string(), separated);
                }
            }
            ScalarFormat::Folded {
                chomp,
                raw: self.azure_compatible,
            }
        } else if chomp.is_some() {
            ScalarFormat::Literal { chomp }
        } else {
            return;
        };
        self.plan.formats.insert(path.to_string(), format);
    }
}

/// Add blank separator lines inside here-doc bodies.
///
/// A folded block joins adjacent lines; separating every line of a
/// `<<EOF ... EOF` body keeps it line-oriented. Bodies that already hold a
/// blank line are left alone, so the transform can be applied repeatedly.
pub fn insert_heredoc_separators(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut out: Vec<&str> = Vec::with_capacity(lines.len() * 2);
    let mut index = 0;

    while index < lines.len() {
        let line = lines[index];
        let terminator = HEREDOC_START
            .captures(line)
            .map(|caps| caps[1].to_string())
            .and_then(|tag| {
                lines[index + 1..]
                    .iter()
                    .position(|l| l.trim() == tag)
                    .map(|offset| index + 1 + offset)
            });

        let Some(end) = terminator else {
            out.push(line);
            index += 1;
            continue;
        };

        let body = &lines[index + 1..end];
        if body.iter().any(|l| l.trim().is_empty()) {
            out.extend_from_slice(&lines[index..=end]);
        } else {
            for l in &lines[index..end] {
                out.push(l);
                out.push("");
            }
            out.push(lines[end]);
        }
        index = end + 1;
    }

    out.join("\n")
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

    fn plan_for(source: &str, azure: bool, hints: &BlockScalarHints) -> StylePlan {
        let parsed = YamlParser::parse_with_styles(source, true).unwrap();
        restore_styles(&parsed.root, &parsed.styles, hints, azure)
    }

    #[test]
    fn test_quoted_numeric_string_is_kept() {
        let plan = plan_for("key: \"42\"\nother: '7'\nplain: x\n", false, &BlockScalarHints::new());
        assert_eq!(plan.format("key"), Some(&ScalarFormat::DoubleQuoted));
        assert_eq!(plan.format("other"), Some(&ScalarFormat::SingleQuoted));
        assert_eq!(plan.format("plain"), None);
    }

    #[test]
    fn test_context_key_survives_moved_paths() {
        let source = "steps:\n- displayName: Lint\n  script: 'npm run lint'\n";
        let parsed = YamlParser::parse_with_styles(source, false).unwrap();
        let moved = YamlParser::parse("jobs:\n- steps:\n  - displayName: Lint\n    script: npm run lint\n").unwrap();

        let plan = restore_styles(&moved, &parsed.styles, &BlockScalarHints::new(), false);
        assert_eq!(plan.format("jobs.0.steps.0.script"), Some(&ScalarFormat::SingleQuoted));
    }

    #[test]
    fn test_shorthand_step_style_follows_normalized_script() {
        let source = "steps:\n- bash: 'make all'\n";
        let parsed = YamlParser::parse_with_styles(source, false).unwrap();
        let normalized = YamlParser::parse(
            "steps:\n- task: Bash@3\n  inputs:\n    targetType: inline\n    script: make all\n",
        )
        .unwrap();

        let plan = restore_styles(&normalized, &parsed.styles, &BlockScalarHints::new(), false);
        assert_eq!(plan.format("steps.0.inputs.script"), Some(&ScalarFormat::SingleQuoted));
    }

    #[test]
    fn test_strip_chomp_for_trailing_expression() {
        let mut hints = BlockScalarHints::new();
        hints.record("echo a\necho b\n", true, true);
        let document = YamlParser::parse("script: |\n  echo a\n  echo b\n").unwrap();

        let plan = restore_styles(&document, &StyleRecords::new(), &hints, true);
        assert_eq!(
            plan.format("script"),
            Some(&ScalarFormat::Literal {
                chomp: Some(Chomping::Strip)
            })
        );
        let plan = restore_styles(&document, &StyleRecords::new(), &hints, false);
        assert_eq!(plan.format("script"), None);
    }

    #[test]
    fn test_heredoc_separators() {
        let text = "cat <<EOF > out.txt\nline one\nline two\nEOF\necho done";
        let separated = insert_heredoc_separators(text);
        assert_eq!(
            separated,
            "cat <<EOF > out.txt\n\nline one\n\nline two\n\nEOF\necho done"
        );
        assert_eq!(insert_heredoc_separators(&separated), separated);
    }

    #[test]
    fn test_unterminated_heredoc_untouched() {
        let text = "cat <<'END'\nno terminator";
        assert_eq!(insert_heredoc_separators(text), text);
    }

    #[test]
    fn test_chomping_for_content() {
        assert_eq!(Chomping::for_content("a"), Chomping::Strip);
        assert_eq!(Chomping::for_content("a\n"), Chomping::Clip);
        assert_eq!(Chomping::for_content("a\n\n"), Chomping::Keep);
    }
}
