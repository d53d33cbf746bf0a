//! Control-flow directives
//!
//! A directive is recognized purely from the textual shape of a mapping key:
//!
//! ```text
//! ${{ if <condition> }}
//! ${{ elseif <condition> }}
//! ${{ else }}
//! ${{ each <variable> in <collection> }}
//! ${{ insert }}
//! ```
//!
//! Classification happens once per key; the expander never re-parses the
//! directive syntax.

/// A recognized directive key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    If(String),
    ElseIf(String),
    Else,
    Each { variable: String, collection: String },
    Insert,
}

impl Directive {
    /// Classify a raw key string, `None` when it is not a directive
    pub fn classify(key: &str) -> Option<Directive> {
        let inner = key
            .trim()
            .strip_prefix("${{")?
            .strip_suffix("}}")?
            .trim();

        match inner {
            "else" => return Some(Directive::Else),
            "insert" => return Some(Directive::Insert),
            _ => {}
        }

        if let Some(condition) = strip_keyword(inner, "elseif") {
            return Some(Directive::ElseIf(condition.to_string()));
        }
        if let Some(rest) = strip_keyword(inner, "else") {
            if let Some(condition) = strip_keyword(rest, "if") {
                return Some(Directive::ElseIf(condition.to_string()));
            }
            return None;
        }
        if let Some(condition) = strip_keyword(inner, "if") {
            return Some(Directive::If(condition.to_string()));
        }
        if let Some(rest) = strip_keyword(inner, "each") {
            return parse_each(rest);
        }

        None
    }

    /// `if`, `elseif` or `else`
    pub fn is_conditional(&self) -> bool {
        matches!(
            self,
            Directive::If(_) | Directive::ElseIf(_) | Directive::Else
        )
    }

    /// Whether this directive continues a chain started by an earlier `if`
    pub fn continues_chain(&self) -> bool {
        matches!(self, Directive::ElseIf(_) | Directive::Else)
    }
}

/// Strip a leading keyword followed by whitespace or `(`
fn strip_keyword<'a>(input: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = input.strip_prefix(keyword)?;
    let next = rest.chars().next()?;
    if !(next.is_whitespace() || next == '(') {
        return None;
    }
    let rest = rest.trim();
    if rest.is_empty() {
        None
    } else {
        Some(rest)
    }
}

fn parse_each(rest: &str) -> Option<Directive> {
    let (variable, collection) = rest.split_once(char::is_whitespace)?;
    let collection = collection.trim_start().strip_prefix("in")?;
    if !collection.starts_with(char::is_whitespace) {
        return None;
    }
    let collection = collection.trim();

    let valid_name = variable
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && variable
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if !valid_name || collection.is_empty() {
        return None;
    }

    Some(Directive::Each {
        variable: variable.to_string(),
        collection: collection.to_string(),
    })
}
