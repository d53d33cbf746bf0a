//! Document expander
//!
//! Walks a document tree and produces the expanded tree:
//!
//! * `${{ if }}` / `${{ elseif }}` / `${{ else }}` chains keep one branch
//! * `${{ each x in coll }}` repeats its body with `x` and `xIndex` bound
//! * `${{ insert }}` shallow-merges its value into the enclosing mapping
//! * `template:` references are replaced by the expanded template body
//! * scalars are evaluated or interpolated
//!
//! Variables are published to the shared context as soon as their entry
//! is expanded, so later siblings and nested templates can read them.

use crate::error::Result;
use crate::normalize::{normalize, Position};
use crate::template_resolver::TemplateResolver;
use pipex_core::{Directive, Mapping, Value};
use pipex_parser::ParsedDocument;
use pipex_runtime::functions::key_value_pairs;
use pipex_runtime::interpolate::{contains_expression, runtime_placeholder};
use pipex_runtime::{whole_expression, Evaluator, ExecutionContext, Session};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// How a subtree is expanded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Template references are resolved in place
    Resolve,
    /// Template references are kept as written
    Literal,
    /// Call-site template parameters: kept literal, undefined stays null,
    /// no canonicalization and no variable publishing
    Parameters,
}

impl Mode {
    fn resolves_templates(self) -> bool {
        self == Mode::Resolve
    }

    fn for_insert(self) -> Mode {
        match self {
            Mode::Parameters => Mode::Parameters,
            _ => Mode::Literal,
        }
    }
}

type DirectiveEntry<'v> = Option<(Directive, &'v Value)>;

/// Document expander
pub struct Expander<'s> {
    evaluator: Evaluator<'s>,
    /// Templates already loaded from disk
    template_cache: RefCell<HashMap<PathBuf, ParsedDocument>>,
}

impl<'s> Expander<'s> {
    pub fn new(session: &'s Session) -> Self {
        Self {
            evaluator: Evaluator::new(session),
            template_cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn evaluator(&self) -> &Evaluator<'s> {
        &self.evaluator
    }

    /// Expand a root document.
    ///
    /// Root `parameters` declarations are consumed by the caller and
    /// dropped; a root `extends` is replaced by the entries of the
    /// expanded template.
    pub fn expand_document(&self, root: &Value, ctx: &ExecutionContext) -> Result<Value> {
        let Value::Mapping(map) = root else {
            return self.expand(root, ctx, None);
        };

        let mut body = map.clone();
        body.remove("parameters");
        let extends = body.remove("extends");

        let expanded = self.expand_node(&Value::Mapping(body), ctx, Position::Root, Mode::Resolve)?;
        let Value::Mapping(mut out) = expanded else {
            return Ok(expanded);
        };

        match extends {
            Some(Value::Mapping(reference)) if is_template_reference(&reference) => {
                let extended = TemplateResolver::new(self).resolve_document(&reference, ctx)?;
                tracing::debug!(entries = extended.len(), "merging extended template");
                for (key, value) in extended {
                    out.insert(key, value);
                }
            }
            Some(other) => {
                let value = self.expand_node(&other, ctx, Position::Value("extends"), Mode::Resolve)?;
                out.insert("extends", value);
            }
            None => {}
        }
        Ok(Value::Mapping(out))
    }

    /// Expand `node`, which is the value of `parent_key` (or the root)
    pub fn expand(&self, node: &Value, ctx: &ExecutionContext, parent_key: Option<&str>) -> Result<Value> {
        let position = parent_key.map_or(Position::Root, Position::Value);
        self.expand_node(node, ctx, position, Mode::Resolve)
    }

    pub(crate) fn expand_node(
        &self,
        node: &Value,
        ctx: &ExecutionContext,
        position: Position<'_>,
        mode: Mode,
    ) -> Result<Value> {
        match node {
            Value::String(text) => self.expand_string(text, ctx, position, mode),
            Value::Sequence(items) => {
                let key = position.key().unwrap_or_default();
                Ok(Value::Sequence(self.expand_sequence(items, ctx, key, mode)?))
            }
            Value::Mapping(map) => {
                if mode.resolves_templates() && position != Position::Root && is_template_reference(map) {
                    let mut items = TemplateResolver::new(self).resolve(map, ctx)?;
                    return Ok(if items.len() == 1 {
                        items.remove(0)
                    } else {
                        Value::Sequence(items)
                    });
                }
                self.expand_mapping(map, ctx, position, mode).map(Value::Mapping)
            }
            other => Ok(other.clone()),
        }
    }

    fn expand_string(
        &self,
        text: &str,
        ctx: &ExecutionContext,
        position: Position<'_>,
        mode: Mode,
    ) -> Result<Value> {
        if let Some(inner) = whole_expression(text) {
            return match self.evaluator.evaluate(&inner, ctx) {
                Some(value) => self.expand_result(value, ctx, position, mode),
                None => Ok(match runtime_placeholder(&inner) {
                    Some(placeholder) => Value::String(placeholder),
                    None if mode == Mode::Parameters => Value::Null,
                    None => Value::string(""),
                }),
            };
        }

        if !contains_expression(text) {
            return Ok(Value::string(text));
        }

        let result = self.evaluator.interpolate(text, ctx);
        if text.contains('\n') {
            ctx.record_block_scalar(
                &result.text,
                result.had_expression,
                result.last_line_had_expression,
            );
        }
        Ok(Value::String(result.text))
    }

    /// Native value of a whole-string expression.
    ///
    /// Collections coming out of parameters may still hold template
    /// references and shorthand steps; they are walked again here.
    fn expand_result(
        &self,
        value: Value,
        ctx: &ExecutionContext,
        position: Position<'_>,
        mode: Mode,
    ) -> Result<Value> {
        match value {
            Value::Mapping(_) | Value::Sequence(_) if mode.resolves_templates() => {
                self.expand_node(&value, ctx, position, mode)
            }
            other => Ok(other),
        }
    }

    fn expand_sequence(
        &self,
        items: &[Value],
        ctx: &ExecutionContext,
        key: &str,
        mode: Mode,
    ) -> Result<Vec<Value>> {
        let directives: Vec<DirectiveEntry<'_>> = items.iter().map(item_directive).collect();
        let mut out = Vec::with_capacity(items.len());
        let mut index = 0;

        while index < items.len() {
            if let Some((directive, body)) = &directives[index] {
                match directive {
                    Directive::Each {
                        variable,
                        collection,
                    } => {
                        for frame in self.each_frames(variable, collection, ctx) {
                            out.extend(self.expand_sequence(as_items(body), &frame, key, mode)?);
                        }
                    }
                    Directive::Insert => {
                        out.extend(self.expand_sequence(as_items(body), ctx, key, mode.for_insert())?);
                    }
                    _ => {
                        let (next, selected) = self.select_branch(&directives, index, ctx);
                        if let Some(body) = selected {
                            out.extend(self.expand_sequence(as_items(body), ctx, key, mode)?);
                        }
                        index = next;
                        continue;
                    }
                }
                index += 1;
                continue;
            }

            let item = &items[index];
            index += 1;

            if let Value::Mapping(map) = item {
                if mode.resolves_templates() && is_template_reference(map) {
                    for value in TemplateResolver::new(self).resolve(map, ctx)? {
                        self.publish_item(&value, ctx, key, mode);
                        out.push(value);
                    }
                    continue;
                }
            }

            let spliced = item.as_str().is_some_and(|s| whole_expression(s).is_some());
            match self.expand_node(item, ctx, Position::Item(key), mode)? {
                Value::Sequence(values) if spliced => {
                    for value in values {
                        self.publish_item(&value, ctx, key, mode);
                        out.push(value);
                    }
                }
                value => {
                    self.publish_item(&value, ctx, key, mode);
                    out.push(value);
                }
            }
        }

        Ok(out)
    }

    fn expand_mapping(
        &self,
        map: &Mapping,
        ctx: &ExecutionContext,
        position: Position<'_>,
        mode: Mode,
    ) -> Result<Mapping> {
        let mut out = Mapping::with_capacity(map.len());
        self.expand_entries(map, ctx, position, mode, &mut out)?;
        Ok(match mode {
            Mode::Parameters => out,
            _ => normalize(out, position),
        })
    }

    /// Expand the entries of `map` into `out`
    fn expand_entries(
        &self,
        map: &Mapping,
        ctx: &ExecutionContext,
        position: Position<'_>,
        mode: Mode,
        out: &mut Mapping,
    ) -> Result<()> {
        let entries: Vec<(&String, &Value)> = map.iter().collect();
        let directives: Vec<DirectiveEntry<'_>> = entries
            .iter()
            .map(|(k, v)| Directive::classify(k).map(|d| (d, *v)))
            .collect();
        let mut index = 0;

        while index < entries.len() {
            if let Some((directive, body)) = &directives[index] {
                match directive {
                    Directive::Each {
                        variable,
                        collection,
                    } => {
                        for frame in self.each_frames(variable, collection, ctx) {
                            self.expand_body_entries(body, &frame, position, mode, out)?;
                        }
                    }
                    Directive::Insert => {
                        self.expand_body_entries(body, ctx, position, mode.for_insert(), out)?;
                    }
                    _ => {
                        let (next, selected) = self.select_branch(&directives, index, ctx);
                        if let Some(body) = selected {
                            self.expand_body_entries(body, ctx, position, mode, out)?;
                        }
                        index = next;
                        continue;
                    }
                }
                index += 1;
                continue;
            }

            let (raw_key, value) = entries[index];
            index += 1;

            let key = if contains_expression(raw_key) {
                self.evaluator.interpolate(raw_key, ctx).text
            } else {
                raw_key.clone()
            };
            let expanded = self.expand_node(value, ctx, Position::Value(&key), mode)?;
            self.publish_entry(&key, &expanded, ctx, position, mode);
            out.insert(key, expanded);
        }

        Ok(())
    }

    /// Merge a directive body into the enclosing mapping
    fn expand_body_entries(
        &self,
        body: &Value,
        ctx: &ExecutionContext,
        position: Position<'_>,
        mode: Mode,
        out: &mut Mapping,
    ) -> Result<()> {
        match body {
            Value::Mapping(map) => self.expand_entries(map, ctx, position, mode, out),
            Value::Null => Ok(()),
            other => match self.expand_node(other, ctx, position, mode)? {
                Value::Mapping(map) => {
                    for (key, value) in map {
                        self.publish_entry(&key, &value, ctx, position, mode);
                        out.insert(key, value);
                    }
                    Ok(())
                }
                Value::Null => Ok(()),
                Value::String(s) if s.is_empty() => Ok(()),
                value => {
                    tracing::warn!(
                        kind = value.type_name(),
                        "directive body inside a mapping is not a mapping, ignoring it"
                    );
                    Ok(())
                }
            },
        }
    }

    /// Walk the conditional chain starting at `start`.
    ///
    /// Every consecutive `if`/`elseif` belongs to the chain, which ends
    /// after the first `else`. Returns the index just past the chain and
    /// the body of the first branch whose condition holds. Conditions
    /// after it are not evaluated.
    fn select_branch<'v>(
        &self,
        directives: &[DirectiveEntry<'v>],
        start: usize,
        ctx: &ExecutionContext,
    ) -> (usize, Option<&'v Value>) {
        let mut selected = None;
        let mut index = start;

        if let Some(Some((directive, _))) = directives.get(start) {
            if directive.continues_chain() {
                tracing::warn!(directive = ?directive, "conditional branch without a preceding if");
            }
        }

        while let Some(Some((directive, body))) = directives.get(index) {
            match directive {
                Directive::If(condition) | Directive::ElseIf(condition) => {
                    if selected.is_none() {
                        let holds = self.evaluator.evaluate_condition(condition, ctx);
                        tracing::trace!(condition = %condition, holds, "conditional branch");
                        if holds {
                            selected = Some(*body);
                        }
                    }
                }
                Directive::Else => {
                    if selected.is_none() {
                        selected = Some(*body);
                    }
                    index += 1;
                    break;
                }
                _ => break,
            }
            index += 1;
        }

        (index, selected)
    }

    /// One child frame per element of an `each` collection
    fn each_frames(&self, variable: &str, collection: &str, ctx: &ExecutionContext) -> Vec<ExecutionContext> {
        let items = match self.evaluator.evaluate(collection, ctx) {
            Some(Value::Sequence(items)) => items,
            Some(Value::Mapping(map)) => key_value_pairs(&map),
            None | Some(Value::Null) => Vec::new(),
            Some(other) => {
                tracing::warn!(
                    collection = %collection,
                    kind = other.type_name(),
                    "each over a scalar yields nothing"
                );
                Vec::new()
            }
        };

        let index_name = format!("{}Index", variable);
        items
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                ctx.child_with_locals([
                    (variable.to_string(), item),
                    (index_name.clone(), Value::Number(i as f64)),
                ])
            })
            .collect()
    }

    /// `{name, value}` items of a variables sequence are visible at once
    fn publish_item(&self, item: &Value, ctx: &ExecutionContext, key: &str, mode: Mode) {
        if key != "variables" || mode == Mode::Parameters {
            return;
        }
        if let Some(map) = item.as_mapping() {
            if let (Some(name), Some(value)) = (map.get("name").and_then(Value::as_str), map.get("value")) {
                ctx.set_variable(name, value.clone());
            }
        }
    }

    /// Entries of a variables mapping are visible at once
    fn publish_entry(
        &self,
        key: &str,
        value: &Value,
        ctx: &ExecutionContext,
        position: Position<'_>,
        mode: Mode,
    ) {
        if position == Position::Value("variables") && mode != Mode::Parameters {
            ctx.set_variable(key, value.clone());
        }
    }

    pub(crate) fn cached_template(&self, path: &Path) -> Option<ParsedDocument> {
        self.template_cache.borrow().get(path).cloned()
    }

    pub(crate) fn cache_template(&self, path: PathBuf, document: ParsedDocument) {
        self.template_cache.borrow_mut().insert(path, document);
    }

    /// Number of templates loaded so far
    pub fn cached_templates(&self) -> usize {
        self.template_cache.borrow().len()
    }
}

/// `{template: ...}` mapping
pub fn is_template_reference(map: &Mapping) -> bool {
    matches!(map.get("template"), Some(Value::String(_)))
}

fn item_directive(item: &Value) -> DirectiveEntry<'_> {
    let (key, body) = item.as_mapping()?.single_entry()?;
    Directive::classify(key).map(|d| (d, body))
}

fn as_items(body: &Value) -> &[Value] {
    match body {
        Value::Sequence(items) => items,
        Value::Null => &[],
        other => std::slice::from_ref(other),
    }
}
