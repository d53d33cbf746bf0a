//! Expression evaluator
//!
//! Evaluates expression text against an `ExecutionContext`. Evaluation
//! never fails: an expression that does not parse is returned as literal
//! text, unless it looks like a context path, which is then resolved
//! leniently. `None` is the language's `undefined`.

use crate::compare::{compare_values, to_boolean, to_number};
use crate::context::ExecutionContext;
use crate::functions;
use crate::session::Session;
use once_cell::sync::Lazy;
use pipex_core::ast::{BinaryOperator, Expression, LogicalOperator, UnaryOperator};
use pipex_core::{Mapping, Value};
use regex::Regex;
use std::cmp::Ordering;

/// Text that starts like a dotted or indexed context path
static PATH_LIKE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][\w-]*\s*[.\[]").unwrap());

/// One segment of a leniently parsed path
static PATH_SEGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^\s*(?:\.\s*([A-Za-z_][\w-]*)|\[\s*'([^']*)'\s*\]|\[\s*"([^"]*)"\s*\]|\[\s*(-?\d+)\s*\])"#)
        .unwrap()
});

static PATH_ROOT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([A-Za-z_][\w-]*)").unwrap());

pub struct Evaluator<'s> {
    session: &'s Session,
}

impl<'s> Evaluator<'s> {
    pub fn new(session: &'s Session) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &'s Session {
        self.session
    }

    /// Evaluate expression text (without the `${{ }}` delimiters)
    pub fn evaluate(&self, text: &str, ctx: &ExecutionContext) -> Option<Value> {
        let text = text.trim();
        match self.session.parse(text) {
            Some(ast) => self.eval(&ast, ctx),
            None if PATH_LIKE.is_match(text) => self.resolve_path_leniently(text, ctx),
            None => Some(Value::string(text)),
        }
    }

    /// Evaluate a condition to a boolean
    pub fn evaluate_condition(&self, text: &str, ctx: &ExecutionContext) -> bool {
        let result = self.evaluate(text, ctx);
        tracing::trace!(condition = text, result = ?result, "evaluated condition");
        to_boolean(result.as_ref())
    }

    pub fn eval(&self, expr: &Expression, ctx: &ExecutionContext) -> Option<Value> {
        match expr {
            Expression::Literal(value) => Some(value.clone()),

            Expression::Identifier(name) => ctx.lookup(name),

            Expression::Member {
                object,
                property,
                computed,
            } => {
                let target = self.eval(object, ctx)?;
                let key = if *computed {
                    self.eval(property, ctx)?
                } else {
                    match property.as_ref() {
                        Expression::Identifier(name) => Value::string(name),
                        other => self.eval(other, ctx)?,
                    }
                };
                member(&target, &key, member_depth(object) + 1)
            }

            Expression::Call { callee, args } => self.call(callee, args, ctx),

            Expression::Unary { op, operand } => {
                let value = self.eval(operand, ctx);
                match op {
                    UnaryOperator::Not => Some(Value::Truth(!to_boolean(value.as_ref()))),
                    UnaryOperator::Negate => to_number(value.as_ref()).map(|n| Value::Number(-n)),
                    UnaryOperator::Plus => to_number(value.as_ref()).map(Value::Number),
                }
            }

            Expression::Binary { left, op, right } => {
                let left = self.eval(left, ctx);
                let right = self.eval(right, ctx);
                binary(*op, left.as_ref(), right.as_ref())
            }

            Expression::Logical { left, op, right } => {
                let left = self.eval(left, ctx);
                let truthy = to_boolean(left.as_ref());
                match (op, truthy) {
                    (LogicalOperator::And, false) | (LogicalOperator::Or, true) => left,
                    _ => self.eval(right, ctx),
                }
            }

            Expression::Conditional {
                test,
                consequent,
                alternate,
            } => {
                if to_boolean(self.eval(test, ctx).as_ref()) {
                    self.eval(consequent, ctx)
                } else {
                    self.eval(alternate, ctx)
                }
            }

            Expression::Array(items) => Some(Value::Sequence(
                items
                    .iter()
                    .map(|item| self.eval(item, ctx).unwrap_or(Value::Null))
                    .collect(),
            )),

            Expression::Object(entries) => {
                let mut map = Mapping::new();
                for (key, value) in entries {
                    map.insert(key.clone(), self.eval(value, ctx).unwrap_or(Value::Null));
                }
                Some(Value::Mapping(map))
            }
        }
    }

    fn call(&self, callee: &Expression, args: &[Expression], ctx: &ExecutionContext) -> Option<Value> {
        let mut values: Vec<Option<Value>> = args.iter().map(|a| self.eval(a, ctx)).collect();

        match callee {
            Expression::Identifier(name) => {
                if ctx.locals.contains_key(name) {
                    return None;
                }
                functions::call(name, &values, self.session)
            }
            Expression::Member {
                object,
                property,
                computed: false,
            } => {
                let Expression::Identifier(method) = property.as_ref() else {
                    return None;
                };
                if functions::is_receiver_method(method) {
                    let receiver = self.eval(object, ctx);
                    values.insert(0, receiver);
                }
                functions::call(method, &values, self.session)
            }
            _ => None,
        }
    }

    /// Resolve `root.a['b'][0]` segment by segment without the parser
    fn resolve_path_leniently(&self, text: &str, ctx: &ExecutionContext) -> Option<Value> {
        let root = PATH_ROOT.captures(text)?;
        let mut rest = &text[root[0].len()..];
        let mut current = ctx.lookup(&root[1])?;
        let mut depth = 0;

        while !rest.trim().is_empty() {
            let caps = PATH_SEGMENT.captures(rest)?;
            let key = (1..=4)
                .find_map(|i| caps.get(i))
                .map(|m| m.as_str().to_string())?;
            depth += 1;
            current = member(&current, &Value::String(key), depth)?;
            rest = &rest[caps[0].len()..];
        }

        Some(current)
    }
}

/// Number of member steps between an expression and its root identifier
fn member_depth(expr: &Expression) -> usize {
    match expr {
        Expression::Member { object, .. } => member_depth(object) + 1,
        _ => 0,
    }
}

/// Property access.
///
/// An absent key directly below the root is undefined; deeper absent keys
/// on an existing mapping read as the empty string.
fn member(target: &Value, key: &Value, depth: usize) -> Option<Value> {
    match target {
        Value::Null => None,
        Value::Mapping(map) => {
            let name = key.to_display_string();
            match map.get(&name) {
                Some(v) => Some(v.clone()),
                None if depth >= 2 => Some(Value::string("")),
                None => None,
            }
        }
        Value::Sequence(items) => {
            if key.as_str() == Some("length") {
                return Some(Value::Number(items.len() as f64));
            }
            let index = to_number(Some(key))?;
            if index < 0.0 || index.fract() != 0.0 {
                return None;
            }
            items.get(index as usize).cloned()
        }
        Value::String(s) if key.as_str() == Some("length") => {
            Some(Value::Number(s.chars().count() as f64))
        }
        _ => None,
    }
}

fn binary(op: BinaryOperator, left: Option<&Value>, right: Option<&Value>) -> Option<Value> {
    let ordering = || compare_values(left, right);
    let numbers = || Some((to_number(left)?, to_number(right)?));

    Some(match op {
        BinaryOperator::Eq => Value::Truth(ordering() == Ordering::Equal),
        BinaryOperator::Ne => Value::Truth(ordering() != Ordering::Equal),
        BinaryOperator::Lt => Value::Truth(ordering() == Ordering::Less),
        BinaryOperator::Gt => Value::Truth(ordering() == Ordering::Greater),
        BinaryOperator::Le => Value::Truth(ordering() != Ordering::Greater),
        BinaryOperator::Ge => Value::Truth(ordering() != Ordering::Less),
        BinaryOperator::Add => match (left, right) {
            (Some(Value::Number(a)), Some(Value::Number(b))) => Value::Number(a + b),
            _ => {
                let text = |v: Option<&Value>| v.map(Value::to_display_string).unwrap_or_default();
                Value::String(text(left) + &text(right))
            }
        },
        BinaryOperator::Sub => {
            let (a, b) = numbers()?;
            Value::Number(a - b)
        }
        BinaryOperator::Mul => {
            let (a, b) = numbers()?;
            Value::Number(a * b)
        }
        BinaryOperator::Div => {
            let (a, b) = numbers()?;
            Value::Number(a / b)
        }
        BinaryOperator::Mod => {
            let (a, b) = numbers()?;
            Value::Number(a % b)
        }
    })
}
