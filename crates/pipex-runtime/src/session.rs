//! Compilation session
//!
//! Owns the state that outlives a single expansion: the parsed-expression
//! cache and the `counter()` sequences. Results of repeated expansions on
//! one session depend on this state; use a fresh session (or `reset`) for
//! isolated runs.

use pipex_core::Expression;
use pipex_parser::ExpressionParser;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Default)]
pub struct Session {
    /// Parsed ASTs by exact source text; `None` marks a failed parse
    ast_cache: RefCell<HashMap<String, Option<Rc<Expression>>>>,
    counters: RefCell<HashMap<String, i64>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse expression text, consulting the cache first.
    ///
    /// A failed parse is cached as well and never retried.
    pub fn parse(&self, text: &str) -> Option<Rc<Expression>> {
        if let Some(cached) = self.ast_cache.borrow().get(text) {
            return cached.clone();
        }

        let parsed = match ExpressionParser::parse(text) {
            Ok(expr) => Some(Rc::new(expr)),
            Err(e) => {
                tracing::trace!(expression = text, error = %e, "expression did not parse");
                None
            }
        };
        self.ast_cache
            .borrow_mut()
            .insert(text.to_string(), parsed.clone());
        parsed
    }

    /// Next value of the counter named `key`.
    ///
    /// The first call returns `seed`; later calls ignore the seed and
    /// return the previous value plus one.
    pub fn next_counter(&self, key: &str, seed: i64) -> i64 {
        let mut counters = self.counters.borrow_mut();
        let next = match counters.get(key) {
            Some(previous) => previous.saturating_add(1),
            None => seed,
        };
        counters.insert(key.to_string(), next);
        next
    }

    /// Number of cached parse results, failures included
    pub fn cached_expressions(&self) -> usize {
        self.ast_cache.borrow().len()
    }

    /// Clear the expression cache and all counters
    pub fn reset(&self) {
        self.ast_cache.borrow_mut().clear();
        self.counters.borrow_mut().clear();
    }
}
