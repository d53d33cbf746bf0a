//! Execution context
//!
//! The scoped environment expressions are evaluated against. Frames form a
//! tree: a loop iteration extends `locals` and shares everything else, a
//! template frame swaps `parameters` and the base directory but keeps
//! sharing `variables`, so variables published anywhere in the walk are
//! visible to every entry processed after them.

use crate::resources::Resources;
use pipex_core::{FormattingState, Mapping, StyleRecords, Value};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Parameters of the current template frame
    pub parameters: Rc<Mapping>,

    /// Variables shared by every frame of one expansion
    pub variables: Rc<RefCell<Mapping>>,

    /// Variable names supplied by the caller; documents cannot overwrite them
    pub pinned_variables: Rc<HashSet<String>>,

    pub resources: Rc<Resources>,

    /// Loop bindings, shadowing parameters and variables
    pub locals: Mapping,

    /// Directory relative template paths resolve against
    pub base_dir: PathBuf,

    /// Directory of the root document
    pub root_dir: PathBuf,

    /// Root of the repository the current template came from
    pub repository_base_dir: Option<PathBuf>,

    /// Caller-supplied repository locations by alias
    pub resource_locations: Rc<HashMap<String, String>>,

    /// Display names of the templates being expanded, outermost first
    pub template_stack: Vec<String>,

    pub formatting: Rc<RefCell<FormattingState>>,
}

impl ExecutionContext {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        Self {
            parameters: Rc::new(Mapping::new()),
            variables: Rc::new(RefCell::new(Mapping::new())),
            pinned_variables: Rc::new(HashSet::new()),
            resources: Rc::new(Resources::default()),
            locals: Mapping::new(),
            root_dir: base_dir.clone(),
            base_dir,
            repository_base_dir: None,
            resource_locations: Rc::new(HashMap::new()),
            template_stack: Vec::new(),
            formatting: Rc::new(RefCell::new(FormattingState::default())),
        }
    }

    pub fn with_parameters(mut self, parameters: Mapping) -> Self {
        self.parameters = Rc::new(parameters);
        self
    }

    pub fn with_variables(mut self, variables: Mapping) -> Self {
        self.variables = Rc::new(RefCell::new(variables));
        self
    }

    /// Caller variables: seeded and protected from document overwrites
    pub fn with_pinned_variables(mut self, variables: Mapping) -> Self {
        self.pinned_variables = Rc::new(variables.keys().cloned().collect());
        {
            let mut shared = self.variables.borrow_mut();
            for (k, v) in variables {
                shared.insert(k, v);
            }
        }
        self
    }

    pub fn with_resources(mut self, resources: Resources) -> Self {
        self.resources = Rc::new(resources);
        self
    }

    pub fn with_locals(mut self, locals: Mapping) -> Self {
        self.locals = locals;
        self
    }

    pub fn with_repository_base_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.repository_base_dir = dir;
        self
    }

    pub fn with_resource_locations(mut self, locations: HashMap<String, String>) -> Self {
        self.resource_locations = Rc::new(locations);
        self
    }

    pub fn with_template_stack(mut self, stack: Vec<String>) -> Self {
        self.template_stack = stack;
        self
    }

    pub fn with_styles(self, styles: StyleRecords) -> Self {
        self.formatting.borrow_mut().styles.merge(styles);
        self
    }

    /// Child frame for a loop iteration
    pub fn child_with_locals(&self, bindings: impl IntoIterator<Item = (String, Value)>) -> Self {
        let mut child = self.clone();
        for (k, v) in bindings {
            child.locals.insert(k, v);
        }
        child
    }

    /// Frame for an included template
    pub fn template_frame(
        &self,
        parameters: Mapping,
        base_dir: PathBuf,
        repository_base_dir: Option<PathBuf>,
        label: impl Into<String>,
    ) -> Self {
        let mut frame = self.clone();
        frame.parameters = Rc::new(parameters);
        frame.locals = Mapping::new();
        frame.base_dir = base_dir;
        frame.repository_base_dir = repository_base_dir;
        frame.template_stack.push(label.into());
        frame
    }

    /// Resolve a bare identifier
    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(v) = self.locals.get(name) {
            return Some(v.clone());
        }
        if let Some(v) = self.parameters.get(name) {
            return Some(v.clone());
        }
        if let Some(v) = self.variables.borrow().get(name) {
            return Some(v.clone());
        }
        match name {
            "parameters" => Some(Value::Mapping((*self.parameters).clone())),
            "variables" => Some(Value::Mapping(self.variables.borrow().clone())),
            "resources" => Some(self.resources.to_value()),
            "locals" => Some(Value::Mapping(self.locals.clone())),
            _ => None,
        }
    }

    pub fn parameter(&self, name: &str) -> Option<Value> {
        self.parameters.get(name).cloned()
    }

    pub fn variable(&self, name: &str) -> Option<Value> {
        self.variables.borrow().get(name).cloned()
    }

    /// Publish a variable for every later lookup; pinned names are kept
    pub fn set_variable(&self, name: impl Into<String>, value: Value) {
        let name = name.into();
        if self.pinned_variables.contains(&name) {
            tracing::trace!(variable = %name, "keeping caller-supplied variable");
            return;
        }
        self.variables.borrow_mut().insert(name, value);
    }

    /// Template nesting depth
    pub fn depth(&self) -> usize {
        self.template_stack.len()
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn record_block_scalar(&self, content: &str, had_expression: bool, trailing: bool) {
        self.formatting
            .borrow_mut()
            .blocks
            .record(content, had_expression, trailing);
    }

    pub fn merge_styles(&self, styles: StyleRecords) {
        self.formatting.borrow_mut().styles.merge(styles);
    }
}
