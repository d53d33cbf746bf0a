//! Unit tests for pipex-runtime
//!
//! Exercises the evaluator end to end: context lookup, builtins, the
//! session-scoped state and interpolation.

use pipex_core::{Mapping, Value};
use pipex_runtime::interpolate::runtime_placeholder;
use pipex_runtime::*;

fn params(entries: &[(&str, Value)]) -> Mapping {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

// ========== Evaluation Tests ==========

#[test]
fn test_cross_type_equality() {
    let session = Session::new();
    let evaluator = Evaluator::new(&session);
    let ctx = ExecutionContext::new(".");

    assert_eq!(evaluator.evaluate("eq(1, \"1\")", &ctx), Some(Value::Truth(true)));
    assert_eq!(evaluator.evaluate("eq(\"True\", true)", &ctx), Some(Value::Truth(true)));
    assert_eq!(evaluator.evaluate("ne(2, '2.0')", &ctx), Some(Value::Truth(false)));
}

#[test]
fn test_condition_on_parameters() {
    let session = Session::new();
    let evaluator = Evaluator::new(&session);
    let ctx = ExecutionContext::new(".").with_parameters(params(&[
        ("env", Value::string("prod")),
        ("regions", Value::Sequence(vec![Value::string("eu"), Value::string("us")])),
    ]));

    assert!(evaluator.evaluate_condition("and(eq(parameters.env, 'prod'), containsValue(parameters.regions, 'us'))", &ctx));
    assert!(!evaluator.evaluate_condition("eq(parameters.env, 'PROD')", &ctx));
    assert!(evaluator.evaluate_condition("eq(parameters.env, ' prod ')", &ctx));
    assert!(!evaluator.evaluate_condition("in(parameters.env, 'dev', 'test')", &ctx));
    assert!(evaluator.evaluate_condition("startsWith(parameters.env, 'pr')", &ctx));
}

#[test]
fn test_loop_locals_shadow_parameters() {
    let session = Session::new();
    let evaluator = Evaluator::new(&session);
    let ctx = ExecutionContext::new(".").with_parameters(params(&[("item", Value::string("param"))]));
    let child = ctx.child_with_locals(vec![
        ("item".to_string(), Value::string("local")),
        ("itemIndex".to_string(), Value::Number(0.0)),
    ]);

    assert_eq!(evaluator.evaluate("item", &child), Some(Value::string("local")));
    assert_eq!(evaluator.evaluate("parameters.item", &child), Some(Value::string("param")));
    assert_eq!(evaluator.evaluate("locals.itemIndex", &child), Some(Value::Number(0.0)));
}

#[test]
fn test_resources_are_addressable() {
    let session = Session::new();
    let evaluator = Evaluator::new(&session);
    let resources = Resources {
        repositories: vec![RepositoryEntry::new("templates").with_name("org/templates")],
        other: Mapping::new(),
    };
    let ctx = ExecutionContext::new(".").with_resources(resources);

    assert_eq!(
        evaluator.evaluate("resources.repositories[0].name", &ctx),
        Some(Value::string("org/templates"))
    );
}

// ========== Session Tests ==========

#[test]
fn test_counter_persists_across_evaluations() {
    let session = Session::new();
    let ctx = ExecutionContext::new(".");

    let first = Evaluator::new(&session).evaluate("counter('build', 7)", &ctx);
    let second = Evaluator::new(&session).evaluate("counter('build', 7)", &ctx);
    assert_eq!(first, Some(Value::Number(7.0)));
    assert_eq!(second, Some(Value::Number(8.0)));

    session.reset();
    let third = Evaluator::new(&session).evaluate("counter('build', 7)", &ctx);
    assert_eq!(third, Some(Value::Number(7.0)));
}

#[test]
fn test_fresh_session_is_isolated() {
    let ctx = ExecutionContext::new(".");
    let a = Session::new();
    let b = Session::new();
    Evaluator::new(&a).evaluate("counter('k', 0)", &ctx);
    assert_eq!(
        Evaluator::new(&b).evaluate("counter('k', 0)", &ctx),
        Some(Value::Number(0.0))
    );
}

// ========== Interpolation Tests ==========

#[test]
fn test_interpolate_multiline_script() {
    let session = Session::new();
    let ctx = ExecutionContext::new(".").with_parameters(params(&[("target", Value::string("x86"))]));
    let result = Evaluator::new(&session).interpolate(
        "make ${{ parameters.target }}\n${{ parameters.extra }}\necho done\n",
        &ctx,
    );

    assert_eq!(result.text, "make x86\n$(extra)\necho done\n");
    assert!(result.had_expression);
    assert!(!result.last_line_had_expression);
}

#[test]
fn test_runtime_placeholder_shape() {
    assert_eq!(runtime_placeholder("parameters.a"), Some("$(a)".to_string()));
    assert_eq!(runtime_placeholder("variables.a"), None);
    assert_eq!(runtime_placeholder("eq(parameters.a, 1)"), None);
}
