// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use yare::parameterized;

fn scope() -> Value {
    json!({
        "trigger": true,
        "count": 3,
        "name": "ada",
        "call": {"alert_done": true},
        "response": {"paging": {"page": 2, "hasMore": true}},
        "list": [{"n": 10}, {"n": 20}],
    })
}

fn render(template: &str) -> Value {
    ExprEvaluator.render(template, &scope()).unwrap()
}

#[test]
fn plain_text_passes_through() {
    assert_eq!(render("hello"), json!("hello"));
}

#[test]
fn single_expression_keeps_its_type() {
    assert_eq!(render("{{ count }}"), json!(3));
    assert_eq!(render("{{ trigger }}"), json!(true));
    assert_eq!(render("{{ list.1.n }}"), json!(20));
}

#[test]
fn missing_paths_resolve_to_null() {
    assert_eq!(render("{{ call.quarantine_done }}"), json!(null));
    assert_eq!(render("{{ nowhere.at.all }}"), json!(null));
}

#[test]
fn mixed_text_interpolates_to_string() {
    assert_eq!(render("page {{ response.paging.page }} of many"), json!("page 2 of many"));
    assert_eq!(render("{{ name }}-{{ count }}"), json!("ada-3"));
}

#[parameterized(
    and_true = { "{{ trigger and call.alert_done }}", json!(true) },
    and_missing = { "{{ call.alert_done and call.quarantine_done }}", json!(false) },
    or_missing = { "{{ call.quarantine_done or trigger }}", json!(true) },
    not_missing = { "{{ not call.quarantine_done }}", json!(true) },
    eq = { "{{ name == 'ada' }}", json!(true) },
    neq = { "{{ count != 3 }}", json!(false) },
    lt = { "{{ count < 10 }}", json!(true) },
    ge = { "{{ response.paging.page >= 2 }}", json!(true) },
    arithmetic = { "{{ response.paging.page + 1 }}", json!(3) },
    precedence = { "{{ 1 + 2 * 3 }}", json!(7) },
    parens = { "{{ (1 + 2) * 3 }}", json!(9) },
    division_is_float = { "{{ 3 / 2 }}", json!(1.5) },
    unary_minus = { "{{ -count }}", json!(-3) },
    string_concat = { "{{ name + '!' }}", json!("ada!") },
    literal_true = { "{{ true }}", json!(true) },
    literal_null = { "{{ null }}", json!(null) },
    literal_string = { "{{ 'x' }}", json!("x") },
)]
fn expressions(template: &str, expected: Value) {
    assert_eq!(render(template), expected);
}

#[test]
fn unterminated_block_is_a_parse_error() {
    assert!(matches!(
        ExprEvaluator.render("{{ count", &scope()),
        Err(TemplateError::Parse(_))
    ));
}

#[test]
fn trailing_garbage_is_a_parse_error() {
    assert!(matches!(
        ExprEvaluator.render("{{ count count }}", &scope()),
        Err(TemplateError::Parse(_))
    ));
}

#[test]
fn division_by_zero_is_an_eval_error() {
    assert!(matches!(
        ExprEvaluator.render("{{ 1 / 0 }}", &scope()),
        Err(TemplateError::Eval(_))
    ));
}

#[test]
fn render_deep_walks_structures() {
    let spec = json!({
        "url": "http://api/{{ name }}",
        "params": {"page": "{{ response.paging.page + 1 }}"},
        "flags": ["{{ trigger }}", "static"],
        "n": 42,
    });
    let rendered = render_deep(&ExprEvaluator, &spec, &scope()).unwrap();
    assert_eq!(
        rendered,
        json!({
            "url": "http://api/ada",
            "params": {"page": 3},
            "flags": [true, "static"],
            "n": 42,
        })
    );
}

#[test]
fn integer_and_float_compare_equal() {
    let scope = json!({"ratio": 2.0});
    assert_eq!(ExprEvaluator.render("{{ ratio == 2 }}", &scope).unwrap(), json!(true));
}
