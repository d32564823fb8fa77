// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::template::ExprEvaluator;
use serde_json::json;

fn spec(collection: Value) -> LoopSpec {
    serde_json::from_value(json!({"collection": collection, "element": "city"})).unwrap()
}

fn shape(spec: &LoopSpec, scope: Value) -> Vec<Value> {
    shape_collection(spec, &ExprEvaluator, &scope, "test").unwrap()
}

#[test]
fn renders_collection_expression() {
    let spec = spec(json!("{{ cities }}"));
    let items = shape(&spec, json!({"cities": ["a", "b", "c"]}));
    assert_eq!(items, vec![json!("a"), json!("b"), json!("c")]);
}

#[test]
fn scalar_becomes_single_item_list() {
    // Strings are never iterated character-by-character.
    let spec = spec(json!("{{ one }}"));
    assert_eq!(shape(&spec, json!({"one": "berlin"})), vec![json!("berlin")]);
    let spec = spec(json!("{{ n }}"));
    assert_eq!(shape(&spec, json!({"n": 7})), vec![json!(7)]);
}

#[test]
fn null_collection_is_empty() {
    let spec = spec(json!("{{ missing }}"));
    assert!(shape(&spec, json!({})).is_empty());
}

#[test]
fn mapping_collection_is_rejected() {
    let spec = spec(json!("{{ map }}"));
    let err = shape_collection(&spec, &ExprEvaluator, &json!({"map": {"k": 1}}), "s")
        .unwrap_err();
    assert!(matches!(err, PlaybookError::MappingIteration { .. }));
}

#[test]
fn where_filters_with_item_in_scope() {
    let spec: LoopSpec = serde_json::from_value(json!({
        "collection": "{{ cities }}",
        "element": "city",
        "where": "{{ city.pop > 100 }}"
    }))
    .unwrap();
    let items = shape(
        &spec,
        json!({"cities": [{"name": "a", "pop": 50}, {"name": "b", "pop": 500}]}),
    );
    assert_eq!(items, vec![json!({"name": "b", "pop": 500})]);
}

#[test]
fn order_by_is_stable() {
    let spec: LoopSpec = serde_json::from_value(json!({
        "collection": "{{ xs }}",
        "element": "x",
        "order_by": "{{ x.rank }}"
    }))
    .unwrap();
    let items = shape(
        &spec,
        json!({"xs": [
            {"id": 1, "rank": 2},
            {"id": 2, "rank": 1},
            {"id": 3, "rank": 2},
        ]}),
    );
    let ids: Vec<i64> = items.iter().map(|v| v["id"].as_i64().unwrap()).collect();
    assert_eq!(ids, vec![2, 1, 3], "equal keys keep input order");
}

#[test]
fn limit_truncates_after_filter_and_sort() {
    let spec: LoopSpec = serde_json::from_value(json!({
        "collection": [5, 3, 1, 4, 2],
        "element": "n",
        "order_by": "{{ n }}",
        "limit": 3
    }))
    .unwrap();
    assert_eq!(shape(&spec, json!({})), vec![json!(1), json!(2), json!(3)]);
}

#[test]
fn chunk_batches_items() {
    let spec: LoopSpec = serde_json::from_value(json!({
        "collection": [1, 2, 3, 4, 5],
        "element": "batch",
        "chunk": 2
    }))
    .unwrap();
    assert_eq!(
        shape(&spec, json!({})),
        vec![json!([1, 2]), json!([3, 4]), json!([5])]
    );
}

#[test]
fn item_scope_binds_element_and_optional_index() {
    let mut s = spec(json!([1]));
    let scope = item_scope(&s, &json!({"base": true}), &json!("x"), 4);
    assert_eq!(scope["city"], json!("x"));
    assert_eq!(scope.get("index"), None);

    s.enumerate = true;
    let scope = item_scope(&s, &json!({}), &json!("x"), 4);
    assert_eq!(scope["index"], json!(4));
}

#[test]
fn sequential_mode_caps_concurrency_at_one() {
    let mut s = spec(json!([1]));
    s.concurrency = 8;
    assert_eq!(s.effective_concurrency(), 1);
    s.mode = baton_core::LoopMode::Async;
    assert_eq!(s.effective_concurrency(), 8);
}
