// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;
use serde_json::json;
use yare::parameterized;

#[test]
fn deep_merge_recurses_into_objects() {
    let mut target = json!({"a": {"x": 1, "y": 2}, "b": 1});
    deep_merge(&mut target, json!({"a": {"y": 3, "z": 4}}));
    assert_eq!(target, json!({"a": {"x": 1, "y": 3, "z": 4}, "b": 1}));
}

#[test]
fn deep_merge_replaces_arrays_and_scalars() {
    let mut target = json!({"list": [1, 2, 3], "s": "old"});
    deep_merge(&mut target, json!({"list": [9], "s": "new"}));
    assert_eq!(target, json!({"list": [9], "s": "new"}));
}

#[test]
fn deep_merge_later_arrival_wins() {
    // Merging A then B then A again equals merging B then A: the final A
    // dominates everything it touches.
    let a = json!({"k": "a", "only_a": 1});
    let b = json!({"k": "b", "only_b": 2});

    let mut aba = json!({});
    deep_merge(&mut aba, a.clone());
    deep_merge(&mut aba, b.clone());
    deep_merge(&mut aba, a.clone());

    let mut ba = json!({});
    deep_merge(&mut ba, b);
    deep_merge(&mut ba, a);

    assert_eq!(aba, ba);
}

#[parameterized(
    null = { json!(null), false },
    bool_false = { json!(false), false },
    bool_true = { json!(true), true },
    zero = { json!(0), false },
    zero_float = { json!(0.0), false },
    nonzero = { json!(3), true },
    empty_string = { json!(""), false },
    string = { json!("x"), true },
    empty_array = { json!([]), false },
    array = { json!([1]), true },
    empty_object = { json!({}), false },
    object = { json!({"a": 1}), true },
)]
fn truthiness(value: serde_json::Value, expected: bool) {
    assert_eq!(truthy(&value), expected);
}

#[test]
fn get_path_traverses_objects_and_arrays() {
    let v = json!({"a": {"list": [{"name": "first"}, {"name": "second"}]}});
    assert_eq!(get_path(&v, "a.list.1.name"), Some(&json!("second")));
    assert_eq!(get_path(&v, "a.missing"), None);
    assert_eq!(get_path(&v, "a.list.9"), None);
}

#[test]
fn set_path_creates_intermediates() {
    let mut v = json!({});
    set_path(&mut v, "a.b.c", json!(42));
    assert_eq!(v, json!({"a": {"b": {"c": 42}}}));
}

#[test]
fn set_path_overwrites_leaf() {
    let mut v = json!({"a": {"b": 1}});
    set_path(&mut v, "a.b", json!(2));
    assert_eq!(v, json!({"a": {"b": 2}}));
}

proptest! {
    #[test]
    fn merge_is_idempotent(keys in proptest::collection::vec("[a-c]{1,2}", 0..6)) {
        let mut obj = serde_json::Map::new();
        for (i, k) in keys.iter().enumerate() {
            obj.insert(k.clone(), json!(i));
        }
        let patch = serde_json::Value::Object(obj);

        let mut once = json!({});
        deep_merge(&mut once, patch.clone());
        let mut twice = once.clone();
        deep_merge(&mut twice, patch);
        prop_assert_eq!(once, twice);
    }
}
