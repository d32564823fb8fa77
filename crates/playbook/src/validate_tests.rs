// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::model::Playbook;
use serde_json::json;

fn from_steps(steps: serde_json::Value) -> Result<Playbook, PlaybookError> {
    Playbook::from_value(json!({"path": "t", "steps": steps}))
}

#[test]
fn empty_playbook_is_rejected() {
    assert!(matches!(from_steps(json!([])), Err(PlaybookError::Empty)));
}

#[test]
fn duplicate_step_names_are_rejected() {
    let err = from_steps(json!([{"step": "a"}, {"step": "a"}])).unwrap_err();
    assert!(matches!(err, PlaybookError::DuplicateStep { step } if step == "a"));
}

#[test]
fn unknown_edge_target_is_rejected() {
    let err = from_steps(json!([{"step": "a", "next": [{"step": "ghost"}]}])).unwrap_err();
    assert!(
        matches!(err, PlaybookError::UnknownTarget { step, target } if step == "a" && target == "ghost")
    );
}

#[test]
fn unknown_fan_target_is_rejected() {
    let err = from_steps(json!([
        {"step": "a", "next": [{"when": "{{ x }}", "then": [{"step": "ghost"}]}]}
    ]))
    .unwrap_err();
    assert!(matches!(err, PlaybookError::UnknownTarget { .. }));
}

#[test]
fn unknown_case_target_is_rejected() {
    let err = from_steps(json!([
        {"step": "a", "case": [{"then": [{"step": "ghost"}]}]}
    ]))
    .unwrap_err();
    assert!(matches!(err, PlaybookError::UnknownTarget { .. }));
}

#[test]
fn until_is_rejected_with_a_pointed_error() {
    let err = from_steps(json!([
        {"step": "scan", "loop": {"collection": [1, 2], "until": "{{ found }}"}}
    ]))
    .unwrap_err();
    let message = err.to_string();
    assert!(matches!(err, PlaybookError::UntilUnsupported { ref step } if step == "scan"));
    assert!(message.contains("where"), "error should point at the replacement");
}

#[test]
fn literal_mapping_collection_is_rejected() {
    let err = from_steps(json!([
        {"step": "scan", "loop": {"collection": {"k": "v"}}}
    ]))
    .unwrap_err();
    assert!(matches!(err, PlaybookError::MappingIteration { step } if step == "scan"));
}

#[test]
fn loop_with_on_success_retry_is_rejected() {
    let err = from_steps(json!([
        {
            "step": "scan",
            "loop": {"collection": [1]},
            "retry": {"on_success": {"while": "{{ more }}"}}
        }
    ]))
    .unwrap_err();
    assert!(matches!(err, PlaybookError::LoopWithOnSuccess { .. }));
}

#[test]
fn valid_playbook_passes() {
    let playbook = from_steps(json!([
        {"step": "a", "next": [{"step": "b"}]},
        {"step": "b", "loop": {"collection": [1, 2], "element": "n"},
         "tool": {"kind": "http", "spec": {}}}
    ]))
    .unwrap();
    assert_eq!(playbook.steps.len(), 2);
}
