// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

fn linear_doc() -> serde_json::Value {
    json!({
        "path": "examples/linear",
        "workload": {"base": "http://api"},
        "steps": [
            {
                "step": "fetch",
                "desc": "pull the page",
                "tool": {"kind": "http", "spec": {"url": "{{ base }}/items"}},
                "next": [{"step": "store"}]
            },
            {
                "step": "store",
                "tool": {"kind": "postgres", "spec": {"sql": "insert ..."}}
            }
        ]
    })
}

#[test]
fn parses_a_linear_playbook() {
    let playbook = Playbook::from_value(linear_doc()).unwrap();
    assert_eq!(playbook.path, "examples/linear");
    assert_eq!(playbook.version, "1");
    assert_eq!(playbook.steps.len(), 2);
    assert_eq!(playbook.entry_step().unwrap().step, "fetch");
    assert!(playbook.get_step("store").is_some());
    assert!(playbook.get_step("missing").is_none());
}

#[test]
fn next_items_distinguish_edges_and_fans() {
    let step: StepDef = serde_json::from_value(json!({
        "step": "decision",
        "next": [
            {"step": "direct", "when": "{{ fast }}"},
            {"when": "{{ trigger }}", "then": [
                {"step": "alert", "args": {"severity": "high"}},
                {"step": "quarantine"}
            ]},
            {"step": "fallback"}
        ]
    }))
    .unwrap();

    assert!(matches!(&step.next[0], NextItem::Edge { step, when: Some(_), .. } if step == "direct"));
    match &step.next[1] {
        NextItem::Fan { then, .. } => {
            assert_eq!(then.len(), 2);
            assert_eq!(then[0].args, Some(json!({"severity": "high"})));
        }
        other => panic!("expected fan, got {other:?}"),
    }
    assert!(matches!(&step.next[2], NextItem::Edge { when: None, args: None, .. }));
}

#[test]
fn loop_accepts_legacy_aliases() {
    let modern: StepDef = serde_json::from_value(json!({
        "step": "s",
        "loop": {"collection": "{{ cities }}", "element": "city"}
    }))
    .unwrap();
    let legacy: StepDef = serde_json::from_value(json!({
        "step": "s",
        "iterator": {"in": "{{ cities }}", "iterator": "city"}
    }))
    .unwrap();

    let m = modern.loop_.unwrap();
    let l = legacy.loop_.unwrap();
    assert_eq!(m.element, "city");
    assert_eq!(l.element, "city");
    assert_eq!(m.collection, l.collection);
}

#[test]
fn case_rules_default_to_action_completed() {
    let step: StepDef = serde_json::from_value(json!({
        "step": "s",
        "case": [
            {"when": "{{ result.flagged }}", "then": [{"step": "s"}]},
            {"on": "action_failed", "then": [{"step": "s"}]}
        ]
    }))
    .unwrap();
    assert_eq!(step.case[0].on, "action_completed");
    assert_eq!(step.case[1].on, "action_failed");
}

#[test]
fn on_error_policy_defaults_to_fail() {
    let step: StepDef = serde_json::from_value(json!({"step": "s"})).unwrap();
    assert_eq!(step.on_error, ErrorPolicy::Fail);

    let step: StepDef =
        serde_json::from_value(json!({"step": "s", "on_error": "continue"})).unwrap();
    assert_eq!(step.on_error, ErrorPolicy::Continue);
}

#[test]
fn retry_block_round_trips() {
    let step: StepDef = serde_json::from_value(json!({
        "step": "page",
        "retry": {
            "on_success": {
                "while": "{{ response.paging.hasMore }}",
                "max_attempts": 100,
                "next_call": {"params": {"page": "{{ response.paging.page + 1 }}"}},
                "collect": "append",
                "merge_path": "data"
            }
        }
    }))
    .unwrap();
    let on_success = step.retry.unwrap().on_success.unwrap();
    assert_eq!(on_success.max_attempts, 100);
    assert_eq!(on_success.merge_path.as_deref(), Some("data"));
}
