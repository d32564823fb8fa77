// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Routing precedence and case rules.

use super::Harness;
use baton_core::{ExecutionStatus, StepPhase};
use serde_json::json;
use yare::parameterized;

/// Playbook with every routing form on one step: a conditional edge, a fan,
/// and an else edge.
fn routing_playbook() -> serde_json::Value {
    json!({
        "path": "flows/routes",
        "steps": [
            {"step": "src", "tool": {"kind": "http", "spec": {}},
             "next": [
                 {"step": "fast", "when": "{{ result.fast }}"},
                 {"when": "{{ result.fanout }}", "then": [{"step": "x"}, {"step": "y"}]},
                 {"step": "fallback"}
             ]},
            {"step": "fast"},
            {"step": "x"},
            {"step": "y"},
            {"step": "fallback"}
        ]
    })
}

#[parameterized(
    conditional_edge_wins = { json!({"fast": true, "fanout": true}), vec!["fast"] },
    fan_when_no_edge = { json!({"fast": false, "fanout": true}), vec!["x", "y"] },
    else_edge_as_fallback = { json!({"fast": false, "fanout": false}), vec!["fallback"] },
)]
fn precedence(result: serde_json::Value, expected: Vec<&str>) {
    let h = Harness::new();
    let execution = h.run_playbook(routing_playbook(), json!({}));

    let jobs = h.lease_all("w1");
    h.complete_job("w1", &jobs[0], result);

    let mut dispatched: Vec<String> = h
        .state
        .lock()
        .projection(execution)
        .unwrap()
        .steps
        .iter()
        .filter(|(name, s)| *name != "src" && s.phase == StepPhase::Done)
        .map(|(name, _)| name.clone())
        .collect();
    dispatched.sort();
    let mut expected: Vec<String> = expected.into_iter().map(String::from).collect();
    expected.sort();
    assert_eq!(dispatched, expected);
    assert_eq!(h.status(execution), ExecutionStatus::Completed);
}

#[test]
fn no_matching_route_is_a_terminal_sink() {
    let h = Harness::new();
    let execution = h.run_playbook(
        json!({
            "path": "flows/sink",
            "steps": [
                {"step": "src", "tool": {"kind": "http", "spec": {}},
                 "next": [{"step": "other", "when": "{{ result.go }}"}]},
                {"step": "other"}
            ]
        }),
        json!({}),
    );

    let jobs = h.lease_all("w1");
    h.complete_job("w1", &jobs[0], json!({"go": false}));

    assert_eq!(h.status(execution), ExecutionStatus::Completed);
    assert_eq!(h.phase(execution, "other"), None, "branch ended without dispatch");
}

#[test]
fn edge_args_render_in_the_senders_post_result_context() {
    let h = Harness::new();
    let execution = h.run_playbook(
        json!({
            "path": "flows/args",
            "steps": [
                {"step": "src", "tool": {"kind": "http", "spec": {}},
                 "next": [{"step": "dst", "args": {"count": "{{ result.n * 2 }}", "tag": "{{ env }}"}}]},
                {"step": "dst", "tool": {"kind": "http", "spec": {"c": "{{ call.count }}"}}}
            ]
        }),
        json!({"env": "prod"}),
    );

    let jobs = h.lease_all("w1");
    h.complete_job("w1", &jobs[0], json!({"n": 21}));

    let projection = h.state.lock().projection(execution).unwrap().clone();
    let call = &projection.step("dst").unwrap().call;
    assert_eq!(call["count"], json!(42));
    assert_eq!(call["tag"], json!("prod"));

    let jobs = h.lease_all("w1");
    assert_eq!(jobs[0].action.spec["c"], json!(42));
}

#[test]
fn later_call_arrivals_win_deep_merge_conflicts() {
    let h = Harness::new();
    let execution = h.run_playbook(
        json!({
            "path": "flows/merge",
            "steps": [
                {"step": "split", "next": [
                    {"when": "{{ true }}", "then": [{"step": "a"}, {"step": "b"}]}
                ]},
                {"step": "a", "tool": {"kind": "http", "spec": {}},
                 "next": [{"step": "gate", "args": {"meta": {"from": "a", "a": 1}}}]},
                {"step": "b", "tool": {"kind": "http", "spec": {}},
                 "next": [{"step": "gate", "args": {"meta": {"from": "b", "b": 2}}}]},
                {"step": "gate",
                 "when": "{{ call.meta.a and call.meta.b }}",
                 "tool": {"kind": "http", "spec": {}}}
            ]
        }),
        json!({}),
    );

    let jobs = h.lease_all("w1");
    let a = jobs.iter().find(|j| j.node_id == "a").unwrap();
    let b = jobs.iter().find(|j| j.node_id == "b").unwrap();
    h.complete_job("w1", a, json!({}));
    h.complete_job("w1", b, json!({}));

    let projection = h.state.lock().projection(execution).unwrap().clone();
    let call = &projection.step("gate").unwrap().call;
    // Nested keys merged, conflict taken by the later arrival
    assert_eq!(call["meta"]["a"], json!(1));
    assert_eq!(call["meta"]["b"], json!(2));
    assert_eq!(call["meta"]["from"], json!("b"));
}

#[test]
fn failure_case_rule_routes_to_a_handler_step() {
    let h = Harness::new();
    let execution = h.run_playbook(
        json!({
            "path": "flows/cases",
            "steps": [
                {"step": "risky", "tool": {"kind": "http", "spec": {}},
                 "case": [
                     {"on": "action_failed", "when": "{{ error == 'quota' }}",
                      "then": [{"step": "cleanup", "args": {"cause": "{{ error }}"}}]}
                 ],
                 "next": [{"step": "after"}]},
                {"step": "cleanup"},
                {"step": "after"}
            ]
        }),
        json!({}),
    );

    let jobs = h.lease_all("w1");
    h.fail_job("w1", &jobs[0], "quota");

    assert_eq!(h.phase(execution, "cleanup"), Some(StepPhase::Done));
    assert_eq!(h.phase(execution, "after"), None, "success route must not fire");
    assert_eq!(h.status(execution), ExecutionStatus::Completed);
}

#[test]
fn success_case_rule_takes_precedence_over_next() {
    let h = Harness::new();
    let execution = h.run_playbook(
        json!({
            "path": "flows/case-priority",
            "steps": [
                {"step": "src", "tool": {"kind": "http", "spec": {}},
                 "case": [
                     {"when": "{{ result.flagged }}", "then": [{"step": "review"}]}
                 ],
                 "next": [{"step": "normal"}]},
                {"step": "review"},
                {"step": "normal"}
            ]
        }),
        json!({}),
    );

    let jobs = h.lease_all("w1");
    h.complete_job("w1", &jobs[0], json!({"flagged": true}));

    assert_eq!(h.phase(execution, "review"), Some(StepPhase::Done));
    assert_eq!(h.phase(execution, "normal"), None);
    assert_eq!(h.status(execution), ExecutionStatus::Completed);
}
