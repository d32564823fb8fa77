// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

mod backoff;
mod fanout;
mod iterator;
mod lease_loss;
mod pagination;
mod routing;
mod sub_playbook;

pub(crate) use crate::engine::test_helpers::Harness;

use baton_core::ExecutionStatus;
use serde_json::json;

#[test]
fn linear_happy_path() {
    let h = Harness::new();
    let execution = h.run_playbook(
        json!({
            "path": "flows/linear",
            "steps": [
                {"step": "a", "tool": {"kind": "http", "spec": {"url": "http://a"}},
                 "next": [{"step": "b"}]},
                {"step": "b", "tool": {"kind": "http", "spec": {"url": "http://b"}}}
            ]
        }),
        json!({}),
    );

    let jobs = h.lease_all("w1");
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].node_id, "a");
    h.complete_job("w1", &jobs[0], json!({"ok": 1}));

    let jobs = h.lease_all("w1");
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].node_id, "b");
    h.complete_job("w1", &jobs[0], json!({"ok": 2}));

    assert_eq!(h.status(execution), ExecutionStatus::Completed);

    // Canonical lifecycle order, with call deliveries interleaved.
    let types = h.log_types(execution);
    let without_calls: Vec<&str> =
        types.into_iter().filter(|t| *t != "call_delivered").collect();
    assert_eq!(
        without_calls,
        vec![
            "execution_start",
            "step_started",
            "action_started",
            "action_completed",
            "step_completed",
            "step_started",
            "action_started",
            "action_completed",
            "step_completed",
            "execution_complete",
        ]
    );
}

#[test]
fn pure_routing_steps_complete_without_workers() {
    let h = Harness::new();
    let execution = h.run_playbook(
        json!({
            "path": "flows/noop",
            "steps": [
                {"step": "start", "next": [{"step": "end"}]},
                {"step": "end"}
            ]
        }),
        json!({}),
    );
    assert_eq!(h.status(execution), ExecutionStatus::Completed);
}

#[test]
fn bind_hoists_variables_into_scope() {
    let h = Harness::new();
    let execution = h.run_playbook(
        json!({
            "path": "flows/bind",
            "steps": [
                {"step": "a", "bind": {"doubled": "{{ n * 2 }}"},
                 "next": [{"step": "b"}]},
                {"step": "b", "when": "{{ doubled == 10 }}",
                 "tool": {"kind": "http", "spec": {"url": "http://x/{{ doubled }}"}}}
            ]
        }),
        json!({"n": 5}),
    );

    let jobs = h.lease_all("w1");
    assert_eq!(jobs.len(), 1, "gate should pass with the bound variable");
    assert_eq!(jobs[0].action.spec["url"], json!("http://x/10"));
    h.complete_job("w1", &jobs[0], json!({}));
    assert_eq!(h.status(execution), ExecutionStatus::Completed);
}

#[test]
fn workload_parameters_reach_tool_specs() {
    let h = Harness::new();
    h.run_playbook(
        json!({
            "path": "flows/params",
            "steps": [
                {"step": "fetch", "tool": {"kind": "http",
                 "spec": {"url": "{{ base }}/items", "params": {"city": "{{ city }}"}}}}
            ]
        }),
        json!({"base": "http://api", "city": "berlin"}),
    );

    let jobs = h.lease_all("w1");
    assert_eq!(jobs[0].action.spec["url"], json!("http://api/items"));
    assert_eq!(jobs[0].action.spec["params"]["city"], json!("berlin"));
}
