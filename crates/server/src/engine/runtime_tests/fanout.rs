// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fan-out with an AND-join gated on call payloads.

use super::Harness;
use baton_core::{ExecutionStatus, StepPhase};
use serde_json::json;

fn fanout_playbook() -> serde_json::Value {
    json!({
        "path": "flows/fanout",
        "steps": [
            {"step": "decision", "next": [
                {"when": "{{ trigger }}", "then": [
                    {"step": "alert", "args": {"severity": "high"}},
                    {"step": "quarantine", "args": {"reason": "x"}}
                ]}
            ]},
            {"step": "alert", "tool": {"kind": "http", "spec": {"url": "http://alert"}},
             "next": [{"step": "join", "args": {"alert_done": true}}]},
            {"step": "quarantine", "tool": {"kind": "http", "spec": {"url": "http://q"}},
             "next": [{"step": "join", "args": {"quarantine_done": true}}]},
            {"step": "join",
             "when": "{{ call.alert_done and call.quarantine_done }}",
             "tool": {"kind": "http", "spec": {"url": "http://join"}}}
        ]
    })
}

#[test]
fn both_branches_run_concurrently_and_join_fires_once() {
    let h = Harness::new();
    let execution = h.run_playbook(fanout_playbook(), json!({"trigger": true}));

    // Both fan targets enqueued concurrently
    let jobs = h.lease_all("w1");
    let mut nodes: Vec<&str> = jobs.iter().map(|j| j.node_id.as_str()).collect();
    nodes.sort();
    assert_eq!(nodes, vec!["alert", "quarantine"]);

    // First branch publishes; join stays parked
    let alert = jobs.iter().find(|j| j.node_id == "alert").unwrap();
    h.complete_job("w1", alert, json!({}));
    assert_eq!(h.phase(execution, "join"), Some(StepPhase::Parked));
    assert_eq!(h.status(execution), ExecutionStatus::Running);

    // Second branch satisfies the gate
    let quarantine = jobs.iter().find(|j| j.node_id == "quarantine").unwrap();
    h.complete_job("w1", quarantine, json!({}));
    assert_eq!(h.phase(execution, "join"), Some(StepPhase::Ready));

    let join_jobs = h.lease_all("w1");
    assert_eq!(join_jobs.len(), 1);
    assert_eq!(join_jobs[0].node_id, "join");
    h.complete_job("w1", &join_jobs[0], json!({}));

    assert_eq!(h.status(execution), ExecutionStatus::Completed);
    // The join dispatched exactly once
    assert_eq!(h.events_of(execution, "step_started").iter().filter(|e| {
        matches!(&e.kind, baton_core::EventKind::StepStarted { step, .. } if step == "join")
    }).count(), 1);
}

#[test]
fn falsy_fan_predicate_ends_the_branch() {
    let h = Harness::new();
    let execution = h.run_playbook(fanout_playbook(), json!({"trigger": false}));

    // Nothing to lease, branch ended, execution completed
    assert!(h.lease_all("w1").is_empty());
    assert_eq!(h.status(execution), ExecutionStatus::Completed);
    assert_eq!(h.phase(execution, "alert"), None);
}

#[test]
fn repeated_deliveries_to_a_done_step_are_dropped() {
    let h = Harness::new();
    let execution = h.run_playbook(
        json!({
            "path": "flows/rejoin",
            "steps": [
                {"step": "split", "next": [
                    {"when": "{{ true }}", "then": [{"step": "a"}, {"step": "b"}]}
                ]},
                {"step": "a", "tool": {"kind": "http", "spec": {}},
                 "next": [{"step": "sink", "args": {"from_a": true}}]},
                {"step": "b", "tool": {"kind": "http", "spec": {}},
                 "next": [{"step": "sink", "args": {"from_b": true}}]},
                // Fires on the first arrival; the second must be a no-op
                {"step": "sink", "tool": {"kind": "http", "spec": {}}}
            ]
        }),
        json!({}),
    );

    let jobs = h.lease_all("w1");
    let a = jobs.iter().find(|j| j.node_id == "a").unwrap();
    h.complete_job("w1", a, json!({}));

    let sink_jobs = h.lease_all("w1");
    let sink = sink_jobs.iter().find(|j| j.node_id == "sink").unwrap();
    h.complete_job("w1", sink, json!({}));
    assert_eq!(h.phase(execution, "sink"), Some(StepPhase::Done));

    // Second branch arrives after sink finished
    let b = jobs.iter().find(|j| j.node_id == "b").unwrap();
    h.complete_job("w1", b, json!({}));

    // No second sink dispatch
    assert!(h.lease_all("w1").is_empty());
    assert_eq!(h.status(execution), ExecutionStatus::Completed);
}
