// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `retry.on_error` failure retries with backoff.

use super::Harness;
use baton_core::{EventKind, ExecutionStatus, QueueStatus};
use serde_json::json;
use std::time::Duration;

fn flaky_playbook(max_attempts: u32) -> serde_json::Value {
    json!({
        "path": "flows/flaky",
        "steps": [
            {"step": "call",
             "tool": {"kind": "http", "spec": {"url": "http://flaky"}},
             "retry": {"on_error": {
                 "max_attempts": max_attempts,
                 "backoff": "exponential",
                 "initial_delay": 1,
                 "multiplier": 2
             }}}
        ]
    })
}

#[test]
fn two_failures_then_success() {
    let h = Harness::new();
    let execution = h.run_playbook(flaky_playbook(3), json!({}));

    // Attempt 1 fails
    let jobs = h.lease_all("w1");
    let first_available = jobs[0].available_at;
    h.fail_job("w1", &jobs[0], "500 internal");

    // Retry row exists but is not leasable before its backoff expires
    assert!(h.lease_all("w1").is_empty());
    h.clock.advance(Duration::from_secs(1));
    let jobs = h.lease_all("w1");
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].meta.retry.as_ref().unwrap().attempt_number, 2);
    let second_available = jobs[0].available_at;
    assert!(
        second_available >= first_available + 1_000,
        "first backoff must be at least 1s"
    );
    h.fail_job("w1", &jobs[0], "500 internal");

    // Attempt 3 succeeds after a ~2s backoff
    h.clock.advance(Duration::from_secs(1));
    assert!(h.lease_all("w1").is_empty(), "second backoff is ~2s");
    h.clock.advance(Duration::from_secs(1));
    let jobs = h.lease_all("w1");
    let third_available = jobs[0].available_at;
    assert!(third_available >= second_available + 2_000);
    assert_eq!(jobs[0].meta.retry.as_ref().unwrap().attempt_number, 3);
    h.complete_job("w1", &jobs[0], json!({"ok": true}));

    assert_eq!(h.status(execution), ExecutionStatus::Completed);

    // Three action_started events with attempt numbers 1, 2, 3
    let attempts: Vec<u32> = h
        .events_of(execution, "action_started")
        .iter()
        .map(|e| match &e.kind {
            EventKind::ActionStarted { attempt, .. } => *attempt,
            _ => 0,
        })
        .collect();
    assert_eq!(attempts, vec![1, 2, 3]);
}

#[test]
fn max_attempts_one_means_no_retry() {
    let h = Harness::new();
    let execution = h.run_playbook(flaky_playbook(1), json!({}));

    let jobs = h.lease_all("w1");
    h.fail_job("w1", &jobs[0], "boom");

    h.clock.advance(Duration::from_secs(60));
    assert!(h.lease_all("w1").is_empty(), "first failure is terminal");
    assert_eq!(h.status(execution), ExecutionStatus::Failed);
    assert_eq!(h.events_of(execution, "step_failed").len(), 1);
}

#[test]
fn exhausted_retries_fail_the_step() {
    let h = Harness::new();
    let execution = h.run_playbook(flaky_playbook(2), json!({}));

    let jobs = h.lease_all("w1");
    h.fail_job("w1", &jobs[0], "boom 1");
    h.clock.advance(Duration::from_secs(2));
    let jobs = h.lease_all("w1");
    h.fail_job("w1", &jobs[0], "boom 2");

    assert_eq!(h.status(execution), ExecutionStatus::Failed);
    let record = h.state.lock().execution(execution).unwrap().clone();
    assert!(record.error.unwrap().contains("boom 2"));
}

#[test]
fn retry_rows_link_to_the_failure_event() {
    let h = Harness::new();
    let execution = h.run_playbook(flaky_playbook(3), json!({}));

    let jobs = h.lease_all("w1");
    let old_queue_id = jobs[0].queue_id;
    h.fail_job("w1", &jobs[0], "boom");

    let failures = h.events_of(execution, "action_failed");
    assert_eq!(failures.len(), 1);

    h.clock.advance(Duration::from_secs(1));
    let jobs = h.lease_all("w1");
    let retry = jobs[0].meta.retry.as_ref().unwrap();
    assert_eq!(retry.parent_event_id, failures[0].event_id);
    assert_ne!(jobs[0].queue_id, old_queue_id, "retry is a fresh row");

    // The superseded row is terminal and never resurrected
    let old = h.job(old_queue_id).unwrap();
    assert!(matches!(old.status, QueueStatus::Dead | QueueStatus::Failed));
}

#[test]
fn retry_when_predicate_vetoes_retries() {
    let h = Harness::new();
    let mut doc = flaky_playbook(3);
    doc["steps"][0]["retry"]["on_error"]["when"] = json!("{{ error != 'fatal' }}");
    let execution = h.run_playbook(doc, json!({}));

    let jobs = h.lease_all("w1");
    h.fail_job("w1", &jobs[0], "fatal");

    h.clock.advance(Duration::from_secs(60));
    assert!(h.lease_all("w1").is_empty());
    assert_eq!(h.status(execution), ExecutionStatus::Failed);
}

#[test]
fn on_error_continue_routes_past_the_failure() {
    let h = Harness::new();
    let execution = h.run_playbook(
        json!({
            "path": "flows/tolerant",
            "steps": [
                {"step": "call", "on_error": "continue",
                 "tool": {"kind": "http", "spec": {}},
                 "next": [{"step": "after"}]},
                {"step": "after"}
            ]
        }),
        json!({}),
    );

    let jobs = h.lease_all("w1");
    h.fail_job("w1", &jobs[0], "boom");

    assert_eq!(h.status(execution), ExecutionStatus::Completed);
    let result = h.step_result(execution, "call").unwrap();
    assert_eq!(result["error"], json!("boom"));
}
