// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lease expiry: requeue, re-lease, and late-ack rejection.

use super::Harness;
use baton_core::{ExecutionStatus, Fault, QueueStatus};
use baton_wire::AckRequest;
use serde_json::json;
use std::time::Duration;

fn single_step() -> serde_json::Value {
    json!({
        "path": "flows/single",
        "steps": [
            {"step": "work", "tool": {"kind": "http", "spec": {"url": "http://x"}}}
        ]
    })
}

#[test]
fn expired_lease_is_requeued_and_late_ack_rejected() {
    let h = Harness::new();
    let execution = h.run_playbook(single_step(), json!({}));

    // w1 leases and dies without acking
    let jobs = h.lease_all("w1");
    let job = jobs[0].clone();
    h.start_job(&job);

    h.clock.advance(Duration::from_secs(61));
    let stats = h.queue.sweep_expired_leases().unwrap();
    assert_eq!(stats.requeued, 1);
    h.pump();
    assert_eq!(h.job(job.queue_id).unwrap().status, QueueStatus::Queued);

    // w2 picks it up and completes it
    let jobs = h.lease_all("w2");
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].queue_id, job.queue_id);
    h.complete_job("w2", &jobs[0], json!({"done": true}));
    assert_eq!(h.status(execution), ExecutionStatus::Completed);

    // w1 wakes up and acks late: rejected, state unchanged
    let err = h
        .queue
        .ack(job.queue_id, &AckRequest { worker_id: "w1".into(), result: json!({}) })
        .unwrap_err();
    assert!(matches!(err, Fault::Conflict(_)));
    assert_eq!(h.job(job.queue_id).unwrap().status, QueueStatus::Done);
    assert_eq!(h.status(execution), ExecutionStatus::Completed);
}

#[test]
fn exhausted_lease_expiries_surface_a_failure() {
    let h = Harness::new();
    let execution = h.run_playbook(single_step(), json!({}));

    // Burn through every attempt without a single ack
    for _ in 0..3 {
        let jobs = h.lease_all("w1");
        assert_eq!(jobs.len(), 1);
        h.clock.advance(Duration::from_secs(61));
        h.queue.sweep_expired_leases().unwrap();
        h.pump();
    }

    let job = h
        .state
        .lock()
        .queue
        .values()
        .next()
        .cloned()
        .unwrap();
    assert_eq!(job.status, QueueStatus::Dead);
    assert_eq!(job.attempts, 3);

    // The synthetic action_failed drove the step (and execution) failure
    assert_eq!(h.status(execution), ExecutionStatus::Failed);
    let failures = h.events_of(execution, "action_failed");
    assert_eq!(failures.len(), 1);
}

#[test]
fn renewal_extends_a_held_lease() {
    let h = Harness::new();
    h.run_playbook(single_step(), json!({}));

    let jobs = h.lease_all("w1");
    let job = &jobs[0];
    let until = h
        .queue
        .renew(
            job.queue_id,
            &baton_wire::RenewRequest {
                worker_id: "w1".into(),
                lease_duration_seconds: 120,
            },
        )
        .unwrap();
    assert_eq!(until, h.clock.epoch_ms() + 120_000);

    // Someone else cannot renew it
    let err = h
        .queue
        .renew(
            job.queue_id,
            &baton_wire::RenewRequest {
                worker_id: "w2".into(),
                lease_duration_seconds: 120,
            },
        )
        .unwrap_err();
    assert!(matches!(err, Fault::Conflict(_)));
}

#[test]
fn paused_executions_are_not_leasable() {
    let h = Harness::new();
    let execution = h.run_playbook(single_step(), json!({}));

    let pause = h.event(execution, baton_core::EventKind::ExecutionPaused);
    h.emit(pause);
    h.pump();
    assert_eq!(h.status(execution), ExecutionStatus::Paused);
    assert!(h.lease_all("w1").is_empty(), "queue filters paused executions");

    let resume = h.event(execution, baton_core::EventKind::ExecutionResumed);
    h.emit(resume);
    h.pump();
    assert_eq!(h.lease_all("w1").len(), 1);
}

#[test]
fn abort_prevents_further_leasing() {
    let h = Harness::new();
    let execution = h.run_playbook(single_step(), json!({}));

    let abort = h.event(
        execution,
        baton_core::EventKind::ExecutionAbort { reason: Some("operator".into()) },
    );
    h.emit(abort);
    h.pump();

    assert_eq!(h.status(execution), ExecutionStatus::Failed);
    assert!(h.lease_all("w1").is_empty());
}
