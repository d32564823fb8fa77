// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{enqueued, exec_event, started_state};
use baton_core::{Event, EventKind, ExecutionId, QueueId, QueueStatus, StepPhase};
use serde_json::json;

fn lease(state: &mut crate::MaterializedState, queue: u64, worker: &str) {
    state.apply_event(&Event::infra(EventKind::QueueLeased {
        queue_id: QueueId(queue),
        worker_id: worker.into(),
        lease_until: 2_000_000,
    }));
}

#[test]
fn enqueue_lease_ack_lifecycle() {
    let mut state = started_state(5);
    enqueued(&mut state, 5, 10, "fetch");

    assert_eq!(state.job(QueueId(10)).unwrap().status, QueueStatus::Queued);
    assert_eq!(
        state.projection(ExecutionId(5)).unwrap().step("fetch").unwrap().phase,
        StepPhase::Ready
    );

    lease(&mut state, 10, "w1");
    let job = state.job(QueueId(10)).unwrap();
    assert_eq!(job.status, QueueStatus::Leased);
    assert_eq!(job.attempts, 1);
    assert_eq!(job.worker_id.as_deref(), Some("w1"));

    state.apply_event(&Event::infra(EventKind::QueueAcked {
        queue_id: QueueId(10),
        result: json!({}),
    }));
    assert_eq!(state.job(QueueId(10)).unwrap().status, QueueStatus::Done);
}

#[test]
fn duplicate_enqueue_is_ignored() {
    let mut state = started_state(5);
    enqueued(&mut state, 5, 10, "fetch");
    lease(&mut state, 10, "w1");
    // Replay of the original enqueue must not reset the row
    enqueued(&mut state, 5, 10, "fetch");
    assert_eq!(state.job(QueueId(10)).unwrap().status, QueueStatus::Leased);
}

#[test]
fn lease_of_non_queued_row_is_a_no_op() {
    let mut state = started_state(5);
    enqueued(&mut state, 5, 10, "fetch");
    lease(&mut state, 10, "w1");
    lease(&mut state, 10, "w2");
    assert_eq!(state.job(QueueId(10)).unwrap().worker_id.as_deref(), Some("w1"));
    assert_eq!(state.job(QueueId(10)).unwrap().attempts, 1);
}

#[test]
fn requeue_returns_leased_row_and_clears_worker() {
    let mut state = started_state(5);
    enqueued(&mut state, 5, 10, "fetch");
    lease(&mut state, 10, "w1");

    let mut requeue = Event::infra(EventKind::QueueRequeued { queue_id: QueueId(10) });
    requeue.timestamp = 3_000_000;
    state.apply_event(&requeue);

    let job = state.job(QueueId(10)).unwrap();
    assert_eq!(job.status, QueueStatus::Queued);
    assert_eq!(job.worker_id, None);
    assert_eq!(job.available_at, 3_000_000);
    assert_eq!(job.attempts, 1, "attempt counted by the lease");

    // Re-lease bumps attempts again
    lease(&mut state, 10, "w2");
    assert_eq!(state.job(QueueId(10)).unwrap().attempts, 2);
}

#[test]
fn terminal_rows_never_resurrect() {
    let mut state = started_state(5);
    enqueued(&mut state, 5, 10, "fetch");
    lease(&mut state, 10, "w1");
    state.apply_event(&Event::infra(EventKind::QueueDead {
        queue_id: QueueId(10),
        error: "max attempts".into(),
    }));

    state.apply_event(&Event::infra(EventKind::QueueRequeued { queue_id: QueueId(10) }));
    lease(&mut state, 10, "w2");
    assert_eq!(state.job(QueueId(10)).unwrap().status, QueueStatus::Dead);
}

#[test]
fn advance_moves_available_at_for_queued_rows_only() {
    let mut state = started_state(5);
    enqueued(&mut state, 5, 10, "fetch");
    state.apply_event(&Event::infra(EventKind::QueueAdvanced {
        queue_id: QueueId(10),
        available_at: 42,
    }));
    assert_eq!(state.job(QueueId(10)).unwrap().available_at, 42);

    lease(&mut state, 10, "w1");
    state.apply_event(&Event::infra(EventKind::QueueAdvanced {
        queue_id: QueueId(10),
        available_at: 99,
    }));
    assert_eq!(state.job(QueueId(10)).unwrap().available_at, 42);
}

#[test]
fn retry_rows_park_their_step_in_retry_pending() {
    let mut state = started_state(5);
    let mut spec = baton_core::test_support::job_spec(5, "fetch");
    spec.meta.retry = Some(baton_core::RetryMeta {
        attempt_number: 2,
        parent_event_id: baton_core::EventId(7),
        kind: baton_core::RetryKind::OnError,
    });
    let job = spec.into_job(QueueId(11), 1_000_000);
    state.apply_event(&Event::infra(EventKind::QueueEnqueued { job }));

    assert_eq!(
        state.projection(ExecutionId(5)).unwrap().step("fetch").unwrap().phase,
        StepPhase::RetryPending
    );
}

#[test]
fn iterator_children_do_not_drive_parent_phase() {
    let mut state = started_state(5);
    state.apply_event(&exec_event(
        5,
        2,
        EventKind::IteratorStarted {
            step: "cities".into(),
            total: 1,
            mode: baton_core::LoopMode::Async,
            concurrency: 1,
            chunk_size: None,
        },
    ));

    let mut spec = baton_core::test_support::job_spec(5, "cities");
    spec.meta.iterator = Some(baton_core::IteratorMeta {
        step: "cities".into(),
        index: 0,
        total: 1,
        element: "city".into(),
        mode: baton_core::LoopMode::Async,
    });
    let job = spec.into_job(QueueId(12), 1_000_000);
    state.apply_event(&Event::infra(EventKind::QueueEnqueued { job }));

    assert_eq!(
        state.projection(ExecutionId(5)).unwrap().step("cities").unwrap().phase,
        StepPhase::Leased,
        "parent phase stays owned by iterator events"
    );
}
