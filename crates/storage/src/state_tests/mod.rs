// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

mod executions;
mod queue;
mod registry;

use super::MaterializedState;
use baton_core::{Event, EventId, EventKind, ExecutionId, QueueId};
use serde_json::json;

pub(crate) fn started_state(execution: u64) -> MaterializedState {
    let mut state = MaterializedState::new();
    state.apply_event(&baton_core::test_support::execution_start_event(
        execution,
        1,
        json!({"k": "v"}),
    ));
    state
}

pub(crate) fn exec_event(execution: u64, event: u64, kind: EventKind) -> Event {
    let mut e = Event::new(ExecutionId(execution), kind);
    e.event_id = EventId(event);
    e.timestamp = 1_000_000 + event;
    e
}

pub(crate) fn enqueued(state: &mut MaterializedState, execution: u64, queue: u64, node: &str) {
    let spec = baton_core::test_support::job_spec(execution, node);
    let job = spec.into_job(QueueId(queue), 1_000_000);
    state.apply_event(&Event::infra(EventKind::QueueEnqueued { job }));
}

#[test]
fn replay_reconstructs_identical_state() {
    // Fold a realistic event sequence twice; both folds must agree.
    let events = vec![
        baton_core::test_support::execution_start_event(9, 1, json!({})),
        exec_event(9, 2, EventKind::StepStarted { step: "a".into(), bound: json!(null) }),
        exec_event(9, 3, EventKind::StepCompleted { step: "a".into(), result: json!(1) }),
        exec_event(
            9,
            4,
            EventKind::ExecutionComplete {
                status: baton_core::ExecutionStatus::Completed,
                error: None,
            },
        ),
    ];

    let mut once = MaterializedState::new();
    let mut twice = MaterializedState::new();
    for event in &events {
        once.apply_event(event);
    }
    for event in &events {
        twice.apply_event(event);
        twice.apply_event(event); // double delivery
    }

    assert_eq!(serde_json::to_value(&once).unwrap(), serde_json::to_value(&twice).unwrap());
}

#[test]
fn dedup_key_maps_to_original_event() {
    let mut state = started_state(5);
    let mut event =
        exec_event(5, 2, EventKind::StepCompleted { step: "a".into(), result: json!(null) });
    event.dedup_key = Some("client-1".into());
    state.apply_event(&event);

    assert_eq!(state.dedup_hit(ExecutionId(5), "client-1"), Some(EventId(2)));
    assert_eq!(state.dedup_hit(ExecutionId(5), "other"), None);
}

#[test]
fn prune_drops_old_terminal_executions() {
    let mut state = started_state(5);
    enqueued(&mut state, 5, 10, "a");
    state.apply_event(&exec_event(
        5,
        2,
        EventKind::ExecutionComplete { status: baton_core::ExecutionStatus::Completed, error: None },
    ));

    // end_time is 1_000_002; cutoff after it prunes everything
    assert_eq!(state.prune_executions(2_000_000), 1);
    assert!(state.execution(ExecutionId(5)).is_none());
    assert!(state.job(QueueId(10)).is_none());
    assert!(state.log(ExecutionId(5)).is_empty());

    // Running executions survive
    let mut state = started_state(6);
    assert_eq!(state.prune_executions(2_000_000), 0);
    assert!(state.execution(ExecutionId(6)).is_some());
}
