// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::{exec_event, started_state};
use baton_core::{EventKind, ExecutionId, ExecutionStatus, LoopMode, StepPhase};
use serde_json::json;

#[test]
fn execution_start_creates_record_once() {
    let state = started_state(5);
    let record = state.execution(ExecutionId(5)).unwrap();
    assert_eq!(record.status, ExecutionStatus::Started);
    assert_eq!(record.workload, json!({"k": "v"}));
    assert_eq!(state.log(ExecutionId(5)).len(), 1);
}

#[test]
fn step_started_moves_execution_to_running_and_hoists_bind() {
    let mut state = started_state(5);
    state.apply_event(&exec_event(
        5,
        2,
        EventKind::StepStarted { step: "a".into(), bound: json!({"answer": 42}) },
    ));

    assert_eq!(state.execution(ExecutionId(5)).unwrap().status, ExecutionStatus::Running);
    let projection = state.projection(ExecutionId(5)).unwrap();
    assert_eq!(projection.vars["answer"], json!(42));
}

#[test]
fn call_delivery_merges_into_buffer() {
    let mut state = started_state(5);
    state.apply_event(&exec_event(
        5,
        2,
        EventKind::CallDelivered { step: "join".into(), args: json!({"alert_done": true}) },
    ));
    state.apply_event(&exec_event(
        5,
        3,
        EventKind::CallDelivered { step: "join".into(), args: json!({"quarantine_done": true}) },
    ));

    let projection = state.projection(ExecutionId(5)).unwrap();
    let call = &projection.step("join").unwrap().call;
    assert_eq!(call["alert_done"], json!(true));
    assert_eq!(call["quarantine_done"], json!(true));
    assert_eq!(projection.step("join").unwrap().phase, StepPhase::Parked);
}

#[test]
fn call_delivery_to_done_step_is_dropped() {
    let mut state = started_state(5);
    state.apply_event(&exec_event(
        5,
        2,
        EventKind::StepCompleted { step: "a".into(), result: json!(1) },
    ));
    state.apply_event(&exec_event(
        5,
        3,
        EventKind::CallDelivered { step: "a".into(), args: json!({"late": true}) },
    ));

    let step = state.projection(ExecutionId(5)).unwrap().step("a").unwrap();
    assert_eq!(step.phase, StepPhase::Done);
    assert_eq!(step.call, json!({}));
}

#[test]
fn step_failure_is_terminal_but_completion_wins() {
    let mut state = started_state(5);
    state.apply_event(&exec_event(
        5,
        2,
        EventKind::StepCompleted { step: "a".into(), result: json!(1) },
    ));
    // A late duplicate failure (expired lease attempt) must not kill it
    state.apply_event(&exec_event(
        5,
        3,
        EventKind::StepFailed { step: "a".into(), error: "late".into() },
    ));

    let step = state.projection(ExecutionId(5)).unwrap().step("a").unwrap();
    assert_eq!(step.phase, StepPhase::Done);
    assert_eq!(step.result, Some(json!(1)));
}

#[test]
fn iterator_events_fold_into_loop_progress() {
    let mut state = started_state(5);
    state.apply_event(&exec_event(
        5,
        2,
        EventKind::IteratorStarted {
            step: "cities".into(),
            total: 2,
            mode: LoopMode::Async,
            concurrency: 2,
            chunk_size: None,
        },
    ));
    state.apply_event(&exec_event(
        5,
        3,
        EventKind::IterationCompleted { step: "cities".into(), index: 1, result: json!("b") },
    ));
    state.apply_event(&exec_event(
        5,
        4,
        EventKind::IterationFailed { step: "cities".into(), index: 0, error: "x".into() },
    ));

    let projection = state.projection(ExecutionId(5)).unwrap();
    let progress = projection.step("cities").unwrap().loop_progress.as_ref().unwrap();
    assert!(progress.is_settled());
    assert_eq!(progress.completed, 1);
    assert_eq!(progress.failed, 1);
}

#[test]
fn abort_fails_a_running_execution() {
    let mut state = started_state(5);
    state.apply_event(&exec_event(5, 2, EventKind::ExecutionAbort { reason: None }));
    let record = state.execution(ExecutionId(5)).unwrap();
    assert_eq!(record.status, ExecutionStatus::Failed);
    assert_eq!(record.error.as_deref(), Some("aborted"));
}

#[test]
fn pause_and_resume_round_trip() {
    let mut state = started_state(5);
    state.apply_event(&exec_event(5, 2, EventKind::ExecutionPaused));
    assert_eq!(state.execution(ExecutionId(5)).unwrap().status, ExecutionStatus::Paused);

    state.apply_event(&exec_event(5, 3, EventKind::ExecutionResumed));
    assert_eq!(state.execution(ExecutionId(5)).unwrap().status, ExecutionStatus::Running);
}

#[test]
fn terminal_status_never_reopens() {
    let mut state = started_state(5);
    state.apply_event(&exec_event(
        5,
        2,
        EventKind::ExecutionComplete { status: ExecutionStatus::Completed, error: None },
    ));
    state.apply_event(&exec_event(5, 3, EventKind::ExecutionPaused));
    assert_eq!(state.execution(ExecutionId(5)).unwrap().status, ExecutionStatus::Completed);
}
