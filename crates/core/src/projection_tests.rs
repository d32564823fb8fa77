// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn loop_progress_joins_exactly_once() {
    let mut progress = LoopProgress::new(3, LoopMode::Async, 2);

    assert!(progress.record_success(0, json!("a")));
    assert!(progress.record_failure(1, "boom".into()));
    assert!(!progress.try_emit(), "join before all children settle");

    assert!(progress.record_success(2, json!("c")));
    assert!(progress.is_settled());
    assert!(progress.try_emit());
    assert!(!progress.try_emit(), "second emit must be suppressed");
}

#[test]
fn duplicate_child_events_are_ignored() {
    let mut progress = LoopProgress::new(2, LoopMode::Sequential, 1);

    assert!(progress.record_success(0, json!(1)));
    assert!(!progress.record_success(0, json!(2)), "duplicate success");
    assert!(!progress.record_failure(0, "late".into()), "failure after success");
    assert_eq!(progress.completed, 1);
    assert_eq!(progress.results[&0], json!(1));
}

#[test]
fn items_in_order_aligns_with_input_indices() {
    let mut progress = LoopProgress::new(3, LoopMode::Async, 3);
    progress.record_success(2, json!("c"));
    progress.record_failure(1, "x".into());
    progress.record_success(0, json!("a"));

    assert_eq!(progress.items_in_order(), vec![json!("a"), json!(null), json!("c")]);
}

#[test]
fn empty_loop_settles_immediately() {
    let mut progress = LoopProgress::new(0, LoopMode::Async, 1);
    assert!(progress.is_settled());
    assert!(progress.try_emit());
    assert!(progress.items_in_order().is_empty());
}

#[test]
fn projection_tracks_applied_event_ids() {
    let mut projection = ExecutionProjection::new();
    assert!(projection.mark_applied(EventId(1)));
    assert!(!projection.mark_applied(EventId(1)));
    // Unassigned ids are never deduplicated.
    assert!(projection.mark_applied(EventId::NONE));
    assert!(projection.mark_applied(EventId::NONE));
}

#[test]
fn step_phases_classify_activity() {
    let mut projection = ExecutionProjection::new();
    projection.step_mut("a").phase = StepPhase::Parked;
    assert!(!projection.has_active_steps(), "parked alone is not active work");

    projection.step_mut("b").phase = StepPhase::Ready;
    assert!(projection.has_active_steps());

    projection.step_mut("b").phase = StepPhase::Done;
    assert!(!projection.has_active_steps());
}

#[test]
fn step_results_namespace_only_includes_finished_steps() {
    let mut projection = ExecutionProjection::new();
    projection.step_mut("a").result = Some(json!({"n": 1}));
    projection.step_mut("b"); // parked, no result

    let results = projection.step_results();
    assert_eq!(results, json!({"a": {"n": 1}}));
}
