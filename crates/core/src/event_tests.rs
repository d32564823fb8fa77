// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use yare::parameterized;

#[test]
fn serializes_with_flat_event_type_tag() {
    let mut event = Event::new(
        ExecutionId(12),
        EventKind::ActionCompleted {
            step: "fetch".into(),
            queue_id: QueueId(3),
            result: json!({"ok": true}),
        },
    )
    .with_node("fetch");
    event.event_id = EventId(99);
    event.timestamp = 1_000;

    let v = serde_json::to_value(&event).unwrap();
    assert_eq!(v["event_type"], "action_completed");
    assert_eq!(v["event_id"], "99");
    assert_eq!(v["execution_id"], "12");
    assert_eq!(v["node_id"], "fetch");
    assert_eq!(v["result"]["ok"], true);
}

#[test]
fn round_trips_through_json() {
    let mut event = Event::new(
        ExecutionId(7),
        EventKind::IteratorCompleted {
            step: "cities".into(),
            items: vec![json!(1), json!(2)],
            count: 2,
            errors: vec![IterationError { index: 1, message: "boom".into() }],
        },
    );
    event.event_id = EventId(5);
    event.parent_event_id = Some(EventId(4));
    event.timestamp = 77;

    let text = serde_json::to_string(&event).unwrap();
    let back: Event = serde_json::from_str(&text).unwrap();
    assert_eq!(back, event);
}

#[parameterized(
    execution_start = { EventKind::ExecutionStart { catalog_id: CatalogId(1), path: "p".into(), workload: json!({}) }, "execution_start", true },
    action_failed = { EventKind::ActionFailed { step: "s".into(), queue_id: QueueId(1), error: "e".into(), reason: None, will_retry: false, stack_available: false }, "action_failed", true },
    retry_sequence = { EventKind::RetrySequenceCompleted { step: "s".into(), attempts: 2, aggregated_result: json!([]) }, "retry_sequence_completed", true },
    heartbeat = { EventKind::WorkerHeartbeat { name: "w".into() }, "worker_heartbeat", false },
    queue_leased = { EventKind::QueueLeased { queue_id: QueueId(1), worker_id: "w".into(), lease_until: 5 }, "queue_leased", false },
    runtime_offline = { EventKind::RuntimeOffline { kind: RuntimeKind::WorkerPool, name: "w".into() }, "runtime_offline", false },
)]
fn event_type_names_and_scoping(kind: EventKind, name: &str, execution_scoped: bool) {
    let event = Event::infra(kind);
    assert_eq!(event.event_type(), name);
    assert_eq!(event.is_execution_scoped(), execution_scoped);
}

#[test]
fn context_is_omitted_when_null_and_round_trips_when_set() {
    let bare = Event::new(ExecutionId(1), EventKind::ExecutionPaused);
    let v = serde_json::to_value(&bare).unwrap();
    assert_eq!(v.get("context"), None);

    let with_context = Event::new(
        ExecutionId(1),
        EventKind::ActionCompleted {
            step: "s".into(),
            queue_id: QueueId(2),
            result: json!({}),
        },
    )
    .with_context(json!({"workload": {"k": 1}, "_step_results": {}}));
    let text = serde_json::to_string(&with_context).unwrap();
    let back: Event = serde_json::from_str(&text).unwrap();
    assert_eq!(back.context["workload"]["k"], json!(1));
}

#[test]
fn unknown_event_type_is_rejected() {
    let v = json!({
        "event_id": "1",
        "execution_id": "1",
        "timestamp": 0,
        "event_type": "no_such_event"
    });
    assert!(serde_json::from_value::<Event>(v).is_err());
}

#[test]
fn log_summary_names_type_and_node() {
    let event = Event::new(
        ExecutionId(3),
        EventKind::StepStarted { step: "a".into(), bound: json!(null) },
    )
    .with_node("a");
    assert_eq!(event.log_summary(), "step_started exec=3 node=a");
}
