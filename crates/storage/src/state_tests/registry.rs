// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use baton_core::registry::component_key;
use baton_core::{Event, EventKind, RuntimeComponent, RuntimeKind, RuntimeStatus};
use serde_json::json;

fn worker_row(name: &str, heartbeat: u64) -> RuntimeComponent {
    RuntimeComponent {
        runtime_id: format!("rt-{name}"),
        name: name.into(),
        kind: RuntimeKind::WorkerPool,
        uri: "http://worker:0".into(),
        status: RuntimeStatus::Online,
        capabilities: vec!["http".into()],
        capacity: 4,
        labels: Default::default(),
        heartbeat,
        runtime: json!({"pid": 1}),
        created_at: heartbeat,
        updated_at: heartbeat,
    }
}

#[test]
fn register_upserts_and_preserves_created_at() {
    let mut state = crate::MaterializedState::new();
    state.apply_event(&Event::infra(EventKind::RuntimeRegistered {
        component: worker_row("w1", 100),
    }));

    let key = component_key(RuntimeKind::WorkerPool, "w1");
    assert_eq!(state.registry[&key].created_at, 100);

    // Re-registration after a restart refreshes the row
    state.apply_event(&Event::infra(EventKind::RuntimeRegistered {
        component: worker_row("w1", 900),
    }));
    let row = &state.registry[&key];
    assert_eq!(row.created_at, 100);
    assert_eq!(row.heartbeat, 900);
    assert_eq!(row.status, RuntimeStatus::Online);
}

#[test]
fn offline_marks_without_removing() {
    let mut state = crate::MaterializedState::new();
    state.apply_event(&Event::infra(EventKind::RuntimeRegistered {
        component: worker_row("w1", 100),
    }));
    state.apply_event(&Event::infra(EventKind::RuntimeOffline {
        kind: RuntimeKind::WorkerPool,
        name: "w1".into(),
    }));

    let key = component_key(RuntimeKind::WorkerPool, "w1");
    assert_eq!(state.registry[&key].status, RuntimeStatus::Offline);
}

#[test]
fn deregister_removes_the_row() {
    let mut state = crate::MaterializedState::new();
    state.apply_event(&Event::infra(EventKind::RuntimeRegistered {
        component: worker_row("w1", 100),
    }));
    state.apply_event(&Event::infra(EventKind::RuntimeDeregistered {
        kind: RuntimeKind::WorkerPool,
        name: "w1".into(),
    }));
    assert!(state.registry.is_empty());
}

#[test]
fn staleness_is_based_on_heartbeat_age() {
    let row = worker_row("w1", 1_000);
    assert!(!row.is_stale(1_000 + 45_000, 45_000));
    assert!(row.is_stale(1_000 + 45_001, 45_000));

    let mut offline = worker_row("w1", 0);
    offline.status = RuntimeStatus::Offline;
    assert!(!offline.is_stale(u64::MAX, 45_000), "already offline rows are not re-swept");
}
