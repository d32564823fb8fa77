// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::engine::test_helpers::Harness;
use baton_core::registry::component_key;
use baton_core::{RuntimeKind, RuntimeStatus};
use baton_storage::load_snapshot;
use serde_json::json;
use std::sync::Arc;

fn sweeper_for(h: &Harness, snapshot_path: std::path::PathBuf) -> Sweeper<baton_core::FakeClock> {
    Sweeper::new(
        Arc::clone(&h.state),
        h.bus.clone(),
        Arc::clone(&h.ids),
        h.clock.clone(),
        Arc::new(crate::queue_service::QueueService::new(
            Arc::clone(&h.state),
            h.bus.clone(),
            Arc::clone(&h.ids),
            h.clock.clone(),
        )),
        Checkpointer::new(snapshot_path),
        SweeperConfig {
            server_name: "server".into(),
            server_uri: "http://127.0.0.1:8873".into(),
            offline_after: Duration::from_secs(45),
            prune_after: Duration::from_secs(3600),
            checkpoint_every: 4,
        },
        0,
    )
}

fn register_worker(h: &Harness, name: &str, heartbeat: u64) {
    let component = baton_core::RuntimeComponent {
        runtime_id: format!("rt-{name}"),
        name: name.into(),
        kind: RuntimeKind::WorkerPool,
        uri: "http://w".into(),
        status: RuntimeStatus::Online,
        capabilities: vec![],
        capacity: 2,
        labels: Default::default(),
        heartbeat,
        runtime: json!({}),
        created_at: heartbeat,
        updated_at: heartbeat,
    };
    let event = h.event(
        baton_core::ExecutionId::NONE,
        baton_core::EventKind::RuntimeRegistered { component },
    );
    h.emit(event);
    h.pump();
}

#[test]
fn stale_workers_are_marked_offline() {
    let dir = tempfile::tempdir().unwrap();
    let h = Harness::new();
    register_worker(&h, "w-stale", h.clock.epoch_ms());
    register_worker(&h, "w-fresh", h.clock.epoch_ms());

    h.clock.advance(Duration::from_secs(50));
    // Fresh worker heartbeats just before the sweep
    {
        let mut state = h.state.lock();
        let key = component_key(RuntimeKind::WorkerPool, "w-fresh");
        state.registry.get_mut(&key).unwrap().heartbeat = h.clock.epoch_ms();
    }

    let mut sweeper = sweeper_for(&h, dir.path().join("snapshot.bin"));
    sweeper.sweep();
    h.pump();

    let state = h.state.lock();
    let stale = &state.registry[&component_key(RuntimeKind::WorkerPool, "w-stale")];
    let fresh = &state.registry[&component_key(RuntimeKind::WorkerPool, "w-fresh")];
    assert_eq!(stale.status, RuntimeStatus::Offline);
    assert_eq!(fresh.status, RuntimeStatus::Online);
}

#[test]
fn sweeper_registers_and_refreshes_its_own_row() {
    let dir = tempfile::tempdir().unwrap();
    let h = Harness::new();
    let mut sweeper = sweeper_for(&h, dir.path().join("snapshot.bin"));

    sweeper.sweep();
    h.pump();
    let key = component_key(RuntimeKind::ServerApi, "server");
    let first_heartbeat = h.state.lock().registry[&key].heartbeat;

    h.clock.advance(Duration::from_secs(15));
    sweeper.sweep();
    h.pump();
    let second_heartbeat = h.state.lock().registry[&key].heartbeat;
    assert_eq!(second_heartbeat, first_heartbeat + 15_000);
}

#[test]
fn sweep_returns_expired_leases() {
    let dir = tempfile::tempdir().unwrap();
    let h = Harness::new();
    h.run_playbook(
        json!({
            "path": "flows/sweep",
            "steps": [{"step": "work", "tool": {"kind": "http", "spec": {}}}]
        }),
        json!({}),
    );
    let jobs = h.lease_all("w1");
    h.clock.advance(Duration::from_secs(61));

    let mut sweeper = sweeper_for(&h, dir.path().join("snapshot.bin"));
    sweeper.sweep();
    h.pump();

    assert_eq!(
        h.job(jobs[0].queue_id).unwrap().status,
        baton_core::QueueStatus::Queued
    );
}

#[test]
fn checkpoint_saves_snapshot_and_truncates_wal() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot_path = dir.path().join("snapshot.bin");
    let h = Harness::new();
    h.run_playbook(
        json!({
            "path": "flows/ckpt",
            "steps": [{"step": "work", "tool": {"kind": "http", "spec": {}}}]
        }),
        json!({}),
    );

    let mut sweeper = sweeper_for(&h, snapshot_path.clone());
    sweeper.sweep();

    let snapshot = load_snapshot(&snapshot_path).unwrap().unwrap();
    assert!(snapshot.seq >= 4, "snapshot covers the processed prefix");
    assert!(!snapshot.state.executions.is_empty());

    // WAL prefix below the snapshot is gone
    let entries = h.bus.wal().lock().entries_after(0).unwrap();
    assert!(entries.iter().all(|e| e.seq > snapshot.seq));
}

#[test]
fn old_terminal_executions_are_pruned() {
    let dir = tempfile::tempdir().unwrap();
    let h = Harness::new();
    let execution = h.run_playbook(
        json!({"path": "flows/old", "steps": [{"step": "only"}]}),
        json!({}),
    );
    assert_eq!(h.status(execution), baton_core::ExecutionStatus::Completed);

    h.clock.advance(Duration::from_secs(7200));
    let mut sweeper = sweeper_for(&h, dir.path().join("snapshot.bin"));
    sweeper.sweep();

    assert!(h.state.lock().execution(execution).is_none());
}
