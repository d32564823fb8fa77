// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::MaterializedState;
use baton_core::test_support::execution_start_event;
use baton_core::ExecutionId;
use tempfile::tempdir;

fn state_with_execution() -> MaterializedState {
    let mut state = MaterializedState::new();
    state.apply_event(&execution_start_event(7, 1, serde_json::json!({"a": 1})));
    state
}

#[test]
fn checkpoint_round_trips_compressed() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("snapshot.bin");
    let state = state_with_execution();

    let result = Checkpointer::new(path.clone()).checkpoint_sync(42, &state).unwrap();
    assert_eq!(result.seq, 42);
    assert!(result.size_bytes > 0);

    let snapshot = load_snapshot(&path).unwrap().unwrap();
    assert_eq!(snapshot.seq, 42);
    assert_eq!(snapshot.version, CURRENT_SNAPSHOT_VERSION);
    assert!(snapshot.state.execution(ExecutionId(7)).is_some());
}

#[test]
fn load_missing_snapshot_is_none() {
    let dir = tempdir().unwrap();
    assert!(load_snapshot(&dir.path().join("nope.bin")).unwrap().is_none());
}

#[test]
fn load_accepts_plain_json_snapshots() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("snapshot.bin");
    let snapshot = Snapshot {
        version: CURRENT_SNAPSHOT_VERSION,
        seq: 1,
        state: state_with_execution(),
        created_at: chrono::Utc::now(),
    };
    std::fs::write(&path, serde_json::to_vec(&snapshot).unwrap()).unwrap();

    let loaded = load_snapshot(&path).unwrap().unwrap();
    assert_eq!(loaded.seq, 1);
}

#[test]
fn repeated_checkpoints_rotate_backups() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("snapshot.bin");
    let state = state_with_execution();
    let checkpointer = Checkpointer::new(path.clone());

    for seq in 1..=3 {
        checkpointer.checkpoint_sync(seq, &state).unwrap();
    }

    assert!(path.exists());
    assert!(path.with_extension("bak").exists());
    assert_eq!(load_snapshot(&path).unwrap().unwrap().seq, 3);
}

#[test]
fn newer_snapshot_versions_are_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("snapshot.bin");
    let snapshot = Snapshot {
        version: CURRENT_SNAPSHOT_VERSION + 1,
        seq: 1,
        state: MaterializedState::new(),
        created_at: chrono::Utc::now(),
    };
    std::fs::write(&path, serde_json::to_vec(&snapshot).unwrap()).unwrap();

    assert!(matches!(
        load_snapshot(&path),
        Err(SnapshotError::UnsupportedVersion(_))
    ));
}
