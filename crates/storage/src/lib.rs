// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage layer for Baton: the event WAL, snapshots, and the materialized
//! state rebuilt from them.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod checkpoint;
mod snapshot;
mod state;
mod wal;

pub use checkpoint::{load_snapshot, CheckpointResult, Checkpointer};
pub use snapshot::{Snapshot, SnapshotError, CURRENT_SNAPSHOT_VERSION};
pub use state::{MaterializedState, PlaybookEntry};
pub use wal::{Wal, WalEntry, WalError};
