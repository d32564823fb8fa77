// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot checkpointing: write zstd-compressed state, load it back.

use crate::snapshot::{rotate_bak_path, Snapshot, SnapshotError, CURRENT_SNAPSHOT_VERSION};
use crate::state::MaterializedState;
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};

const ZSTD_LEVEL: i32 = 3;
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// Outcome of a checkpoint write.
#[derive(Debug, Clone, Copy)]
pub struct CheckpointResult {
    pub seq: u64,
    pub size_bytes: u64,
}

/// Writes snapshots to a fixed path, keeping rotated backups of the previous
/// snapshot.
pub struct Checkpointer {
    path: PathBuf,
}

impl Checkpointer {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Write a snapshot synchronously. The previous snapshot, if any, is
    /// rotated to a `.bak` file before the new one replaces it.
    pub fn checkpoint_sync(
        &self,
        seq: u64,
        state: &MaterializedState,
    ) -> Result<CheckpointResult, SnapshotError> {
        let snapshot = Snapshot {
            version: CURRENT_SNAPSHOT_VERSION,
            seq,
            state: state.clone(),
            created_at: Utc::now(),
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_vec(&snapshot)?;
        let compressed = zstd::encode_all(json.as_slice(), ZSTD_LEVEL)?;

        // Write to a temp file then rename so a crash never leaves a
        // half-written snapshot in place.
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &compressed)?;
        if self.path.exists() {
            let bak = rotate_bak_path(&self.path);
            let _ = fs::rename(&self.path, bak);
        }
        fs::rename(&tmp, &self.path)?;

        Ok(CheckpointResult { seq, size_bytes: compressed.len() as u64 })
    }
}

/// Load a snapshot if one exists. Accepts both compressed and plain-JSON
/// files (older snapshots were uncompressed).
pub fn load_snapshot(path: &Path) -> Result<Option<Snapshot>, SnapshotError> {
    let raw = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let json = if raw.starts_with(&ZSTD_MAGIC) {
        zstd::decode_all(raw.as_slice())?
    } else {
        raw
    };

    let snapshot: Snapshot = serde_json::from_slice(&json)?;
    if snapshot.version > CURRENT_SNAPSHOT_VERSION {
        return Err(SnapshotError::UnsupportedVersion(snapshot.version));
    }
    Ok(Some(snapshot))
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
