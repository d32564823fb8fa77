// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write-ahead log of events.
//!
//! Line-oriented JSON: one `{"seq": n, "event": {...}}` per line. The engine
//! loop reads every entry exactly once through `next_unprocessed`; recovery
//! replays entries after a snapshot's sequence number. A torn final line
//! (crash mid-write) is skipped with a warning.

use baton_core::Event;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One durable log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalEntry {
    pub seq: u64,
    pub event: Event,
}

/// Append-only event log with an in-memory read cursor.
pub struct Wal {
    path: PathBuf,
    writer: BufWriter<File>,
    /// Last sequence written to disk.
    write_seq: u64,
    /// Last sequence handed out and acknowledged via `mark_processed`.
    processed_seq: u64,
    /// Entries not yet returned by `next_unprocessed`.
    pending: VecDeque<WalEntry>,
}

impl Wal {
    /// Open (or create) the log, queueing entries after `processed_seq` for
    /// processing.
    pub fn open(path: impl AsRef<Path>, processed_seq: u64) -> Result<Self, WalError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let entries = read_entries(&path)?;
        let write_seq = entries.last().map(|e| e.seq).unwrap_or(0).max(processed_seq);
        let pending = entries.into_iter().filter(|e| e.seq > processed_seq).collect();

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            write_seq,
            processed_seq,
            pending,
        })
    }

    pub fn write_seq(&self) -> u64 {
        self.write_seq
    }

    pub fn processed_seq(&self) -> u64 {
        self.processed_seq
    }

    /// Append an event, returning its sequence number. The entry is also
    /// queued for `next_unprocessed` so the engine loop sees its own writes.
    pub fn append(&mut self, event: &Event) -> Result<u64, WalError> {
        let seq = self.write_seq + 1;
        let entry = WalEntry { seq, event: event.clone() };
        let line = serde_json::to_string(&entry)?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.write_seq = seq;
        self.pending.push_back(entry);
        Ok(seq)
    }

    pub fn flush(&mut self) -> Result<(), WalError> {
        self.writer.flush()?;
        Ok(())
    }

    /// Next entry the engine has not seen yet, in sequence order.
    pub fn next_unprocessed(&mut self) -> Result<Option<WalEntry>, WalError> {
        Ok(self.pending.pop_front())
    }

    /// Acknowledge an entry returned by `next_unprocessed`.
    pub fn mark_processed(&mut self, seq: u64) {
        self.processed_seq = self.processed_seq.max(seq);
    }

    /// All entries with sequence greater than `seq`, read from disk.
    pub fn entries_after(&mut self, seq: u64) -> Result<Vec<WalEntry>, WalError> {
        self.flush()?;
        Ok(read_entries(&self.path)?.into_iter().filter(|e| e.seq > seq).collect())
    }

    /// Drop entries with sequence below `seq` (after a snapshot made them
    /// redundant). Rewrites the file in place.
    pub fn truncate_before(&mut self, seq: u64) -> Result<(), WalError> {
        self.flush()?;
        let keep: Vec<WalEntry> =
            read_entries(&self.path)?.into_iter().filter(|e| e.seq >= seq).collect();

        let mut file = OpenOptions::new().write(true).truncate(true).open(&self.path)?;
        for entry in &keep {
            let line = serde_json::to_string(entry)?;
            file.write_all(line.as_bytes())?;
            file.write_all(b"\n")?;
        }
        file.flush()?;
        file.seek(SeekFrom::End(0))?;
        self.writer = BufWriter::new(file);
        Ok(())
    }
}

fn read_entries(path: &Path) -> Result<Vec<WalEntry>, WalError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut entries = Vec::new();
    let reader = BufReader::new(file);
    let mut lines = reader.lines().peekable();
    while let Some(line) = lines.next() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<WalEntry>(&line) {
            Ok(entry) => entries.push(entry),
            Err(e) if lines.peek().is_none() => {
                // Torn final line from a crash mid-write; recoverable.
                tracing::warn!(path = %path.display(), error = %e, "skipping torn WAL tail");
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok(entries)
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
