// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event bus: WAL-backed fan-in for everything the engine must process.
//!
//! Senders (HTTP handlers, the sweeper, the engine itself) append events to
//! the WAL through the bus; the engine loop reads each entry exactly once.
//! The notify handle wakes the loop without polling.

use baton_core::Event;
use baton_storage::{Wal, WalError};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Clone)]
pub struct EventBus {
    wal: Arc<Mutex<Wal>>,
    notify: Arc<Notify>,
}

impl EventBus {
    pub fn new(wal: Wal) -> Self {
        Self { wal: Arc::new(Mutex::new(wal)), notify: Arc::new(Notify::new()) }
    }

    /// Durably append an event. The engine loop is woken to process it.
    pub fn send(&self, event: Event) -> Result<u64, WalError> {
        let seq = {
            let mut wal = self.wal.lock();
            let seq = wal.append(&event)?;
            wal.flush()?;
            seq
        };
        self.notify.notify_one();
        Ok(seq)
    }

    /// Append several events under one lock acquisition.
    pub fn send_all(&self, events: Vec<Event>) -> Result<(), WalError> {
        if events.is_empty() {
            return Ok(());
        }
        {
            let mut wal = self.wal.lock();
            for event in &events {
                wal.append(event)?;
            }
            wal.flush()?;
        }
        self.notify.notify_one();
        Ok(())
    }

    pub fn wal(&self) -> &Arc<Mutex<Wal>> {
        &self.wal
    }

    /// Wait until new entries may be available.
    pub async fn wait(&self) {
        self.notify.notified().await;
    }
}
