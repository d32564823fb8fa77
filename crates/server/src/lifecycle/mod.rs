// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Server lifecycle: startup, the engine loop, shutdown.

mod startup;

pub use startup::{startup, StartupResult};

use crate::event_bus::EventBus;
use crate::sweeper::Sweeper;
use crate::Runtime;
use baton_core::{Clock, SystemClock};
use baton_storage::{Checkpointer, MaterializedState};
use parking_lot::Mutex;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Server runtime with the production clock.
pub type ServerRuntime = Runtime<SystemClock>;

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (e.g. ~/.local/state/baton)
    pub state_dir: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to WAL file
    pub wal_path: PathBuf,
    /// Path to snapshot file
    pub snapshot_path: PathBuf,
    /// Path to server log file
    pub log_path: PathBuf,
    /// HTTP listen address
    pub listen_addr: String,
}

impl Config {
    /// Load configuration from the environment.
    pub fn load() -> Result<Self, LifecycleError> {
        let state_dir = crate::env::state_dir()?;
        Ok(Self {
            lock_path: state_dir.join("server.pid"),
            wal_path: state_dir.join("wal").join("events.wal"),
            snapshot_path: state_dir.join("snapshot.bin"),
            log_path: state_dir.join("server.log"),
            listen_addr: crate::env::listen_addr(),
            state_dir,
        })
    }
}

/// Running server state.
pub struct ServerState<C: Clock> {
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive state-dir ownership;
    // released on drop. This is the single-writer guarantee for projections.
    #[allow(dead_code)]
    lock_file: File,
    pub state: Arc<Mutex<MaterializedState>>,
    pub runtime: Arc<Runtime<C>>,
    pub bus: EventBus,
    pub sweeper: Sweeper<C>,
    pub sweep_interval: Duration,
}

impl<C: Clock> ServerState<C> {
    /// The engine loop: drain the WAL, apply + handle each entry once,
    /// persist the result events, and sweep on a timer.
    pub async fn run(mut self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.sweep_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            self.drain();

            tokio::select! {
                _ = self.bus.wait() => {}
                _ = ticker.tick() => self.sweeper.sweep(),
                _ = shutdown.cancelled() => break,
            }
        }

        self.shutdown();
    }

    /// Process every unprocessed WAL entry, in sequence order.
    ///
    /// Result events are persisted back to the WAL and processed on a later
    /// drain iteration; handlers never recurse.
    fn drain(&self) {
        loop {
            let entry = match self.bus.wal().lock().next_unprocessed() {
                Ok(Some(entry)) => entry,
                Ok(None) => return,
                Err(e) => {
                    tracing::error!(error = %e, "failed to read WAL entry");
                    return;
                }
            };

            // Idempotent re-apply: ingest paths already applied the event
            // for immediate visibility.
            self.state.lock().apply_event(&entry.event);

            match self.runtime.handle_event(&entry.event) {
                Ok(result_events) => {
                    if let Err(e) = self.bus.send_all(result_events) {
                        tracing::error!(error = %e, "failed to persist result events");
                    }
                }
                // A handler error is logged and surfaced through the event
                // stream; it never takes the loop down.
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        event = %entry.event.log_summary(),
                        "event handler failed"
                    );
                }
            }

            self.bus.wal().lock().mark_processed(entry.seq);
        }
    }

    /// Graceful shutdown: flush the WAL and save a final snapshot so the
    /// next startup replays nothing.
    fn shutdown(&mut self) {
        info!("shutting down server...");

        if let Err(e) = self.bus.wal().lock().flush() {
            warn!("failed to flush WAL on shutdown: {}", e);
        }

        let processed = self.bus.wal().lock().processed_seq();
        if processed > 0 {
            let state_clone = self.state.lock().clone();
            let checkpointer = Checkpointer::new(self.config.snapshot_path.clone());
            match checkpointer.checkpoint_sync(processed, &state_clone) {
                Ok(result) => info!(
                    seq = result.seq,
                    size_bytes = result.size_bytes,
                    "saved final shutdown snapshot"
                ),
                Err(e) => warn!("failed to save shutdown snapshot: {}", e),
            }
        }

        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                warn!("failed to remove PID file: {}", e);
            }
        }

        info!("server shutdown complete");
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("could not determine state directory")]
    NoStateDir,

    #[error("failed to acquire lock: server already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("WAL error: {0}")]
    Wal(#[from] baton_storage::WalError),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] baton_storage::SnapshotError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bind failed on {0}: {1}")]
    BindFailed(String, std::io::Error),
}
