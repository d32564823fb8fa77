// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime sweeper: periodic housekeeping that keeps liveness honest.
//!
//! Every tick it returns expired leases, marks stale registry rows offline,
//! refreshes the server's own heartbeat row, prunes old terminal
//! executions, and checkpoints a snapshot when enough WAL has accumulated.
//! Losing the sweeper delays liveness transitions; it never affects
//! execution correctness.

use crate::event_bus::EventBus;
use crate::queue_service::QueueService;
use baton_core::registry::component_key;
use baton_core::{
    Clock, Event, EventId, EventKind, IdGen, RuntimeComponent, RuntimeKind, RuntimeStatus,
};
use baton_storage::{Checkpointer, MaterializedState};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

pub struct SweeperConfig {
    /// Server name for its own registry row.
    pub server_name: String,
    pub server_uri: String,
    pub offline_after: Duration,
    /// Zero disables pruning.
    pub prune_after: Duration,
    /// WAL entries between snapshot checkpoints.
    pub checkpoint_every: u64,
}

pub struct Sweeper<C: Clock> {
    state: Arc<Mutex<MaterializedState>>,
    bus: EventBus,
    ids: Arc<dyn IdGen>,
    clock: C,
    queue: Arc<QueueService<C>>,
    checkpointer: Checkpointer,
    config: SweeperConfig,
    last_checkpoint_seq: u64,
    ticks: u64,
}

impl<C: Clock> Sweeper<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        state: Arc<Mutex<MaterializedState>>,
        bus: EventBus,
        ids: Arc<dyn IdGen>,
        clock: C,
        queue: Arc<QueueService<C>>,
        checkpointer: Checkpointer,
        config: SweeperConfig,
        last_checkpoint_seq: u64,
    ) -> Self {
        Self {
            state,
            bus,
            ids,
            clock,
            queue,
            checkpointer,
            config,
            last_checkpoint_seq,
            ticks: 0,
        }
    }

    /// One sweep tick. Errors are logged per concern, never swallowed into
    /// silence, and one failing concern does not stop the others.
    pub fn sweep(&mut self) {
        let now = self.clock.epoch_ms();

        match self.queue.sweep_expired_leases() {
            Ok(stats) if stats.requeued + stats.dead > 0 => {
                tracing::info!(
                    requeued = stats.requeued,
                    dead = stats.dead,
                    "returned expired leases"
                );
            }
            Ok(_) => {}
            Err(e) => tracing::error!(error = %e, "lease sweep failed"),
        }

        self.sweep_stale_components(now);
        self.refresh_own_heartbeat(now);

        if !self.config.prune_after.is_zero() {
            let cutoff = now.saturating_sub(self.config.prune_after.as_millis() as u64);
            let pruned = self.state.lock().prune_executions(cutoff);
            if pruned > 0 {
                tracing::info!(pruned, "pruned terminal executions");
            }
        }

        self.maybe_checkpoint();

        // Coarse metrics snapshot every fourth tick.
        self.ticks += 1;
        if self.ticks % 4 == 0 {
            let (executions, queued, leased, components) = {
                let state = self.state.lock();
                let queued = state
                    .queue
                    .values()
                    .filter(|j| j.status == baton_core::QueueStatus::Queued)
                    .count();
                let leased = state
                    .queue
                    .values()
                    .filter(|j| j.status == baton_core::QueueStatus::Leased)
                    .count();
                (state.executions.len(), queued, leased, state.registry.len())
            };
            tracing::info!(executions, queued, leased, components, "runtime metrics");
        }
    }

    /// Mark components whose heartbeat is older than `offline_after`.
    fn sweep_stale_components(&self, now: u64) {
        let offline_after = self.config.offline_after.as_millis() as u64;
        let stale: Vec<(RuntimeKind, String)> = {
            let state = self.state.lock();
            state
                .registry
                .values()
                .filter(|row| row.is_stale(now, offline_after))
                .map(|row| (row.kind, row.name.clone()))
                .collect()
        };

        for (kind, name) in stale {
            tracing::warn!(%kind, name, "component heartbeat stale, marking offline");
            let mut event =
                Event::infra(EventKind::RuntimeOffline { kind, name: name.clone() });
            event.event_id = EventId(self.ids.next());
            event.timestamp = now;
            self.state.lock().apply_event(&event);
            if let Err(e) = self.bus.send(event) {
                tracing::error!(error = %e, "failed to persist offline transition");
            }
        }
    }

    /// Upsert the server's own registry row, auto-creating it if missing.
    fn refresh_own_heartbeat(&self, now: u64) {
        let key = component_key(RuntimeKind::ServerApi, &self.config.server_name);
        let missing = {
            let mut state = self.state.lock();
            match state.registry.get_mut(&key) {
                Some(row) => {
                    row.heartbeat = now;
                    row.updated_at = now;
                    row.status = RuntimeStatus::Online;
                    false
                }
                None => true,
            }
        };
        if !missing {
            return;
        }

        let component = RuntimeComponent {
            runtime_id: format!("srv-{}", self.ids.next()),
            name: self.config.server_name.clone(),
            kind: RuntimeKind::ServerApi,
            uri: self.config.server_uri.clone(),
            status: RuntimeStatus::Online,
            capabilities: vec![],
            capacity: 0,
            labels: Default::default(),
            heartbeat: now,
            runtime: serde_json::json!({
                "pid": std::process::id(),
                "type": "server_api",
            }),
            created_at: now,
            updated_at: now,
        };
        let mut event = Event::infra(EventKind::RuntimeRegistered { component });
        event.event_id = EventId(self.ids.next());
        event.timestamp = now;
        self.state.lock().apply_event(&event);
        match self.bus.send(event) {
            Ok(_) => tracing::info!(name = %self.config.server_name, "registered server runtime row"),
            Err(e) => tracing::error!(error = %e, "failed to persist server registration"),
        }
    }

    /// Snapshot the state once enough WAL entries have accumulated, then
    /// drop the WAL prefix the snapshot covers.
    fn maybe_checkpoint(&mut self) {
        let processed = self.bus.wal().lock().processed_seq();
        if processed < self.last_checkpoint_seq + self.config.checkpoint_every {
            return;
        }

        let state_clone = self.state.lock().clone();
        match self.checkpointer.checkpoint_sync(processed, &state_clone) {
            Ok(result) => {
                tracing::info!(seq = result.seq, size_bytes = result.size_bytes, "saved snapshot");
                self.last_checkpoint_seq = processed;
                if let Err(e) = self.bus.wal().lock().truncate_before(processed + 1) {
                    tracing::error!(error = %e, "failed to truncate WAL after checkpoint");
                }
            }
            Err(e) => tracing::error!(error = %e, "snapshot checkpoint failed"),
        }
    }
}

#[cfg(test)]
#[path = "sweeper_tests.rs"]
mod tests;
