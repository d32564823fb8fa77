// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state: every table the server serves queries from, rebuilt
//! by folding WAL events.
//!
//! Reducers are idempotent: the same event applied twice leaves the state
//! unchanged. Execution-scoped events are additionally deduplicated by event
//! id, so the HTTP ingest path can apply an event for immediate visibility
//! and the engine loop can apply it again when it returns from the WAL.

mod catalog;
mod executions;
mod queue;
mod registry;
mod types;

pub use types::PlaybookEntry;

use baton_core::{
    CatalogId, Event, EventId, ExecutionId, ExecutionProjection, ExecutionRecord, QueueId,
    QueueJob, RuntimeComponent,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaterializedState {
    pub executions: HashMap<ExecutionId, ExecutionRecord>,
    pub projections: HashMap<ExecutionId, ExecutionProjection>,
    /// Per-execution event log (execution-scoped kinds only).
    pub logs: HashMap<ExecutionId, Vec<Event>>,
    pub queue: BTreeMap<QueueId, QueueJob>,
    /// Liveness registry keyed by `kind/name`.
    pub registry: BTreeMap<String, RuntimeComponent>,
    pub catalog: HashMap<CatalogId, PlaybookEntry>,
    /// `path@version` → catalog id.
    pub catalog_paths: HashMap<String, CatalogId>,
    /// `(execution, client dedup key)` → original event id.
    pub dedup: HashMap<String, EventId>,
}

impl MaterializedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one event into the state.
    pub fn apply_event(&mut self, event: &Event) {
        if event.is_execution_scoped() && !event.execution_id.is_none() {
            let projection = self.projections.entry(event.execution_id).or_default();
            if !projection.mark_applied(event.event_id) {
                return;
            }
            self.logs.entry(event.execution_id).or_default().push(event.clone());
            if let Some(key) = &event.dedup_key {
                self.dedup.insert(dedup_key(event.execution_id, key), event.event_id);
            }
            executions::apply(self, event);
        } else {
            queue::apply(self, event);
            registry::apply(self, event);
            catalog::apply(self, event);
        }
    }

    pub fn execution(&self, id: ExecutionId) -> Option<&ExecutionRecord> {
        self.executions.get(&id)
    }

    pub fn projection(&self, id: ExecutionId) -> Option<&ExecutionProjection> {
        self.projections.get(&id)
    }

    pub fn log(&self, id: ExecutionId) -> &[Event] {
        self.logs.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn job(&self, id: QueueId) -> Option<&QueueJob> {
        self.queue.get(&id)
    }

    /// Original event id for a client dedup key, if the pair was seen.
    pub fn dedup_hit(&self, execution: ExecutionId, key: &str) -> Option<EventId> {
        self.dedup.get(&dedup_key(execution, key)).copied()
    }

    pub fn find_catalog(&self, path: &str, version: &str) -> Option<&PlaybookEntry> {
        let id = self.catalog_paths.get(&PlaybookEntry::path_key(path, version))?;
        self.catalog.get(id)
    }

    /// Latest registered version for a path, by registration order.
    pub fn latest_catalog(&self, path: &str) -> Option<&PlaybookEntry> {
        self.catalog
            .values()
            .filter(|e| e.path == path)
            .max_by_key(|e| e.registered_at)
    }

    /// Drop terminal executions (and their projections, logs, and queue
    /// rows) that ended before `cutoff_ms`.
    pub fn prune_executions(&mut self, cutoff_ms: u64) -> usize {
        let stale: Vec<ExecutionId> = self
            .executions
            .iter()
            .filter(|(_, record)| {
                record.status.is_terminal()
                    && record.end_time.map(|end| end < cutoff_ms).unwrap_or(false)
            })
            .map(|(id, _)| *id)
            .collect();

        for id in &stale {
            self.executions.remove(id);
            self.projections.remove(id);
            self.logs.remove(id);
            self.queue.retain(|_, job| job.execution_id != *id);
            let prefix = format!("{id}:");
            self.dedup.retain(|k, _| !k.starts_with(&prefix));
        }
        stale.len()
    }
}

fn dedup_key(execution: ExecutionId, key: &str) -> String {
    format!("{execution}:{key}")
}

#[cfg(test)]
#[path = "../state_tests/mod.rs"]
mod tests;
