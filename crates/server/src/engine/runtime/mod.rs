// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime for the Baton engine
//!
//! One handler invocation per WAL event, single-threaded: the engine loop
//! feeds events in sequence order, which serializes all decisions for an
//! execution and yields the per-execution total order the projections rely
//! on. Handlers read state, never write it directly — every write is an
//! effect executed through the [`Executor`].

mod handlers;
pub(crate) mod scope;

pub(crate) use scope::build_scope;

use crate::engine::error::RuntimeError;
use crate::engine::executor::Executor;
use baton_core::{
    CatalogId, Clock, Event, EventId, EventKind, ExecutionId, ExecutionRecord,
    ExecutionProjection, ExecutionStatus, IdGen,
};
use baton_playbook::{Playbook, TemplateEvaluator};
use baton_storage::MaterializedState;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Arc;

/// Runtime that turns inbound events into queue writes and synthetic events.
pub struct Runtime<C: Clock> {
    pub executor: Executor<C>,
    templater: Arc<dyn TemplateEvaluator>,
    playbooks: Mutex<HashMap<CatalogId, Arc<Playbook>>>,
    rng: Mutex<StdRng>,
}

impl<C: Clock> Runtime<C> {
    pub fn new(
        state: Arc<Mutex<MaterializedState>>,
        ids: Arc<dyn IdGen>,
        clock: C,
        templater: Arc<dyn TemplateEvaluator>,
    ) -> Self {
        Self {
            executor: Executor::new(state, ids, clock),
            templater,
            playbooks: Mutex::new(HashMap::new()),
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Deterministic jitter for tests.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    /// Handle one event, returning the result events to persist.
    ///
    /// The event has already been applied to the materialized state.
    pub fn handle_event(&self, event: &Event) -> Result<Vec<Event>, RuntimeError> {
        match &event.kind {
            EventKind::ExecutionStart { .. } => self.handle_execution_start(event),
            EventKind::CallDelivered { step, .. } => self.handle_call_delivered(event, step),
            EventKind::StepStarted { .. } => Ok(vec![]),
            EventKind::StepCompleted { step, result } => {
                self.handle_step_completed(event, step, result)
            }
            EventKind::StepFailed { step, error } => self.handle_step_failed(event, step, error),
            EventKind::ActionStarted { .. } => self.handle_action_started(event),
            EventKind::ActionCompleted { .. } => self.handle_action_completed(event),
            EventKind::ActionFailed { .. } => self.handle_action_failed(event),
            EventKind::IterationCompleted { step, .. } | EventKind::IterationFailed { step, .. } => {
                self.handle_iteration_terminal(event, step)
            }
            EventKind::IteratorCompleted { .. } => self.handle_iterator_completed(event),
            EventKind::ExecutionComplete { status, .. } => {
                self.handle_execution_complete(event, *status)
            }
            EventKind::ExecutionResumed => self.handle_execution_resumed(event),
            _ => Ok(vec![]),
        }
    }

    // ── shared lookups ──────────────────────────────────────────────────────

    pub(crate) fn lock_state<T>(&self, f: impl FnOnce(&MaterializedState) -> T) -> T {
        let state = self.executor.state();
        let guard = state.lock();
        f(&guard)
    }

    /// Execution record, or an error for events about unknown executions.
    pub(crate) fn require_execution(
        &self,
        id: ExecutionId,
    ) -> Result<ExecutionRecord, RuntimeError> {
        self.lock_state(|s| s.execution(id).cloned())
            .ok_or(RuntimeError::ExecutionNotFound(id))
    }

    /// Snapshot of the projection (empty if none yet).
    pub(crate) fn projection_snapshot(&self, id: ExecutionId) -> ExecutionProjection {
        self.lock_state(|s| s.projection(id).cloned()).unwrap_or_default()
    }

    /// Whether the execution still accepts engine decisions.
    pub(crate) fn is_live(&self, record: &ExecutionRecord) -> bool {
        matches!(record.status, ExecutionStatus::Started | ExecutionStatus::Running)
    }

    /// Parse-and-cache the playbook behind a catalog id.
    pub(crate) fn playbook_for(&self, catalog_id: CatalogId) -> Result<Arc<Playbook>, RuntimeError> {
        {
            let cache = self.playbooks.lock();
            if let Some(playbook) = cache.get(&catalog_id) {
                return Ok(Arc::clone(playbook));
            }
        }

        let document = self
            .lock_state(|s| s.catalog.get(&catalog_id).map(|e| e.document.clone()))
            .ok_or(RuntimeError::PlaybookNotFound(catalog_id))?;
        let playbook = Arc::new(Playbook::from_value(document)?);

        let mut cache = self.playbooks.lock();
        cache.insert(catalog_id, Arc::clone(&playbook));
        Ok(playbook)
    }

    /// Render a template, attributing errors to the step.
    pub(crate) fn render(
        &self,
        execution: ExecutionId,
        step: &str,
        template: &str,
        scope: &serde_json::Value,
    ) -> Result<serde_json::Value, RuntimeError> {
        self.templater.render(template, scope).map_err(|source| RuntimeError::Template {
            execution,
            step: step.to_string(),
            source,
        })
    }

    pub(crate) fn templater(&self) -> &dyn TemplateEvaluator {
        self.templater.as_ref()
    }

    /// Sampled jitter fraction in `[-amplitude, +amplitude]`.
    pub(crate) fn jitter_frac(&self, amplitude: f64) -> f64 {
        if amplitude <= 0.0 {
            return 0.0;
        }
        self.rng.lock().gen_range(-amplitude..=amplitude)
    }

    /// Build an execution event with a fresh id.
    pub(crate) fn event(&self, execution: ExecutionId, kind: EventKind) -> Event {
        let mut event = Event::new(execution, kind);
        event.event_id = EventId(self.executor.ids().next());
        event.timestamp = self.executor.clock().epoch_ms();
        event
    }
}

#[cfg(test)]
#[path = "../runtime_tests/mod.rs"]
mod tests;
