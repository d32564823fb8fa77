// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Effect executor
//!
//! Turns handler effects into events: assigns ids and timestamps, applies
//! each event to the materialized state for immediate visibility, and hands
//! the events back to the engine loop for WAL persistence. Reducers are
//! idempotent, so the second apply when the event returns from the WAL is
//! harmless.

use crate::engine::error::RuntimeError;
use baton_core::{Clock, Effect, Event, EventId, EventKind, IdGen, JobSpec, QueueId};
use baton_storage::MaterializedState;
use parking_lot::Mutex;
use std::sync::Arc;

pub struct Executor<C: Clock> {
    state: Arc<Mutex<MaterializedState>>,
    ids: Arc<dyn IdGen>,
    clock: C,
}

impl<C: Clock> Executor<C> {
    pub fn new(state: Arc<Mutex<MaterializedState>>, ids: Arc<dyn IdGen>, clock: C) -> Self {
        Self { state, ids, clock }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn ids(&self) -> &Arc<dyn IdGen> {
        &self.ids
    }

    pub fn state(&self) -> Arc<Mutex<MaterializedState>> {
        Arc::clone(&self.state)
    }

    /// Execute a single effect with tracing.
    ///
    /// Returns the events produced, already applied to state and ready for
    /// WAL persistence.
    pub fn execute(&self, effect: Effect) -> Result<Vec<Event>, RuntimeError> {
        let info: String =
            effect.fields().iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join(" ");
        let op = effect.name();
        if effect.verbose() {
            tracing::info!("executing effect={} {}", op, info);
        }

        let result = self.execute_inner(effect);
        match &result {
            Ok(events) => tracing::debug!(events = events.len(), "effect={} {}", op, info),
            Err(e) => tracing::error!(error = %e, "error effect={} {}", op, info),
        }
        result
    }

    fn execute_inner(&self, effect: Effect) -> Result<Vec<Event>, RuntimeError> {
        match effect {
            Effect::Emit { event } => {
                let event = self.finalize(event);
                self.state.lock().apply_event(&event);
                Ok(vec![event])
            }
            Effect::Enqueue { spec } => {
                let mut state = self.state.lock();
                if is_duplicate(&state, &spec) {
                    return Ok(vec![]);
                }
                let event = self.enqueue_event(spec);
                state.apply_event(&event);
                Ok(vec![event])
            }
            Effect::EnqueueBatch { specs } => {
                // One lock acquisition keeps the batch atomic with respect
                // to concurrent lease queries.
                let mut state = self.state.lock();
                let events: Vec<Event> = specs
                    .into_iter()
                    .filter(|spec| !is_duplicate(&state, spec))
                    .map(|spec| self.enqueue_event(spec))
                    .collect();
                for event in &events {
                    state.apply_event(event);
                }
                Ok(events)
            }
        }
    }

    /// Execute multiple effects in order, collecting produced events.
    pub fn execute_all(&self, effects: Vec<Effect>) -> Result<Vec<Event>, RuntimeError> {
        let mut events = Vec::new();
        for effect in effects {
            events.extend(self.execute(effect)?);
        }
        Ok(events)
    }

    /// Fill ids and timestamps the handler left blank.
    fn finalize(&self, mut event: Event) -> Event {
        if event.event_id == EventId::NONE {
            event.event_id = EventId(self.ids.next());
        }
        if event.timestamp == 0 {
            event.timestamp = self.clock.epoch_ms();
        }
        event
    }

    fn enqueue_event(&self, spec: JobSpec) -> Event {
        let now = self.clock.epoch_ms();
        let job = spec.into_job(QueueId(self.ids.next()), now);
        self.finalize(Event::infra(EventKind::QueueEnqueued { job }))
    }
}

/// A spec whose dedup key already has a row is a replayed decision: WAL
/// recovery re-runs handlers, and the row their effect created is already
/// in the state.
fn is_duplicate(state: &MaterializedState, spec: &JobSpec) -> bool {
    let Some(key) = &spec.meta.dedup_key else { return false };
    state
        .queue
        .values()
        .any(|job| job.meta.dedup_key.as_deref() == Some(key.as_str()))
}
