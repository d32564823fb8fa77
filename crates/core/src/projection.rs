// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-execution projections: derived state rebuilt from the event log.
//!
//! Projections are authoritative inside the owning server process and must
//! always be reconstructible by replaying the execution's events.

use crate::event::IterationError;
use crate::id::EventId;
use crate::queue::LoopMode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Step instance state machine:
///
/// ```text
/// (unvisited) → PARKED ⇄ READY → LEASED → (RETRY_PENDING ↔ LEASED)* → DONE | DEAD
/// ```
///
/// Unvisited steps have no entry in the projection map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepPhase {
    /// Received call payloads but its `when` gate is not yet satisfied.
    Parked,
    /// Enqueued and waiting for a worker.
    Ready,
    Leased,
    /// Failed and waiting out a retry backoff.
    RetryPending,
    Done,
    Dead,
}

impl StepPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepPhase::Done | StepPhase::Dead)
    }

    /// Phases that count as "work outstanding" for execution completion.
    pub fn is_active(&self) -> bool {
        matches!(self, StepPhase::Ready | StepPhase::Leased | StepPhase::RetryPending)
    }
}

/// Iterator join bookkeeping for one iterator step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopProgress {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub mode: LoopMode,
    pub concurrency: u32,
    /// Child results keyed by input index.
    #[serde(default)]
    pub results: BTreeMap<usize, Value>,
    #[serde(default)]
    pub errors: Vec<IterationError>,
    /// Join-emission guard: flipped exactly once.
    #[serde(default)]
    emitted: bool,
}

impl LoopProgress {
    pub fn new(total: usize, mode: LoopMode, concurrency: u32) -> Self {
        Self {
            total,
            completed: 0,
            failed: 0,
            mode,
            concurrency,
            results: BTreeMap::new(),
            errors: Vec::new(),
            emitted: false,
        }
    }

    /// Record a successful iteration. Returns false for duplicates.
    pub fn record_success(&mut self, index: usize, result: Value) -> bool {
        if self.results.contains_key(&index) || self.errors.iter().any(|e| e.index == index) {
            return false;
        }
        self.results.insert(index, result);
        self.completed += 1;
        true
    }

    /// Record a failed iteration. Returns false for duplicates.
    pub fn record_failure(&mut self, index: usize, message: String) -> bool {
        if self.results.contains_key(&index) || self.errors.iter().any(|e| e.index == index) {
            return false;
        }
        self.errors.push(IterationError { index, message });
        self.failed += 1;
        true
    }

    pub fn is_settled(&self) -> bool {
        self.completed + self.failed == self.total
    }

    /// Whether the join has already been emitted.
    pub fn join_emitted(&self) -> bool {
        self.emitted
    }

    /// Compare-and-set the join emission flag. True exactly once, and only
    /// when all children have settled.
    pub fn try_emit(&mut self) -> bool {
        if self.emitted || !self.is_settled() {
            return false;
        }
        self.emitted = true;
        true
    }

    /// Aggregated results in index order. Failed indices contribute nulls so
    /// positions stay aligned with the input collection.
    pub fn items_in_order(&self) -> Vec<Value> {
        (0..self.total)
            .map(|i| self.results.get(&i).cloned().unwrap_or(Value::Null))
            .collect()
    }
}

/// One attempt inside an `on_success` continuation chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainAttempt {
    pub event_id: EventId,
    /// Queue row that produced this attempt; re-runs of the same row after
    /// lease loss collapse into one attempt.
    pub queue_id: crate::id::QueueId,
    pub result: Value,
}

/// Derived state of one step instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepState {
    pub phase: StepPhase,
    /// Final result once DONE (iterator aggregate / chain aggregate / last
    /// action result).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Call buffer: payloads deep-merged from predecessor edges, visible to
    /// this step as the `call.*` namespace.
    #[serde(default)]
    pub call: Value,
    /// Action attempts observed so far (on_error sequence position).
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_progress: Option<LoopProgress>,
    /// `on_success` chain attempts in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chain: Vec<ChainAttempt>,
}

impl StepState {
    pub fn parked() -> Self {
        Self::with_phase(StepPhase::Parked)
    }

    pub fn with_phase(phase: StepPhase) -> Self {
        Self {
            phase,
            result: None,
            error: None,
            call: Value::Object(serde_json::Map::new()),
            attempts: 0,
            started_at: None,
            finished_at: None,
            loop_progress: None,
            chain: Vec::new(),
        }
    }

    pub fn is_done(&self) -> bool {
        self.phase == StepPhase::Done
    }
}

/// Everything the engine derives for one execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionProjection {
    /// Per-step derived state. Absent key = unvisited.
    #[serde(default)]
    pub steps: HashMap<String, StepState>,
    /// Variables hoisted to execution scope via `bind`.
    #[serde(default)]
    pub vars: Value,
    /// Event ids already applied, for at-most-once ingestion.
    #[serde(default)]
    pub applied: std::collections::BTreeSet<EventId>,
}

impl ExecutionProjection {
    pub fn new() -> Self {
        Self {
            steps: HashMap::new(),
            vars: Value::Object(serde_json::Map::new()),
            applied: std::collections::BTreeSet::new(),
        }
    }

    pub fn step(&self, name: &str) -> Option<&StepState> {
        self.steps.get(name)
    }

    pub fn step_mut(&mut self, name: &str) -> &mut StepState {
        self.steps.entry(name.to_string()).or_insert_with(StepState::parked)
    }

    /// Mark an event applied; false if it was already seen.
    pub fn mark_applied(&mut self, id: EventId) -> bool {
        if id.is_none() {
            return true;
        }
        self.applied.insert(id)
    }

    /// Steps with outstanding work (ready/leased/retry-pending).
    pub fn has_active_steps(&self) -> bool {
        self.steps.values().any(|s| s.phase.is_active())
    }

    /// Completed step results keyed by step name, for the `steps.*` template
    /// namespace.
    pub fn step_results(&self) -> Value {
        let mut map = serde_json::Map::new();
        for (name, state) in &self.steps {
            if let Some(result) = &state.result {
                map.insert(name.clone(), result.clone());
            }
        }
        Value::Object(map)
    }
}

#[cfg(test)]
#[path = "projection_tests.rs"]
mod tests;
