// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::event::{Event, EventKind};
use crate::id::{CatalogId, EventId, ExecutionId, QueueId};
use crate::queue::{JobAction, JobSpec};
use serde_json::{json, Value};

/// Sequential id source for tests that want readable ids.
pub struct SeqIds(std::sync::atomic::AtomicU64);

impl SeqIds {
    pub fn new(start: u64) -> Self {
        Self(std::sync::atomic::AtomicU64::new(start))
    }
}

impl Default for SeqIds {
    fn default() -> Self {
        Self::new(1)
    }
}

impl crate::id::IdGen for SeqIds {
    fn next(&self) -> u64 {
        self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed)
    }
}

// ── Event factory functions ─────────────────────────────────────────────────

pub fn execution_start_event(execution: u64, event: u64, workload: Value) -> Event {
    let mut e = Event::new(
        ExecutionId(execution),
        EventKind::ExecutionStart {
            catalog_id: CatalogId(1),
            path: "test/playbook".into(),
            workload,
        },
    );
    e.event_id = EventId(event);
    e.timestamp = 1_000_000;
    e
}

pub fn action_completed_event(
    execution: u64,
    event: u64,
    step: &str,
    queue_id: u64,
    result: Value,
) -> Event {
    let mut e = Event::new(
        ExecutionId(execution),
        EventKind::ActionCompleted {
            step: step.into(),
            queue_id: QueueId(queue_id),
            result,
        },
    )
    .with_node(step);
    e.event_id = EventId(event);
    e.timestamp = 1_000_000;
    e
}

pub fn action_failed_event(execution: u64, event: u64, step: &str, queue_id: u64, error: &str) -> Event {
    let mut e = Event::new(
        ExecutionId(execution),
        EventKind::ActionFailed {
            step: step.into(),
            queue_id: QueueId(queue_id),
            error: error.into(),
            reason: None,
            will_retry: false,
            stack_available: false,
        },
    )
    .with_node(step);
    e.event_id = EventId(event);
    e.timestamp = 1_000_000;
    e
}

// ── Job factory functions ───────────────────────────────────────────────────

pub fn http_action(url: &str) -> JobAction {
    JobAction {
        kind: "http".into(),
        spec: json!({"method": "GET", "url": url}),
        timeout_secs: None,
        context: json!({}),
    }
}

pub fn job_spec(execution: u64, node: &str) -> JobSpec {
    JobSpec::new(ExecutionId(execution), node, http_action("http://example.test"))
}
