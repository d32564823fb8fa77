// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event records: the append-only facts every projection is built from.
//!
//! An event is an envelope (ids, linkage, timing) plus a kind tagged with
//! the wire-visible `event_type`. Execution-scoped kinds form an execution's
//! public log; queue/registry/catalog kinds exist only to make durable state
//! reconstructible from the same WAL.

use crate::execution::ExecutionStatus;
use crate::id::{CatalogId, EventId, ExecutionId, QueueId};
use crate::queue::{LoopMode, QueueJob};
use crate::registry::{RuntimeComponent, RuntimeKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One immutable event. Correction is by emitting a new event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Filled by the engine when the emitter leaves it unset.
    #[serde(default)]
    pub event_id: EventId,
    /// Owning execution; [`ExecutionId::NONE`] for registry/catalog events.
    pub execution_id: ExecutionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_event_id: Option<EventId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_execution_id: Option<ExecutionId>,
    /// Step id this event concerns, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    /// Epoch milliseconds; filled by the engine when zero.
    #[serde(default)]
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Sanitized snapshot of execution state at emission time (workers
    /// attach this to the events they report).
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub context: Value,
    /// Client-side idempotence key; duplicates return the original event id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedup_key: Option<String>,
    #[serde(flatten)]
    pub kind: EventKind,
}

/// Per-iteration failure inside an iterator join result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationError {
    pub index: usize,
    pub message: String,
}

/// Tagged event payloads. The tag value is the wire `event_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum EventKind {
    // -- execution lifecycle --
    ExecutionStart {
        catalog_id: CatalogId,
        path: String,
        #[serde(default)]
        workload: Value,
    },

    ExecutionComplete {
        status: ExecutionStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    ExecutionAbort {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    ExecutionPaused,

    ExecutionResumed,

    // -- step lifecycle --
    StepStarted {
        step: String,
        /// Rendered `bind` assignments hoisted to execution scope.
        #[serde(default, skip_serializing_if = "Value::is_null")]
        bound: Value,
    },

    /// Edge payload delivered into a target step's call buffer (internal,
    /// keeps call buffers reconstructible from the log).
    CallDelivered {
        step: String,
        args: Value,
    },

    StepCompleted {
        step: String,
        #[serde(default)]
        result: Value,
    },

    StepFailed {
        step: String,
        error: String,
    },

    // -- actions (worker-reported) --
    ActionStarted {
        step: String,
        queue_id: QueueId,
        attempt: u32,
    },

    ActionCompleted {
        step: String,
        queue_id: QueueId,
        #[serde(default)]
        result: Value,
    },

    ActionFailed {
        step: String,
        queue_id: QueueId,
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        #[serde(default)]
        will_retry: bool,
        #[serde(default)]
        stack_available: bool,
    },

    // -- iterators (engine-synthesized) --
    IteratorStarted {
        step: String,
        total: usize,
        mode: LoopMode,
        concurrency: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        chunk_size: Option<usize>,
    },

    IterationStarted {
        step: String,
        index: usize,
    },

    IterationCompleted {
        step: String,
        index: usize,
        #[serde(default)]
        result: Value,
    },

    IterationFailed {
        step: String,
        index: usize,
        error: String,
    },

    IteratorCompleted {
        step: String,
        /// Aggregated child results in input order.
        items: Vec<Value>,
        count: usize,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        errors: Vec<IterationError>,
    },

    // -- retry sequences --
    RetrySequenceCompleted {
        step: String,
        attempts: u32,
        aggregated_result: Value,
    },

    // -- liveness (internal) --
    WorkerHeartbeat {
        name: String,
    },

    // -- queue lifecycle (durability only) --
    QueueEnqueued {
        job: QueueJob,
    },

    QueueLeased {
        queue_id: QueueId,
        worker_id: String,
        lease_until: u64,
    },

    QueueLeaseRenewed {
        queue_id: QueueId,
        lease_until: u64,
    },

    QueueAcked {
        queue_id: QueueId,
        #[serde(default)]
        result: Value,
    },

    /// Failure absorbed by a retry: the row is superseded, never dead.
    QueueFailed {
        queue_id: QueueId,
        error: String,
    },

    QueueDead {
        queue_id: QueueId,
        error: String,
    },

    /// Lease expiry: row returned to `queued`, attempts bumped.
    QueueRequeued {
        queue_id: QueueId,
    },

    /// Deferred row made available (iterator window advance / backoff expiry).
    QueueAdvanced {
        queue_id: QueueId,
        available_at: u64,
    },

    // -- runtime registry (durability only) --
    RuntimeRegistered {
        component: RuntimeComponent,
    },

    RuntimeOffline {
        kind: RuntimeKind,
        name: String,
    },

    RuntimeDeregistered {
        kind: RuntimeKind,
        name: String,
    },

    // -- catalog --
    PlaybookRegistered {
        catalog_id: CatalogId,
        path: String,
        version: String,
        content_hash: String,
        document: Value,
    },
}

impl Event {
    /// Build an execution-scoped event with ids/timestamp left for the
    /// emitter to fill.
    pub fn new(execution_id: ExecutionId, kind: EventKind) -> Self {
        Self {
            event_id: EventId::NONE,
            execution_id,
            parent_event_id: None,
            parent_execution_id: None,
            node_id: None,
            timestamp: 0,
            duration_ms: None,
            context: Value::Null,
            dedup_key: None,
            kind,
        }
    }

    /// Build an infrastructure event (queue/registry/catalog) that is not
    /// owned by any execution.
    pub fn infra(kind: EventKind) -> Self {
        Self::new(ExecutionId::NONE, kind)
    }

    pub fn with_node(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    pub fn with_parent(mut self, parent: EventId) -> Self {
        self.parent_event_id = Some(parent);
        self
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }

    /// Wire `event_type` string.
    pub fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    /// Whether this event belongs to an execution's public log.
    pub fn is_execution_scoped(&self) -> bool {
        self.kind.is_execution_scoped()
    }

    /// One-line summary for logs.
    pub fn log_summary(&self) -> String {
        let mut s = format!("{} exec={}", self.event_type(), self.execution_id);
        if let Some(node) = &self.node_id {
            s.push_str(&format!(" node={node}"));
        }
        s
    }
}

impl EventKind {
    pub fn event_type(&self) -> &'static str {
        match self {
            EventKind::ExecutionStart { .. } => "execution_start",
            EventKind::ExecutionComplete { .. } => "execution_complete",
            EventKind::ExecutionAbort { .. } => "execution_abort",
            EventKind::ExecutionPaused => "execution_paused",
            EventKind::ExecutionResumed => "execution_resumed",
            EventKind::StepStarted { .. } => "step_started",
            EventKind::CallDelivered { .. } => "call_delivered",
            EventKind::StepCompleted { .. } => "step_completed",
            EventKind::StepFailed { .. } => "step_failed",
            EventKind::ActionStarted { .. } => "action_started",
            EventKind::ActionCompleted { .. } => "action_completed",
            EventKind::ActionFailed { .. } => "action_failed",
            EventKind::IteratorStarted { .. } => "iterator_started",
            EventKind::IterationStarted { .. } => "iteration_started",
            EventKind::IterationCompleted { .. } => "iteration_completed",
            EventKind::IterationFailed { .. } => "iteration_failed",
            EventKind::IteratorCompleted { .. } => "iterator_completed",
            EventKind::RetrySequenceCompleted { .. } => "retry_sequence_completed",
            EventKind::WorkerHeartbeat { .. } => "worker_heartbeat",
            EventKind::QueueEnqueued { .. } => "queue_enqueued",
            EventKind::QueueLeased { .. } => "queue_leased",
            EventKind::QueueLeaseRenewed { .. } => "queue_lease_renewed",
            EventKind::QueueAcked { .. } => "queue_acked",
            EventKind::QueueFailed { .. } => "queue_failed",
            EventKind::QueueDead { .. } => "queue_dead",
            EventKind::QueueRequeued { .. } => "queue_requeued",
            EventKind::QueueAdvanced { .. } => "queue_advanced",
            EventKind::RuntimeRegistered { .. } => "runtime_registered",
            EventKind::RuntimeOffline { .. } => "runtime_offline",
            EventKind::RuntimeDeregistered { .. } => "runtime_deregistered",
            EventKind::PlaybookRegistered { .. } => "playbook_registered",
        }
    }

    pub fn is_execution_scoped(&self) -> bool {
        !matches!(
            self,
            EventKind::QueueEnqueued { .. }
                | EventKind::QueueLeased { .. }
                | EventKind::QueueLeaseRenewed { .. }
                | EventKind::QueueAcked { .. }
                | EventKind::QueueFailed { .. }
                | EventKind::QueueDead { .. }
                | EventKind::QueueRequeued { .. }
                | EventKind::QueueAdvanced { .. }
                | EventKind::RuntimeRegistered { .. }
                | EventKind::RuntimeOffline { .. }
                | EventKind::RuntimeDeregistered { .. }
                | EventKind::PlaybookRegistered { .. }
                | EventKind::WorkerHeartbeat { .. }
        )
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
