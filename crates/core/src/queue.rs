// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable queue job types.
//!
//! Queue rows transition `queued → leased → done | failed | dead`. The
//! terminal states are never resurrected: a retry is a new row that links
//! back to its predecessor through `meta.retry.parent_event_id`.

use crate::id::{EventId, ExecutionId, QueueId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Placeholder `available_at` for jobs held back by an iterator concurrency
/// cap. Advanced to "now" as in-flight children complete. 2100-01-01.
pub const DEFERRED_AVAILABLE_AT: u64 = 4_102_444_800_000;

/// Queue row status machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Queued,
    Leased,
    Done,
    /// Failure absorbed by a retry decision — the row is superseded by a
    /// fresh one and will never run again.
    Failed,
    Dead,
}

impl QueueStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, QueueStatus::Done | QueueStatus::Failed | QueueStatus::Dead)
    }
}

/// Iterator execution mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopMode {
    #[default]
    Sequential,
    Async,
}

/// The work a leased job asks a worker to perform: a tool invocation with
/// fully rendered inputs and a sanitizable context snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobAction {
    /// Tool kind routed through the worker's executor registry
    /// (http, postgres, duckdb, python, ...).
    pub kind: String,
    /// Rendered tool spec.
    pub spec: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Execution context snapshot available to the tool.
    #[serde(default)]
    pub context: Value,
}

/// Why a retry row exists and where it chains from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryKind {
    OnError,
    OnSuccess,
}

/// Retry linkage carried by retry/continuation rows and their events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryMeta {
    pub attempt_number: u32,
    /// Event that triggered this attempt (the previous attempt's terminal
    /// event).
    pub parent_event_id: EventId,
    pub kind: RetryKind,
}

/// Iterator linkage carried by iteration child rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IteratorMeta {
    /// The iterator step this child belongs to.
    pub step: String,
    pub index: usize,
    pub total: usize,
    /// Name the item is bound to in the child scope.
    pub element: String,
    pub mode: LoopMode,
}

/// Job metadata: iterator/retry linkage plus scheduling labels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iterator: Option<IteratorMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryMeta>,
    /// Placement labels that must be a subset of the leasing worker's labels.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Caller-supplied idempotence key, unique per execution+node+attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedup_key: Option<String>,
}

/// A durable queue row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueJob {
    pub queue_id: QueueId,
    pub execution_id: ExecutionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_execution_id: Option<ExecutionId>,
    /// Step id this job executes.
    pub node_id: String,
    pub action: JobAction,
    pub status: QueueStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    /// Not-before timestamp (epoch ms) for backoff and scheduling.
    pub available_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_until: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,
    #[serde(default)]
    pub meta: JobMeta,
}

impl QueueJob {
    /// Whether the row can be handed to a worker at `now`.
    pub fn leasable_at(&self, now: u64) -> bool {
        self.status == QueueStatus::Queued && self.available_at <= now
    }

    /// Whether a held lease has expired at `now`.
    pub fn lease_expired(&self, now: u64) -> bool {
        self.status == QueueStatus::Leased
            && self.lease_until.map(|until| until < now).unwrap_or(true)
    }
}

/// A job waiting for a queue id: everything the engine decides, nothing the
/// queue assigns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub execution_id: ExecutionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_execution_id: Option<ExecutionId>,
    pub node_id: String,
    pub action: JobAction,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// `None` means available immediately.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_at: Option<u64>,
    #[serde(default)]
    pub meta: JobMeta,
}

fn default_max_attempts() -> u32 {
    3
}

impl JobSpec {
    pub fn new(execution_id: ExecutionId, node_id: impl Into<String>, action: JobAction) -> Self {
        Self {
            execution_id,
            parent_execution_id: None,
            node_id: node_id.into(),
            action,
            max_attempts: default_max_attempts(),
            available_at: None,
            meta: JobMeta::default(),
        }
    }

    /// Materialize the row the queue will store.
    pub fn into_job(self, queue_id: QueueId, now: u64) -> QueueJob {
        QueueJob {
            queue_id,
            execution_id: self.execution_id,
            parent_execution_id: self.parent_execution_id,
            node_id: self.node_id,
            action: self.action,
            status: QueueStatus::Queued,
            attempts: 0,
            max_attempts: self.max_attempts,
            available_at: self.available_at.unwrap_or(now),
            lease_until: None,
            worker_id: None,
            meta: self.meta,
        }
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
