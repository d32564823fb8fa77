// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution run/status and event emission types.

use baton_core::{EventId, ExecutionId, ExecutionStatus, Fault, StepPhase};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `POST /executions/run`.
///
/// Identifies the playbook by `catalog_id`, by `path` (+ optional
/// `version`), or inline via `playbook`. Legacy clients send `playbook_id`
/// for the path, `input_payload` for parameters, `execution_type` for the
/// type, and `start_time` for the timestamp.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_id: Option<String>,
    #[serde(default, alias = "playbook_id", skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Workload parameters merged over the playbook's declared defaults.
    #[serde(default, alias = "input_payload", skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Value>,
    #[serde(
        default,
        rename = "type",
        alias = "execution_type",
        skip_serializing_if = "Option::is_none"
    )]
    pub type_: Option<String>,
    #[serde(default, alias = "start_time", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Inline playbook document, registered on the fly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playbook: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_execution_id: Option<String>,
}

/// `POST /executions/run` response. IDs are strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResponse {
    pub execution_id: ExecutionId,
    pub catalog_id: String,
    pub path: String,
    pub status: ExecutionStatus,
    pub timestamp: u64,
}

/// `POST /event/emit` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmitAck {
    pub event_id: EventId,
    pub ack: bool,
    /// True when the event was a recognized duplicate and `event_id` is the
    /// original's.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub duplicate: bool,
}

/// Per-step line in the execution summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStepSummary {
    pub step: String,
    pub phase: StepPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<u64>,
}

/// `GET /execution/{id}` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub execution_id: ExecutionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_execution_id: Option<ExecutionId>,
    pub catalog_id: String,
    pub path: String,
    pub status: ExecutionStatus,
    pub start_time: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub steps: Vec<ExecutionStepSummary>,
    pub event_count: usize,
}

/// Error payload for every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: Fault,
}

#[cfg(test)]
#[path = "execution_tests.rs"]
mod tests;
