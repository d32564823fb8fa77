// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution records and the execution status machine.

use crate::id::{CatalogId, ExecutionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Aggregate status of one playbook run.
///
/// Derived from events; the stored value is a cache of the derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecutionStatus {
    Pending,
    Started,
    Running,
    Paused,
    Failed,
    Completed,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Failed | ExecutionStatus::Completed)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExecutionStatus::Pending => "PENDING",
            ExecutionStatus::Started => "STARTED",
            ExecutionStatus::Running => "RUNNING",
            ExecutionStatus::Paused => "PAUSED",
            ExecutionStatus::Failed => "FAILED",
            ExecutionStatus::Completed => "COMPLETED",
        };
        write!(f, "{s}")
    }
}

/// One run of a playbook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub execution_id: ExecutionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_execution_id: Option<ExecutionId>,
    /// Parent step this sub-playbook execution reports back to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_step: Option<String>,
    pub catalog_id: CatalogId,
    pub path: String,
    pub status: ExecutionStatus,
    /// Epoch milliseconds of the `execution_start` event.
    pub start_time: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<u64>,
    /// User-supplied parameters, merged over the playbook's declared workload.
    #[serde(default)]
    pub workload: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
