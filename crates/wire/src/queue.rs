// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue lease/ack/fail types.

use baton_core::QueueJob;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `POST /queue/lease`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseRequest {
    pub worker_id: String,
    /// Maximum jobs to lease in one call.
    #[serde(default = "default_max")]
    pub max: u32,
    #[serde(default = "default_lease_seconds")]
    pub lease_duration_seconds: u64,
    /// Tool kinds this worker can execute. Empty means "anything".
    #[serde(default)]
    pub capability_filter: Vec<String>,
    #[serde(default)]
    pub labels: std::collections::BTreeMap<String, String>,
}

fn default_max() -> u32 {
    1
}

fn default_lease_seconds() -> u64 {
    60
}

/// `POST /queue/lease` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseResponse {
    pub jobs: Vec<QueueJob>,
}

/// `POST /queue/{id}/ack`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AckRequest {
    pub worker_id: String,
    #[serde(default)]
    pub result: Value,
}

/// `POST /queue/{id}/fail`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FailRequest {
    pub worker_id: String,
    #[serde(default)]
    pub error: Option<String>,
    /// Request a queue-level retry of the same row (infrastructure failures;
    /// tool failures go through the engine's retry policy instead).
    #[serde(default)]
    pub retry: Option<bool>,
    #[serde(default)]
    pub retry_delay_seconds: Option<u64>,
    /// Permanently dead regardless of remaining attempts.
    #[serde(default)]
    pub permanent: Option<bool>,
}

/// `POST /queue/{id}/renew`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenewRequest {
    pub worker_id: String,
    #[serde(default = "default_lease_seconds")]
    pub lease_duration_seconds: u64,
}
