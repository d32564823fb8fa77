// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker-pool and runtime registry types.

use baton_core::RuntimeKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// `POST /worker/pool/register` and `POST /runtime/register`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    /// Process facts: runtime type, pid, hostname.
    #[serde(default)]
    pub runtime: Value,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub capacity: u32,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// Only meaningful on `/runtime/register`; worker-pool registration
    /// fixes the kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<RuntimeKind>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub worker_id: String,
}

/// `POST /worker/pool/heartbeat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub name: String,
    /// Enough payload to auto-recreate the row when the server restarted
    /// and lost the registration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub ok: bool,
}

/// `DELETE /worker/pool/deregister` and `DELETE /runtime/deregister`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeregisterRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<RuntimeKind>,
}

/// `POST /metrics/report` — accepted and logged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsReport {
    pub name: String,
    #[serde(default)]
    pub metrics: Value,
}
