// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Liveness registry rows for servers, worker pools and brokers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// What kind of component a registry row describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeKind {
    ServerApi,
    WorkerPool,
    Broker,
}

impl std::fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RuntimeKind::ServerApi => "server_api",
            RuntimeKind::WorkerPool => "worker_pool",
            RuntimeKind::Broker => "broker",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeStatus {
    Online,
    Offline,
}

/// One live (or recently live) component. Unique per `(kind, name)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeComponent {
    pub runtime_id: String,
    pub name: String,
    pub kind: RuntimeKind,
    pub uri: String,
    pub status: RuntimeStatus,
    /// Tool kinds a worker pool can execute. Empty means "anything".
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub capacity: u32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Last heartbeat, epoch ms.
    pub heartbeat: u64,
    /// Free-form process facts: pid, hostname, runtime type.
    #[serde(default)]
    pub runtime: Value,
    pub created_at: u64,
    pub updated_at: u64,
}

impl RuntimeComponent {
    /// Registry map key.
    pub fn key(&self) -> String {
        component_key(self.kind, &self.name)
    }

    pub fn is_stale(&self, now: u64, offline_after_ms: u64) -> bool {
        self.status == RuntimeStatus::Online
            && self.heartbeat.saturating_add(offline_after_ms) < now
    }
}

/// Canonical `(kind, name)` key used by the registry map.
pub fn component_key(kind: RuntimeKind, name: &str) -> String {
    format!("{kind}/{name}")
}
