// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage-owned record types.

use baton_core::CatalogId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One registered playbook version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybookEntry {
    pub catalog_id: CatalogId,
    pub path: String,
    pub version: String,
    /// sha-256 of the canonical document, for idempotent registration.
    pub content_hash: String,
    pub document: Value,
    pub registered_at: u64,
}

impl PlaybookEntry {
    /// Catalog path index key.
    pub fn path_key(path: &str, version: &str) -> String {
        format!("{path}@{version}")
    }
}
