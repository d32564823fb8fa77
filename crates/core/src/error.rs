// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared error taxonomy.
//!
//! Every layer maps its failures into one of these classes; the HTTP surface
//! and the retry machinery key off the class, not the message.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length of an error message surfaced through events and the API.
pub const ERROR_MESSAGE_LIMIT: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "class", content = "message", rename_all = "snake_case")]
pub enum Fault {
    /// Malformed event or step definition. Never retried.
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown execution, step, or queue row.
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate dedup key or lease ownership violation.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Transient storage or network failure; caller should back off and retry.
    #[error("retriable: {0}")]
    Retriable(String),

    /// Tool-reported failure; subject to `retry.on_error`.
    #[error("tool error: {0}")]
    Tool(String),

    /// Tool exceeded its declared timeout; subject to retry policy.
    #[error("timeout: {0}")]
    Timeout(String),

    /// Cooperative cancellation.
    #[error("cancelled: {0}")]
    Cancelled(String),

    /// Invariant violation. Logged at error level, surfaced to the caller,
    /// never crashes the process.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl Fault {
    pub fn is_retriable(&self) -> bool {
        matches!(self, Fault::Retriable(_) | Fault::Timeout(_) | Fault::Tool(_))
    }

    /// The `reason` string attached to `action_failed` events, where one
    /// exists for the class.
    pub fn reason(&self) -> Option<&'static str> {
        match self {
            Fault::Timeout(_) => Some("timeout"),
            Fault::Cancelled(_) => Some("cancelled"),
            _ => None,
        }
    }
}

/// Truncate an error message to [`ERROR_MESSAGE_LIMIT`] characters, marking
/// the cut.
pub fn truncate_error(message: &str) -> String {
    if message.chars().count() <= ERROR_MESSAGE_LIMIT {
        return message.to_string();
    }
    let cut: String = message.chars().take(ERROR_MESSAGE_LIMIT).collect();
    format!("{cut}… [truncated]")
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
