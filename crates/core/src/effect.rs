// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Effects represent the writes engine handlers want performed.

use crate::event::Event;
use crate::queue::JobSpec;
use serde::{Deserialize, Serialize};

/// Effects produced by runtime handlers and executed by the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Effect {
    /// Persist an event and apply it to the materialized state.
    Emit { event: Event },

    /// Insert one queue row (the executor assigns the queue id).
    Enqueue { spec: JobSpec },

    /// Insert several queue rows atomically (iterator expansion).
    EnqueueBatch { specs: Vec<JobSpec> },
}

impl Effect {
    /// Effect name for log spans.
    pub fn name(&self) -> &'static str {
        match self {
            Effect::Emit { .. } => "emit",
            Effect::Enqueue { .. } => "enqueue",
            Effect::EnqueueBatch { .. } => "enqueue_batch",
        }
    }

    /// Key-value pairs for structured logging.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        match self {
            Effect::Emit { event } => vec![("event", event.log_summary())],
            Effect::Enqueue { spec } => vec![
                ("execution", spec.execution_id.to_string()),
                ("node", spec.node_id.clone()),
                ("kind", spec.action.kind.clone()),
            ],
            Effect::EnqueueBatch { specs } => vec![
                ("jobs", specs.len().to_string()),
                (
                    "execution",
                    specs.first().map(|s| s.execution_id.to_string()).unwrap_or_default(),
                ),
            ],
        }
    }

    /// Whether to log both start and completion, or a single line.
    pub fn verbose(&self) -> bool {
        !matches!(self, Effect::Emit { .. })
    }
}
