// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The tool executor seam.
//!
//! Plugin executors (http, postgres, duckdb, python, ...) implement
//! [`ToolExecutor`] and register by kind. The pool stays agnostic to
//! executor internals.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// What a tool execution can report back.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{message}")]
    Failed {
        message: String,
        /// Stack trace kept worker-side; events only flag its existence.
        stack: Option<String>,
    },

    #[error("tool timed out")]
    Timeout,

    #[error("cancelled")]
    Cancelled,
}

impl ToolError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed { message: message.into(), stack: None }
    }

    /// The `reason` string carried on `action_failed` events.
    pub fn reason(&self) -> Option<&'static str> {
        match self {
            ToolError::Timeout => Some("timeout"),
            ToolError::Cancelled => Some("cancelled"),
            ToolError::Failed { .. } => None,
        }
    }
}

/// Execution-side facts handed to a tool along with its spec.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub execution_id: baton_core::ExecutionId,
    pub queue_id: baton_core::QueueId,
    pub node_id: String,
    pub attempt: u32,
    /// Full render context (workload, vars, step results, call buffer).
    /// Events leaving the worker carry the sanitized snapshot instead.
    pub context: Value,
}

/// A tool executor: one kind, one async entry point.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, spec: &Value, ctx: &CallContext) -> Result<Value, ToolError>;
}

/// `kind → executor` table.
#[derive(Default)]
pub struct ToolRegistry {
    executors: HashMap<String, Arc<dyn ToolExecutor>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: impl Into<String>, executor: Arc<dyn ToolExecutor>) {
        self.executors.insert(kind.into(), executor);
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn ToolExecutor>> {
        self.executors.get(kind).cloned()
    }

    /// Registered kinds, advertised as lease capabilities.
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = self.executors.keys().cloned().collect();
        kinds.sort();
        kinds
    }
}

/// Development executor: echoes its spec back as the result.
pub struct NoopExecutor;

#[async_trait]
impl ToolExecutor for NoopExecutor {
    async fn execute(&self, spec: &Value, _ctx: &CallContext) -> Result<Value, ToolError> {
        Ok(spec.clone())
    }
}

#[cfg(test)]
#[path = "tools_tests.rs"]
mod tests;
