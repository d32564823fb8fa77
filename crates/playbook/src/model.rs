// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed playbook document model.

use crate::iterate::LoopSpec;
use crate::validate::{validate, PlaybookError};
use baton_core::retry::RetryPolicy;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A parsed playbook: a DAG of typed steps plus declared workload defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playbook {
    #[serde(default)]
    pub path: String,
    #[serde(default = "default_version")]
    pub version: String,
    /// Default parameters, overridden by the execution request's workload.
    #[serde(default)]
    pub workload: Value,
    pub steps: Vec<StepDef>,
}

fn default_version() -> String {
    "1".to_string()
}

impl Playbook {
    /// Parse and validate a playbook document.
    pub fn from_value(document: Value) -> Result<Self, PlaybookError> {
        let playbook: Playbook = serde_json::from_value(document)
            .map_err(|e| PlaybookError::Malformed(e.to_string()))?;
        validate(&playbook)?;
        Ok(playbook)
    }

    pub fn get_step(&self, name: &str) -> Option<&StepDef> {
        self.steps.iter().find(|s| s.step == name)
    }

    /// The entry step: first in declaration order.
    pub fn entry_step(&self) -> Option<&StepDef> {
        self.steps.first()
    }
}

/// What a failed step does to its execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Unrecovered failure fails the execution.
    #[default]
    Fail,
    /// Record the failure, keep routing.
    Continue,
}

/// One node of the playbook DAG.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDef {
    pub step: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    /// Dispatch gate, evaluated with the step's call buffer in scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
    /// Variable assignments hoisted to execution scope before the tool runs.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub bind: IndexMap<String, Value>,
    #[serde(
        default,
        rename = "loop",
        alias = "iterator",
        skip_serializing_if = "Option::is_none"
    )]
    pub loop_: Option<LoopSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<ToolDef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub next: Vec<NextItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub case: Vec<CaseRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,
    #[serde(default)]
    pub on_error: ErrorPolicy,
}

/// Tool invocation: executor kind plus its spec, rendered at dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDef {
    /// http | postgres | duckdb | python | workbook | playbooks | secrets | save
    pub kind: String,
    #[serde(default)]
    pub spec: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
}

/// Routing item in a `next` array: either a single edge or a fan.
///
/// Scanned in declaration order with edge-before-fan-before-else precedence
/// applied by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NextItem {
    /// `{when, then: [{step, args}...]}` — dispatch all targets when truthy.
    Fan { when: String, then: Vec<FanTarget> },
    /// `{step, when?, args?}` — dispatch one target.
    Edge {
        step: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        when: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        args: Option<Value>,
    },
}

/// A fan/case target with an optional edge payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FanTarget {
    pub step: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Value>,
}

/// Event-scoped routing rule, consulted before the default `next` array when
/// the named event fires for this step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRule {
    /// Event type the rule listens to.
    #[serde(default = "default_case_event")]
    pub on: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
    pub then: Vec<FanTarget>,
}

fn default_case_event() -> String {
    "action_completed".to_string()
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
