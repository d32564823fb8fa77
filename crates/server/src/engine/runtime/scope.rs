// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Template scope assembly.
//!
//! Workload keys and bound vars are spread at the top level for terse
//! expressions, and also namespaced (`workload.*`, `vars.*`) for collision
//! safety. Step results live under `steps.*`, edge payloads under `call.*`.

use baton_core::{ExecutionProjection, ExecutionRecord};
use serde_json::{Map, Value};

pub fn build_scope(
    record: &ExecutionRecord,
    projection: &ExecutionProjection,
    call: &Value,
) -> Value {
    let mut scope = Map::new();

    if let Value::Object(workload) = &record.workload {
        for (k, v) in workload {
            scope.insert(k.clone(), v.clone());
        }
    }
    if let Value::Object(vars) = &projection.vars {
        for (k, v) in vars {
            scope.insert(k.clone(), v.clone());
        }
    }

    scope.insert("workload".into(), record.workload.clone());
    scope.insert("vars".into(), projection.vars.clone());
    scope.insert("steps".into(), projection.step_results());
    // Per-step phases for the worker's `_step_results` summaries; the
    // sanitizer consumes this key, it never leaves the process raw.
    let mut statuses = Map::new();
    for (name, step) in &projection.steps {
        if let Ok(phase) = serde_json::to_value(step.phase) {
            statuses.insert(name.clone(), phase);
        }
    }
    scope.insert("_step_status".into(), Value::Object(statuses));
    scope.insert(
        "call".into(),
        if call.is_object() { call.clone() } else { Value::Object(Map::new()) },
    );
    scope.insert("execution_id".into(), Value::String(record.execution_id.to_string()));
    scope.insert("path".into(), Value::String(record.path.clone()));

    Value::Object(scope)
}

/// Extend a scope with the sender's result for routing and retry decisions.
/// The action result is visible both as `result` and as `response`.
pub fn with_result(scope: &Value, result: &Value) -> Value {
    let mut extended = scope.clone();
    if let Value::Object(map) = &mut extended {
        map.insert("result".into(), result.clone());
        map.insert("response".into(), result.clone());
    }
    extended
}

/// Extend a scope with failure facts for retry predicates and case rules.
pub fn with_failure(scope: &Value, error: &str, reason: Option<&str>, attempt: u32) -> Value {
    let mut extended = scope.clone();
    if let Value::Object(map) = &mut extended {
        map.insert("error".into(), Value::String(error.to_string()));
        map.insert(
            "reason".into(),
            reason.map(|r| Value::String(r.to_string())).unwrap_or(Value::Null),
        );
        map.insert("attempt_number".into(), Value::from(attempt));
    }
    extended
}
