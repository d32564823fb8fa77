// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Context sanitization.
//!
//! Every event the worker sends carries a safe context snapshot: oversized
//! values are truncated, private keys are dropped, step results collapse to
//! metadata summaries, and anything that smells like a secret is redacted.
//! Tools are trusted with the full render context; only what leaves the
//! worker goes through here.

use baton_core::value::approx_size;
use serde_json::{Map, Value};

/// Values whose rendered size exceeds this are replaced with a marker.
pub const MAX_VALUE_BYTES: usize = 10 * 1024;

/// Key fragments that mark secret material.
const SENSITIVE_MARKERS: &[&str] =
    &["secret", "password", "token", "api_key", "apikey", "credential", "authorization"];

/// Build the safe context snapshot sent with worker events.
pub fn sanitize_context(scope: &Value) -> Value {
    let Some(map) = scope.as_object() else {
        return Value::Object(Map::new());
    };

    // Per-step phases ride in under `_step_status`; they fold into the
    // summaries and the raw key is dropped like any other private key.
    let statuses = map.get("_step_status").and_then(Value::as_object);

    let mut out = Map::new();
    for (key, value) in map {
        // Step results are summarized, never shipped wholesale.
        if key == "steps" {
            out.insert("_step_results".to_string(), summarize_steps(value, statuses));
            continue;
        }
        if key.starts_with('_') && key != "_step_results" {
            continue;
        }
        if is_sensitive(key) {
            out.insert(key.clone(), Value::String("[redacted]".to_string()));
            continue;
        }
        out.insert(key.clone(), cap_size(scrub(value)));
    }
    Value::Object(out)
}

/// Recursively drop `_`-prefixed keys and redact secret-looking ones.
fn scrub(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, value) in map {
                if key.starts_with('_') {
                    continue;
                }
                if is_sensitive(key) {
                    out.insert(key.clone(), Value::String("[redacted]".to_string()));
                } else {
                    out.insert(key.clone(), scrub(value));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(scrub).collect()),
        other => other.clone(),
    }
}

fn cap_size(value: Value) -> Value {
    let size = approx_size(&value);
    if size > MAX_VALUE_BYTES {
        serde_json::json!({"_truncated": true, "_size": size})
    } else {
        value
    }
}

/// Metadata-only view of step results: `{has_data, status, data_type}` per
/// step.
fn summarize_steps(steps: &Value, statuses: Option<&Map<String, Value>>) -> Value {
    let Some(map) = steps.as_object() else {
        return Value::Object(Map::new());
    };
    let mut out = Map::new();
    for (step, result) in map {
        let status = statuses
            .and_then(|s| s.get(step))
            .cloned()
            // A step with a published result has settled.
            .unwrap_or_else(|| Value::String("done".to_string()));
        out.insert(
            step.clone(),
            serde_json::json!({
                "has_data": !result.is_null(),
                "status": status,
                "data_type": type_name(result),
            }),
        );
    }
    Value::Object(out)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_sensitive(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    SENSITIVE_MARKERS.iter().any(|marker| lower.contains(marker))
}

#[cfg(test)]
#[path = "sanitize_tests.rs"]
mod tests;
