// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use yare::parameterized;

#[test]
fn keeps_ordinary_keys() {
    let scope = json!({"execution_id": "5", "workload": {"city": "berlin"}, "vars": {"n": 1}});
    let safe = sanitize_context(&scope);
    assert_eq!(safe["execution_id"], json!("5"));
    assert_eq!(safe["workload"]["city"], json!("berlin"));
    assert_eq!(safe["vars"]["n"], json!(1));
}

#[test]
fn drops_underscore_keys_at_every_level() {
    let scope = json!({"_private": 1, "nested": {"_hidden": 2, "kept": 3}});
    let safe = sanitize_context(&scope);
    assert_eq!(safe.get("_private"), None);
    assert_eq!(safe["nested"].get("_hidden"), None);
    assert_eq!(safe["nested"]["kept"], json!(3));
}

#[test]
fn oversized_values_become_markers() {
    let big = "x".repeat(MAX_VALUE_BYTES + 100);
    let scope = json!({"blob": big, "small": "ok"});
    let safe = sanitize_context(&scope);
    assert_eq!(safe["blob"]["_truncated"], json!(true));
    assert!(safe["blob"]["_size"].as_u64().unwrap() > MAX_VALUE_BYTES as u64);
    assert_eq!(safe["small"], json!("ok"));
}

#[test]
fn step_results_collapse_to_summaries() {
    let scope = json!({
        "steps": {
            "fetch": {"rows": [1, 2, 3]},
            "empty": null,
            "note": "text",
        },
        "_step_status": {"fetch": "done", "empty": "dead"},
    });
    let safe = sanitize_context(&scope);
    assert_eq!(safe.get("steps"), None);
    assert_eq!(safe.get("_step_status"), None, "raw status map never leaves");
    let summaries = &safe["_step_results"];
    assert_eq!(
        summaries["fetch"],
        json!({"has_data": true, "status": "done", "data_type": "object"})
    );
    assert_eq!(
        summaries["empty"],
        json!({"has_data": false, "status": "dead", "data_type": "null"})
    );
    // Steps with no recorded phase fall back to settled
    assert_eq!(
        summaries["note"],
        json!({"has_data": true, "status": "done", "data_type": "string"})
    );
}

#[parameterized(
    password = { "db_password" },
    token = { "auth_token" },
    api_key = { "service_api_key" },
    secret = { "client_secret" },
    authorization = { "Authorization" },
)]
fn secret_looking_keys_are_redacted(key: &str) {
    let scope = json!({key: "hunter2"});
    let safe = sanitize_context(&scope);
    assert_eq!(safe[key], json!("[redacted]"));
}

#[test]
fn nested_secrets_are_redacted_too() {
    let scope = json!({"config": {"headers": {"x-api-token": "abc"}}});
    let safe = sanitize_context(&scope);
    assert_eq!(safe["config"]["headers"]["x-api-token"], json!("[redacted]"));
}

#[test]
fn non_object_scope_sanitizes_to_empty() {
    assert_eq!(sanitize_context(&json!("just text")), json!({}));
}
