// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

fn ctx() -> CallContext {
    CallContext {
        execution_id: baton_core::ExecutionId(1),
        queue_id: baton_core::QueueId(2),
        node_id: "step".into(),
        attempt: 1,
        context: json!({}),
    }
}

#[tokio::test]
async fn registry_routes_by_kind() {
    let mut registry = ToolRegistry::new();
    registry.register("noop", Arc::new(NoopExecutor));

    assert!(registry.get("noop").is_some());
    assert!(registry.get("http").is_none());
    assert_eq!(registry.kinds(), vec!["noop"]);

    let executor = registry.get("noop").unwrap();
    let result = executor.execute(&json!({"echo": 1}), &ctx()).await.unwrap();
    assert_eq!(result, json!({"echo": 1}));
}

#[test]
fn kinds_are_sorted_for_stable_capability_lists() {
    let mut registry = ToolRegistry::new();
    registry.register("postgres", Arc::new(NoopExecutor));
    registry.register("http", Arc::new(NoopExecutor));
    registry.register("duckdb", Arc::new(NoopExecutor));
    assert_eq!(registry.kinds(), vec!["duckdb", "http", "postgres"]);
}

#[test]
fn error_reasons_match_the_event_contract() {
    assert_eq!(ToolError::Timeout.reason(), Some("timeout"));
    assert_eq!(ToolError::Cancelled.reason(), Some("cancelled"));
    assert_eq!(ToolError::failed("boom").reason(), None);
}

#[test]
fn failed_carries_an_optional_stack() {
    let plain = ToolError::failed("boom");
    assert!(matches!(plain, ToolError::Failed { stack: None, .. }));
    let with_stack = ToolError::Failed { message: "boom".into(), stack: Some("trace".into()) };
    assert_eq!(with_stack.to_string(), "boom");
}
