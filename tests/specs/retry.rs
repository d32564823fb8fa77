// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retry specs over the full stack.

use super::harness::{ScriptedExecutor, TestServer};
use baton_worker::ToolRegistry;
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn on_error_retry_recovers_from_transient_failures() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(dir.path().to_path_buf()).await;

    let mut registry = ToolRegistry::new();
    registry.register("http", ScriptedExecutor::new(vec![
        Err("500 internal".into()),
        Err("500 internal".into()),
        Ok(json!({"status": 200})),
    ]));
    let worker = server.spawn_worker("pool-1", registry);

    let execution_id = server
        .run_playbook(
            json!({
                "path": "flows/flaky",
                "steps": [
                    {"step": "call", "tool": {"kind": "http", "spec": {"url": "http://f"}},
                     "retry": {"on_error": {
                         "max_attempts": 3,
                         "backoff": "constant",
                         "initial_delay": 0.05
                     }}}
                ]
            }),
            json!({}),
        )
        .await;

    let summary = server.wait_terminal(&execution_id, Duration::from_secs(10)).await;
    assert_eq!(summary["status"], "COMPLETED");
    let step = &summary["steps"][0];
    assert_eq!(step["attempts"], 3);

    worker.stop().await;
    server.stop().await;
}

#[tokio::test]
async fn exhausted_retries_fail_the_execution() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(dir.path().to_path_buf()).await;

    let mut registry = ToolRegistry::new();
    registry.register("http", ScriptedExecutor::new(vec![
        Err("boom 1".into()),
        Err("boom 2".into()),
    ]));
    let worker = server.spawn_worker("pool-1", registry);

    let execution_id = server
        .run_playbook(
            json!({
                "path": "flows/doomed",
                "steps": [
                    {"step": "call", "tool": {"kind": "http", "spec": {}},
                     "retry": {"on_error": {
                         "max_attempts": 2,
                         "backoff": "constant",
                         "initial_delay": 0.05
                     }}}
                ]
            }),
            json!({}),
        )
        .await;

    let summary = server.wait_terminal(&execution_id, Duration::from_secs(10)).await;
    assert_eq!(summary["status"], "FAILED");
    assert!(summary["error"].as_str().unwrap().contains("boom 2"));

    worker.stop().await;
    server.stop().await;
}

#[tokio::test]
async fn pagination_chain_aggregates_across_attempts() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(dir.path().to_path_buf()).await;

    let mut registry = ToolRegistry::new();
    registry.register("http", ScriptedExecutor::new(vec![
        Ok(json!({"data": [1, 2], "paging": {"page": 1, "hasMore": true}})),
        Ok(json!({"data": [3, 4], "paging": {"page": 2, "hasMore": true}})),
        Ok(json!({"data": [5], "paging": {"page": 3, "hasMore": false}})),
    ]));
    let worker = server.spawn_worker("pool-1", registry);

    let execution_id = server
        .run_playbook(
            json!({
                "path": "flows/pages",
                "steps": [
                    {"step": "page", "tool": {"kind": "http",
                        "spec": {"url": "http://api", "params": {"page": 1}}},
                     "retry": {"on_success": {
                         "while": "{{ response.paging.hasMore }}",
                         "max_attempts": 10,
                         "next_call": {"params": {"page": "{{ response.paging.page + 1 }}"}},
                         "collect": "append",
                         "merge_path": "data"
                     }},
                     "next": [{"step": "sink", "args": {"total": "{{ result }}"}}]},
                    {"step": "sink"}
                ]
            }),
            json!({}),
        )
        .await;

    let summary = server.wait_terminal(&execution_id, Duration::from_secs(10)).await;
    assert_eq!(summary["status"], "COMPLETED");

    worker.stop().await;
    server.stop().await;
}
