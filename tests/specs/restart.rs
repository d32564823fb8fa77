// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recovery specs: a server restart must not lose or duplicate work.

use super::harness::{ScriptedExecutor, TestServer};
use baton_worker::ToolRegistry;
use serde_json::json;
use std::time::Duration;

/// The second step needs a capability only the post-restart pool has, so
/// phase one deterministically stops after the first step.
fn two_step_playbook() -> serde_json::Value {
    json!({
        "path": "flows/durable",
        "steps": [
            {"step": "first", "tool": {"kind": "http", "spec": {"url": "http://1"}},
             "next": [{"step": "second"}]},
            {"step": "second", "tool": {"kind": "postgres", "spec": {"sql": "select 1"}}}
        ]
    })
}

#[tokio::test]
async fn execution_survives_a_server_restart() {
    let dir = tempfile::tempdir().unwrap();
    let state_dir = dir.path().to_path_buf();

    // Phase 1: run the first step, then stop the server mid-execution.
    let server = TestServer::start(state_dir.clone()).await;
    let mut registry = ToolRegistry::new();
    registry.register("http", ScriptedExecutor::new(vec![Ok(json!({"step": 1}))]));
    let worker = server.spawn_worker("pool-1", registry);

    let execution_id = server.run_playbook(two_step_playbook(), json!({})).await;

    // Wait until the first step is done; the second stays queued because no
    // pool speaks postgres yet.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let summary = server.summary(&execution_id).await;
        let first_done = summary["steps"]
            .as_array()
            .map(|steps| {
                steps.iter().any(|s| s["step"] == "first" && s["phase"] == "done")
            })
            .unwrap_or(false);
        if first_done {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "first step never finished");
        tokio::time::sleep(Duration::from_millis(25)).await;
    }

    worker.stop().await;
    server.stop().await;

    // Phase 2: restart over the same state directory and finish the run.
    let server = TestServer::start(state_dir).await;
    let mut registry = ToolRegistry::new();
    registry.register("postgres", ScriptedExecutor::new(vec![Ok(json!({"step": 2}))]));
    let worker = server.spawn_worker("pool-2", registry);

    let summary = server.wait_terminal(&execution_id, Duration::from_secs(10)).await;
    assert_eq!(summary["status"], "COMPLETED");
    let steps = summary["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 2);
    assert!(steps.iter().all(|s| s["phase"] == "done"));

    worker.stop().await;
    server.stop().await;
}
