// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Happy-path specs through the full HTTP surface.

use super::harness::{ScriptedExecutor, TestServer};
use baton_worker::{NoopExecutor, ToolRegistry};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn linear_playbook_completes_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(dir.path().to_path_buf()).await;

    let mut registry = ToolRegistry::new();
    registry.register("http", ScriptedExecutor::new(vec![
        Ok(json!({"status": 200, "body": {"a": true}})),
        Ok(json!({"status": 200, "body": {"b": true}})),
    ]));
    let worker = server.spawn_worker("pool-1", registry);

    let execution_id = server
        .run_playbook(
            json!({
                "path": "flows/linear",
                "steps": [
                    {"step": "a", "tool": {"kind": "http", "spec": {"url": "http://one"}},
                     "next": [{"step": "b"}]},
                    {"step": "b", "tool": {"kind": "http", "spec": {"url": "http://two"}}}
                ]
            }),
            json!({}),
        )
        .await;

    let summary = server.wait_terminal(&execution_id, Duration::from_secs(10)).await;
    assert_eq!(summary["status"], "COMPLETED");
    let steps = summary["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 2);
    assert!(steps.iter().all(|s| s["phase"] == "done"));

    worker.stop().await;
    server.stop().await;
}

#[tokio::test]
async fn iterator_fan_out_completes_with_a_live_pool() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(dir.path().to_path_buf()).await;

    let mut registry = ToolRegistry::new();
    registry.register("noop", Arc::new(NoopExecutor));
    let worker = server.spawn_worker("pool-1", registry);

    let execution_id = server
        .run_playbook(
            json!({
                "path": "flows/cities",
                "steps": [
                    {"step": "fan",
                     "loop": {"collection": "{{ cities }}", "element": "city",
                              "mode": "async", "concurrency": 2},
                     "tool": {"kind": "noop", "spec": {"city": "{{ city }}"}}}
                ]
            }),
            json!({"cities": ["a", "b", "c", "d", "e"]}),
        )
        .await;

    let summary = server.wait_terminal(&execution_id, Duration::from_secs(10)).await;
    assert_eq!(summary["status"], "COMPLETED");

    worker.stop().await;
    server.stop().await;
}

#[tokio::test]
async fn capability_mismatch_leaves_jobs_queued() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(dir.path().to_path_buf()).await;

    // Worker only speaks noop; the playbook wants postgres
    let mut registry = ToolRegistry::new();
    registry.register("noop", Arc::new(NoopExecutor));
    let worker = server.spawn_worker("pool-1", registry);

    let execution_id = server
        .run_playbook(
            json!({
                "path": "flows/sql",
                "steps": [{"step": "q", "tool": {"kind": "postgres", "spec": {"sql": "select 1"}}}]
            }),
            json!({}),
        )
        .await;

    tokio::time::sleep(Duration::from_millis(300)).await;
    let summary = server.summary(&execution_id).await;
    assert_eq!(summary["status"], "RUNNING", "job must wait for a capable worker");

    worker.stop().await;
    server.stop().await;
}
