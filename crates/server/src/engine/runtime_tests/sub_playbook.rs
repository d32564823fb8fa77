// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sub-playbook steps: child executions reporting back to the parent.

use super::Harness;
use baton_core::ExecutionStatus;
use serde_json::json;

fn child_playbook() -> serde_json::Value {
    json!({
        "path": "flows/child",
        "steps": [
            {"step": "inner", "tool": {"kind": "http", "spec": {"url": "http://inner"}}}
        ]
    })
}

fn parent_playbook() -> serde_json::Value {
    json!({
        "path": "flows/parent",
        "steps": [
            {"step": "delegate",
             "tool": {"kind": "playbooks",
                      "spec": {"path": "flows/child", "workload": {"from": "parent"}}},
             "next": [{"step": "after"}]},
            {"step": "after"}
        ]
    })
}

#[test]
fn child_execution_reports_back_to_the_parent_step() {
    let h = Harness::new();
    h.register_playbook(child_playbook());
    let parent = h.run_playbook(parent_playbook(), json!({}));

    // The child execution exists, linked to the parent step
    let child = h
        .state
        .lock()
        .executions
        .values()
        .find(|r| r.parent_execution_id == Some(parent))
        .cloned()
        .unwrap();
    assert_eq!(child.parent_step.as_deref(), Some("delegate"));
    assert_eq!(child.path, "flows/child");
    assert_eq!(child.workload["from"], json!("parent"));
    assert_eq!(h.status(parent), ExecutionStatus::Running);

    // Run the child's only step
    let jobs = h.lease_all("w1");
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].execution_id, child.execution_id);
    h.complete_job("w1", &jobs[0], json!({"inner": true}));

    // Child completed and the parent routed onwards
    assert_eq!(h.status(child.execution_id), ExecutionStatus::Completed);
    assert_eq!(h.status(parent), ExecutionStatus::Completed);
    let result = h.step_result(parent, "delegate").unwrap();
    assert_eq!(result["status"], json!("COMPLETED"));
    assert_eq!(result["steps"]["inner"]["inner"], json!(true));
}

#[test]
fn child_failure_honors_the_parent_error_policy() {
    let h = Harness::new();
    h.register_playbook(child_playbook());
    let parent = h.run_playbook(parent_playbook(), json!({}));

    let jobs = h.lease_all("w1");
    h.fail_job("w1", &jobs[0], "inner exploded");

    assert_eq!(h.status(parent), ExecutionStatus::Failed);
}

#[test]
fn unknown_child_playbook_fails_the_step() {
    let h = Harness::new();
    let parent = h.run_playbook(
        json!({
            "path": "flows/orphan",
            "steps": [
                {"step": "delegate",
                 "tool": {"kind": "playbooks", "spec": {"path": "flows/missing"}}}
            ]
        }),
        json!({}),
    );

    assert_eq!(h.status(parent), ExecutionStatus::Failed);
}
