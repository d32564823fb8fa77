// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Iterator expansion, concurrency caps, and the join.

use super::Harness;
use baton_core::{EventKind, ExecutionStatus};
use serde_json::json;

fn cities(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("c{i}")).collect()
}

fn iterator_playbook(mode: &str, concurrency: u32) -> serde_json::Value {
    json!({
        "path": "flows/cities",
        "steps": [
            {"step": "fan",
             "loop": {"collection": "{{ cities }}", "element": "city",
                      "mode": mode, "concurrency": concurrency},
             "tool": {"kind": "http", "spec": {"url": "http://weather/{{ city }}"}}}
        ]
    })
}

#[test]
fn async_iterator_respects_the_concurrency_cap() {
    let h = Harness::new();
    let execution =
        h.run_playbook(iterator_playbook("async", 3), json!({"cities": cities(10)}));

    let started = h.events_of(execution, "iterator_started");
    assert_eq!(started.len(), 1);
    assert!(matches!(
        &started[0].kind,
        EventKind::IteratorStarted { total: 10, concurrency: 3, .. }
    ));

    let mut done = 0;
    while done < 10 {
        let jobs = h.lease_all("w1");
        assert!(!jobs.is_empty(), "stalled after {done} completions");
        assert!(
            h.leased_count(execution) <= 3,
            "cap exceeded: {} leased",
            h.leased_count(execution)
        );
        for job in &jobs {
            let iter = job.meta.iterator.as_ref().unwrap();
            h.complete_job("w1", job, json!({"city": format!("c{}", iter.index + 1)}));
            done += 1;
        }
    }

    let completed = h.events_of(execution, "iterator_completed");
    assert_eq!(completed.len(), 1, "join must fire exactly once");
    let EventKind::IteratorCompleted { items, count, errors, .. } = &completed[0].kind else {
        panic!("wrong kind");
    };
    assert_eq!(*count, 10);
    assert!(errors.is_empty());
    // Aggregated results in input order
    let order: Vec<String> =
        items.iter().map(|v| v["city"].as_str().unwrap().to_string()).collect();
    assert_eq!(order, cities(10));

    assert_eq!(h.status(execution), ExecutionStatus::Completed);
}

#[test]
fn sequential_iterator_runs_one_at_a_time() {
    let h = Harness::new();
    let execution =
        h.run_playbook(iterator_playbook("sequential", 4), json!({"cities": cities(3)}));

    for expected_index in 0..3 {
        let jobs = h.lease_all("w1");
        assert_eq!(jobs.len(), 1, "sequential mode leases one child");
        assert_eq!(jobs[0].meta.iterator.as_ref().unwrap().index, expected_index);
        h.complete_job("w1", &jobs[0], json!(expected_index));
    }
    assert_eq!(h.status(execution), ExecutionStatus::Completed);
}

#[test]
fn empty_collection_joins_immediately() {
    let h = Harness::new();
    let execution = h.run_playbook(iterator_playbook("async", 2), json!({"cities": []}));

    let started = h.events_of(execution, "iterator_started");
    assert!(matches!(&started[0].kind, EventKind::IteratorStarted { total: 0, .. }));

    let completed = h.events_of(execution, "iterator_completed");
    assert_eq!(completed.len(), 1);
    assert!(matches!(
        &completed[0].kind,
        EventKind::IteratorCompleted { items, .. } if items.is_empty()
    ));
    assert_eq!(h.status(execution), ExecutionStatus::Completed);
}

#[test]
fn scalar_collection_is_a_single_item() {
    let h = Harness::new();
    let execution =
        h.run_playbook(iterator_playbook("async", 2), json!({"cities": "berlin"}));

    let jobs = h.lease_all("w1");
    assert_eq!(jobs.len(), 1, "no character-by-character iteration");
    assert_eq!(jobs[0].action.spec["url"], json!("http://weather/berlin"));
    h.complete_job("w1", &jobs[0], json!({}));
    assert_eq!(h.status(execution), ExecutionStatus::Completed);
}

#[test]
fn child_failure_fails_the_iterator_by_default() {
    let h = Harness::new();
    let execution =
        h.run_playbook(iterator_playbook("async", 3), json!({"cities": cities(2)}));

    let jobs = h.lease_all("w1");
    h.complete_job("w1", &jobs[0], json!({}));
    h.fail_job("w1", &jobs[1], "boom");

    let completed = h.events_of(execution, "iterator_completed");
    let EventKind::IteratorCompleted { errors, .. } = &completed[0].kind else {
        panic!("wrong kind");
    };
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].index, 1);
    assert_eq!(h.status(execution), ExecutionStatus::Failed);
}

#[test]
fn tolerant_iterator_completes_with_partial_failures() {
    let h = Harness::new();
    let mut doc = iterator_playbook("async", 3);
    doc["steps"][0]["on_error"] = json!("continue");
    let execution = h.run_playbook(doc, json!({"cities": cities(3)}));

    let jobs = h.lease_all("w1");
    h.complete_job("w1", &jobs[0], json!("a"));
    h.fail_job("w1", &jobs[1], "boom");
    h.complete_job("w1", &jobs[2], json!("c"));

    assert_eq!(h.status(execution), ExecutionStatus::Completed);
    let result = h.step_result(execution, "fan").unwrap();
    assert_eq!(result["items"], json!(["a", null, "c"]));
    assert_eq!(result["errors"][0]["index"], json!(1));
}

#[test]
fn where_and_order_by_shape_the_children() {
    let h = Harness::new();
    h.run_playbook(
        json!({
            "path": "flows/shaped",
            "steps": [
                {"step": "fan",
                 "loop": {"collection": "{{ xs }}", "element": "x",
                          "mode": "async", "concurrency": 10,
                          "where": "{{ x.keep }}", "order_by": "{{ x.rank }}", "limit": 2},
                 "tool": {"kind": "http", "spec": {"id": "{{ x.id }}"}}}
            ]
        }),
        json!({"xs": [
            {"id": "a", "keep": true, "rank": 3},
            {"id": "b", "keep": false, "rank": 1},
            {"id": "c", "keep": true, "rank": 1},
            {"id": "d", "keep": true, "rank": 2},
        ]}),
    );

    let jobs = h.lease_all("w1");
    let ids: Vec<&str> =
        jobs.iter().map(|j| j.action.spec["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["c", "d"], "filtered, sorted, limited");
}
