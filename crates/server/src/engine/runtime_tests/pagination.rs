// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `retry.on_success` pagination chains.

use super::Harness;
use baton_core::{EventKind, ExecutionStatus};
use serde_json::json;

fn paged_playbook(collect: &str) -> serde_json::Value {
    json!({
        "path": "flows/paged",
        "steps": [
            {"step": "page",
             "tool": {"kind": "http",
                      "spec": {"url": "http://api/items", "params": {"page": 1}}},
             "retry": {"on_success": {
                 "while": "{{ response.paging.hasMore }}",
                 "max_attempts": 100,
                 "next_call": {"params": {"page": "{{ response.paging.page + 1 }}"}},
                 "collect": collect,
                 "merge_path": "data"
             }}}
        ]
    })
}

fn page(n: i64, has_more: bool) -> serde_json::Value {
    let data: Vec<i64> = ((n - 1) * 10 + 1..=n * 10).collect();
    json!({"data": data, "paging": {"page": n, "hasMore": has_more}})
}

#[test]
fn four_pages_append_into_forty_items() {
    let h = Harness::new();
    let execution = h.run_playbook(paged_playbook("append"), json!({}));

    for n in 1..=4 {
        let jobs = h.lease_all("w1");
        assert_eq!(jobs.len(), 1, "page {n} should be queued");
        let job = &jobs[0];
        assert_eq!(job.action.spec["params"]["page"], json!(n));
        h.complete_job("w1", job, page(n, n < 4));
    }

    // Four completions linked into one chain
    let completions = h.events_of(execution, "action_completed");
    assert_eq!(completions.len(), 4);
    for pair in completions.windows(2) {
        assert_eq!(
            pair[1].parent_event_id,
            Some(pair[0].event_id),
            "attempts must chain by parent_event_id"
        );
    }

    let sequence = h.events_of(execution, "retry_sequence_completed");
    assert_eq!(sequence.len(), 1);
    let EventKind::RetrySequenceCompleted { attempts, aggregated_result, .. } =
        &sequence[0].kind
    else {
        panic!("wrong kind");
    };
    assert_eq!(*attempts, 4);
    assert_eq!(aggregated_result.as_array().unwrap().len(), 40);

    assert_eq!(h.status(execution), ExecutionStatus::Completed);
    let result = h.step_result(execution, "page").unwrap();
    assert_eq!(result.as_array().unwrap().len(), 40);
    assert_eq!(result[0], json!(1));
    assert_eq!(result[39], json!(40));
}

#[test]
fn collect_keeps_raw_results_per_attempt() {
    let h = Harness::new();
    let execution = h.run_playbook(paged_playbook("collect"), json!({}));

    for n in 1..=2 {
        let jobs = h.lease_all("w1");
        h.complete_job("w1", &jobs[0], page(n, n < 2));
    }

    let result = h.step_result(execution, "page").unwrap();
    let attempts = result.as_array().unwrap();
    assert_eq!(attempts.len(), 2);
    assert_eq!(attempts[0]["paging"]["page"], json!(1));
    assert_eq!(attempts[1]["paging"]["page"], json!(2));
}

#[test]
fn replace_keeps_only_the_last_attempt() {
    let h = Harness::new();
    let execution = h.run_playbook(paged_playbook("replace"), json!({}));

    for n in 1..=3 {
        let jobs = h.lease_all("w1");
        h.complete_job("w1", &jobs[0], page(n, n < 3));
    }

    let result = h.step_result(execution, "page").unwrap();
    assert_eq!(result["paging"]["page"], json!(3));
}

#[test]
fn while_false_on_first_attempt_ends_the_chain() {
    let h = Harness::new();
    let execution = h.run_playbook(paged_playbook("append"), json!({}));

    let jobs = h.lease_all("w1");
    h.complete_job("w1", &jobs[0], page(1, false));

    assert!(h.lease_all("w1").is_empty(), "no continuation enqueued");
    assert_eq!(h.status(execution), ExecutionStatus::Completed);
    assert_eq!(h.step_result(execution, "page").unwrap().as_array().unwrap().len(), 10);
}

#[test]
fn max_attempts_caps_the_chain() {
    let h = Harness::new();
    let mut doc = paged_playbook("append");
    doc["steps"][0]["retry"]["on_success"]["max_attempts"] = json!(2);
    let execution = h.run_playbook(doc, json!({}));

    // Server keeps claiming hasMore, but the cap stops at 2 attempts
    for n in 1..=2 {
        let jobs = h.lease_all("w1");
        assert_eq!(jobs.len(), 1);
        h.complete_job("w1", &jobs[0], page(n, true));
    }
    assert!(h.lease_all("w1").is_empty());
    assert_eq!(h.status(execution), ExecutionStatus::Completed);
    assert_eq!(h.step_result(execution, "page").unwrap().as_array().unwrap().len(), 20);
}
