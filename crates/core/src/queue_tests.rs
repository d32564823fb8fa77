// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

fn action() -> JobAction {
    JobAction { kind: "http".into(), spec: json!({"url": "http://x"}), timeout_secs: None, context: json!({}) }
}

#[test]
fn spec_materializes_queued_row() {
    let spec = JobSpec::new(ExecutionId(5), "fetch", action());
    let job = spec.into_job(QueueId(9), 1_000);

    assert_eq!(job.status, QueueStatus::Queued);
    assert_eq!(job.attempts, 0);
    assert_eq!(job.available_at, 1_000);
    assert!(job.leasable_at(1_000));
    assert!(!job.leasable_at(999));
}

#[test]
fn scheduled_spec_defers_availability() {
    let mut spec = JobSpec::new(ExecutionId(5), "fetch", action());
    spec.available_at = Some(5_000);
    let job = spec.into_job(QueueId(9), 1_000);

    assert!(!job.leasable_at(4_999));
    assert!(job.leasable_at(5_000));
}

#[test]
fn lease_expiry() {
    let mut job = JobSpec::new(ExecutionId(5), "fetch", action()).into_job(QueueId(9), 0);
    job.status = QueueStatus::Leased;
    job.lease_until = Some(2_000);

    assert!(!job.lease_expired(2_000));
    assert!(job.lease_expired(2_001));
}

#[test]
fn leased_row_without_deadline_counts_as_expired() {
    let mut job = JobSpec::new(ExecutionId(5), "fetch", action()).into_job(QueueId(9), 0);
    job.status = QueueStatus::Leased;
    job.lease_until = None;
    assert!(job.lease_expired(0));
}

#[test]
fn terminal_statuses() {
    assert!(QueueStatus::Done.is_terminal());
    assert!(QueueStatus::Dead.is_terminal());
    assert!(QueueStatus::Failed.is_terminal());
    assert!(!QueueStatus::Queued.is_terminal());
    assert!(!QueueStatus::Leased.is_terminal());
}

#[test]
fn meta_round_trips_with_linkage() {
    let meta = JobMeta {
        iterator: Some(IteratorMeta {
            step: "fan".into(),
            index: 3,
            total: 10,
            element: "city".into(),
            mode: LoopMode::Async,
        }),
        retry: Some(RetryMeta {
            attempt_number: 2,
            parent_event_id: EventId(77),
            kind: RetryKind::OnError,
        }),
        labels: BTreeMap::new(),
        dedup_key: Some("exec-5:fetch:2".into()),
    };
    let json = serde_json::to_value(&meta).unwrap();
    assert_eq!(json["retry"]["parent_event_id"], json!("77"));
    let back: JobMeta = serde_json::from_value(json).unwrap();
    assert_eq!(back, meta);
}
