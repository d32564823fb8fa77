// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use baton_core::{EventId, QueueId};
use serde_json::json;

fn chain(results: Vec<Value>) -> Vec<ChainAttempt> {
    results
        .into_iter()
        .enumerate()
        .map(|(i, result)| ChainAttempt {
            event_id: EventId(i as u64 + 1),
            queue_id: QueueId(i as u64 + 100),
            result,
        })
        .collect()
}

#[test]
fn replace_keeps_the_last_attempt() {
    let chain = chain(vec![json!({"page": 1}), json!({"page": 2})]);
    assert_eq!(
        aggregate_chain(&chain, CollectStrategy::Replace, None),
        json!({"page": 2})
    );
}

#[test]
fn collect_preserves_attempt_order() {
    let chain = chain(vec![json!(1), json!(2), json!(3)]);
    assert_eq!(
        aggregate_chain(&chain, CollectStrategy::Collect, None),
        json!([1, 2, 3])
    );
}

#[test]
fn append_concatenates_arrays_at_merge_path() {
    let chain = chain(vec![
        json!({"data": [1, 2], "paging": {"page": 1}}),
        json!({"data": [3, 4], "paging": {"page": 2}}),
    ]);
    assert_eq!(
        aggregate_chain(&chain, CollectStrategy::Append, Some("data")),
        json!([1, 2, 3, 4])
    );
}

#[test]
fn append_without_merge_path_uses_raw_results() {
    let chain = chain(vec![json!([1]), json!([2, 3])]);
    assert_eq!(aggregate_chain(&chain, CollectStrategy::Append, None), json!([1, 2, 3]));
}

#[test]
fn append_skips_attempts_missing_the_path() {
    let chain = chain(vec![json!({"data": [1]}), json!({"other": true})]);
    assert_eq!(
        aggregate_chain(&chain, CollectStrategy::Append, Some("data")),
        json!([1])
    );
}

#[test]
fn empty_chain_aggregates_to_the_neutral_value() {
    assert_eq!(aggregate_chain(&[], CollectStrategy::Replace, None), json!(null));
    assert_eq!(aggregate_chain(&[], CollectStrategy::Collect, None), json!([]));
    assert_eq!(aggregate_chain(&[], CollectStrategy::Append, Some("d")), json!([]));
}
