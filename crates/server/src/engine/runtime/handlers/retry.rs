// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retry-sequence aggregation.
//!
//! An `on_success` chain walks its attempts in order (linked by
//! `parent_event_id`, mirrored in the projection's chain) and folds them per
//! the configured collect strategy.

use baton_core::projection::ChainAttempt;
use baton_core::value::get_path;
use baton_core::CollectStrategy;
use serde_json::Value;

/// Fold a chain of attempt results into the step's final result.
pub(crate) fn aggregate_chain(
    chain: &[ChainAttempt],
    collect: CollectStrategy,
    merge_path: Option<&str>,
) -> Value {
    match collect {
        CollectStrategy::Replace => {
            chain.last().map(|a| a.result.clone()).unwrap_or(Value::Null)
        }
        // Array of raw tool results, one per attempt, preserving order.
        CollectStrategy::Collect => {
            Value::Array(chain.iter().map(|a| a.result.clone()).collect())
        }
        // Concatenation of the arrays found at `merge_path` (or of the raw
        // results when they are arrays themselves).
        CollectStrategy::Append => {
            let mut merged = Vec::new();
            for attempt in chain {
                let slice = match merge_path {
                    Some(path) => get_path(&attempt.result, path),
                    None => Some(&attempt.result),
                };
                match slice {
                    Some(Value::Array(items)) => merged.extend(items.iter().cloned()),
                    Some(other) if !other.is_null() => merged.push(other.clone()),
                    _ => {}
                }
            }
            Value::Array(merged)
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
