// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Loop specs and collection shaping.
//!
//! `shape_collection` turns a rendered collection into the final item list:
//! scalar promotion, `where` filtering, stable `order_by`, `limit`, and
//! `chunk` batching. The engine owns enqueueing and join semantics.

use crate::template::{compare, render_deep, TemplateEvaluator};
use crate::validate::PlaybookError;
use baton_core::queue::LoopMode;
use baton_core::value::{deep_merge, truthy};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `loop: { in|collection, iterator|element, mode?, concurrency?, where?,
/// limit?, order_by?, chunk?, enumerate? }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopSpec {
    /// Collection expression or inline array.
    #[serde(alias = "in")]
    pub collection: Value,
    /// Name each item is bound to in the child scope.
    #[serde(default = "default_element", alias = "iterator")]
    pub element: String,
    #[serde(default)]
    pub mode: LoopMode,
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,
    /// Per-item filter predicate.
    #[serde(default, rename = "where", skip_serializing_if = "Option::is_none")]
    pub where_: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Per-item sort key expression; sort is stable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
    /// Batch size; items become arrays of at most `chunk` elements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk: Option<usize>,
    /// Expose the item index as `index` in the child scope.
    #[serde(default)]
    pub enumerate: bool,
    /// Deprecated early-termination form. Rejected by validation: it is not
    /// equivalent to `where` filtering and the engine refuses to guess.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<Value>,
}

fn default_element() -> String {
    "item".to_string()
}

fn default_concurrency() -> u32 {
    1
}

impl LoopSpec {
    /// Effective in-flight cap for async mode; sequential is always 1.
    pub fn effective_concurrency(&self) -> u32 {
        match self.mode {
            LoopMode::Sequential => 1,
            LoopMode::Async => self.concurrency.max(1),
        }
    }
}

/// Build the child scope for one item: parent scope plus the bound element
/// (and `index` when enumerating).
pub fn item_scope(spec: &LoopSpec, parent: &Value, item: &Value, index: usize) -> Value {
    let mut scope = parent.clone();
    let mut extra = serde_json::Map::new();
    extra.insert(spec.element.clone(), item.clone());
    if spec.enumerate {
        extra.insert("index".to_string(), Value::from(index));
    }
    deep_merge(&mut scope, Value::Object(extra));
    scope
}

/// Render and shape the collection into the final item list.
///
/// A non-array render result is promoted to a single-item list — strings are
/// never iterated character-by-character. Mappings are rejected.
pub fn shape_collection(
    spec: &LoopSpec,
    eval: &dyn TemplateEvaluator,
    scope: &Value,
    step: &str,
) -> Result<Vec<Value>, PlaybookError> {
    let rendered = render_deep(eval, &spec.collection, scope)
        .map_err(|e| PlaybookError::Render { step: step.to_string(), source: e })?;

    let mut items: Vec<Value> = match rendered {
        Value::Array(items) => items,
        Value::Object(_) => {
            return Err(PlaybookError::MappingIteration { step: step.to_string() })
        }
        Value::Null => Vec::new(),
        scalar => vec![scalar],
    };

    if let Some(predicate) = &spec.where_ {
        let mut kept = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            let child = item_scope(spec, scope, &item, index);
            let verdict = eval
                .render(predicate, &child)
                .map_err(|e| PlaybookError::Render { step: step.to_string(), source: e })?;
            if truthy(&verdict) {
                kept.push(item);
            }
        }
        items = kept;
    }

    if let Some(key_expr) = &spec.order_by {
        let mut keyed = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            let child = item_scope(spec, scope, &item, index);
            let key = eval
                .render(key_expr, &child)
                .map_err(|e| PlaybookError::Render { step: step.to_string(), source: e })?;
            keyed.push((key, item));
        }
        keyed.sort_by(|(a, _), (b, _)| compare(a, b).unwrap_or(std::cmp::Ordering::Equal));
        items = keyed.into_iter().map(|(_, item)| item).collect();
    }

    if let Some(limit) = spec.limit {
        items.truncate(limit);
    }

    if let Some(chunk) = spec.chunk.filter(|c| *c > 0) {
        items = items
            .chunks(chunk)
            .map(|batch| Value::Array(batch.to_vec()))
            .collect();
    }

    Ok(items)
}

#[cfg(test)]
#[path = "iterate_tests.rs"]
mod tests;
