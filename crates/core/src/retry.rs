// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative retry policies and the backoff computation.
//!
//! Two independent mechanisms: `on_error` re-runs a failed action with
//! backoff, `on_success` continues a succeeded action while a predicate
//! holds (pagination/polling). The engine owns all decisions; this module
//! only carries the configuration and the pure delay math.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Step-level retry block: `retry: { on_error: {...}, on_success: {...} }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_error: Option<OnErrorRetry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_success: Option<OnSuccessRetry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
    Constant,
    Linear,
    #[default]
    Exponential,
}

/// Failure retry configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnErrorRetry {
    #[serde(default = "default_error_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub backoff: Backoff,
    /// Seconds before the second attempt.
    #[serde(default = "default_initial_delay")]
    pub initial_delay: f64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    /// Ceiling in seconds applied before jitter.
    #[serde(default = "default_max_delay")]
    pub max_delay: f64,
    /// Jitter amplitude as a fraction of the delay, `0.0..=1.0`.
    #[serde(default)]
    pub jitter: f64,
    /// Optional predicate rendered against the failure context; retry only
    /// when absent or truthy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
}

impl Default for OnErrorRetry {
    fn default() -> Self {
        Self {
            max_attempts: default_error_attempts(),
            backoff: Backoff::default(),
            initial_delay: default_initial_delay(),
            multiplier: default_multiplier(),
            max_delay: default_max_delay(),
            jitter: 0.0,
            when: None,
        }
    }
}

/// How a pagination/polling chain folds its per-attempt results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectStrategy {
    /// Concatenate arrays found at `merge_path` across attempts.
    #[default]
    Append,
    /// Keep only the last attempt's result.
    Replace,
    /// Array of raw per-attempt results, in order.
    Collect,
}

/// Tool-spec patch applied between attempts of an `on_success` chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NextCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Value>,
}

/// Success continuation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnSuccessRetry {
    /// Continue while this renders truthy against the attempt result.
    #[serde(rename = "while")]
    pub while_: String,
    #[serde(default = "default_success_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub next_call: NextCall,
    #[serde(default)]
    pub collect: CollectStrategy,
    /// Dotted path to the array merged by [`CollectStrategy::Append`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_path: Option<String>,
}

fn default_error_attempts() -> u32 {
    3
}

fn default_success_attempts() -> u32 {
    10
}

fn default_initial_delay() -> f64 {
    1.0
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_delay() -> f64 {
    300.0
}

/// Delay before attempt `attempt + 1` given that attempt `attempt` failed
/// (1-based). `jitter_frac` is the sampled jitter in `[-jitter, +jitter]`,
/// injected by the caller so tests stay deterministic.
pub fn backoff_delay(policy: &OnErrorRetry, attempt: u32, jitter_frac: f64) -> Duration {
    let base = match policy.backoff {
        Backoff::Constant => policy.initial_delay,
        Backoff::Linear => policy.initial_delay * attempt as f64,
        Backoff::Exponential => {
            policy.initial_delay * policy.multiplier.powi(attempt.saturating_sub(1) as i32)
        }
    };
    let clamped = base.clamp(0.0, policy.max_delay);
    let jittered = clamped * (1.0 + jitter_frac.clamp(-policy.jitter, policy.jitter));
    Duration::from_secs_f64(jittered.max(0.0))
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
