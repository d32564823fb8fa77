// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the worker binary.

use crate::pool::WorkerConfig;
use std::time::Duration;

/// Build the worker configuration from the environment.
pub fn worker_config() -> WorkerConfig {
    let defaults = WorkerConfig::default();
    WorkerConfig {
        server_url: std::env::var("BATON_SERVER_URL").unwrap_or(defaults.server_url),
        name: std::env::var("BATON_WORKER_NAME").unwrap_or(defaults.name),
        capacity: parsed("BATON_WORKER_CAPACITY").unwrap_or(defaults.capacity),
        labels: labels(),
        lease_duration: duration_secs("BATON_LEASE_SECONDS", defaults.lease_duration),
        poll_interval: duration_ms("BATON_POLL_INTERVAL_MS", defaults.poll_interval),
        heartbeat_interval: duration_secs("BATON_HEARTBEAT_SECONDS", defaults.heartbeat_interval),
        grace: duration_secs("BATON_CANCEL_GRACE_SECONDS", defaults.grace),
    }
}

/// `BATON_WORKER_LABELS="region=eu,tier=fast"`.
fn labels() -> std::collections::BTreeMap<String, String> {
    std::env::var("BATON_WORKER_LABELS")
        .ok()
        .map(|raw| {
            raw.split(',')
                .filter_map(|pair| {
                    let (k, v) = pair.split_once('=')?;
                    Some((k.trim().to_string(), v.trim().to_string()))
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parsed<T: std::str::FromStr>(var: &str) -> Option<T> {
    std::env::var(var).ok().and_then(|s| s.parse().ok())
}

fn duration_secs(var: &str, default: Duration) -> Duration {
    parsed::<u64>(var).map(Duration::from_secs).unwrap_or(default)
}

fn duration_ms(var: &str, default: Duration) -> Duration {
    parsed::<u64>(var).map(Duration::from_millis).unwrap_or(default)
}
