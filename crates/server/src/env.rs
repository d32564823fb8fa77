// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the server.

use std::path::PathBuf;
use std::time::Duration;

use crate::lifecycle::LifecycleError;

/// Resolve state directory: BATON_STATE_DIR > XDG_STATE_HOME/baton >
/// ~/.local/state/baton
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("BATON_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("baton"));
    }
    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/baton"))
}

/// HTTP listen address (default `127.0.0.1:8873`).
pub fn listen_addr() -> String {
    std::env::var("BATON_LISTEN_ADDR").unwrap_or_else(|_| "127.0.0.1:8873".to_string())
}

/// Snowflake node id for this server (default 0).
pub fn node_id() -> u16 {
    std::env::var("BATON_NODE_ID").ok().and_then(|s| s.parse().ok()).unwrap_or(0)
}

/// Server name in the runtime registry (default `server`).
pub fn server_name() -> String {
    std::env::var("BATON_SERVER_NAME").unwrap_or_else(|_| "server".to_string())
}

/// Sweep interval for leases, liveness, and checkpoints (default 15s).
pub fn sweep_interval() -> Duration {
    duration_ms("BATON_SWEEP_INTERVAL_MS", Duration::from_secs(15))
}

/// Heartbeat age after which a component is marked offline (default 45s).
pub fn offline_after() -> Duration {
    duration_ms("BATON_OFFLINE_AFTER_MS", Duration::from_secs(45))
}

/// Terminal executions older than this are pruned (default 7 days; 0
/// disables pruning).
pub fn prune_after() -> Duration {
    duration_ms("BATON_PRUNE_AFTER_MS", Duration::from_secs(7 * 24 * 3600))
}

/// WAL entries between snapshot checkpoints (default 512).
pub fn checkpoint_every() -> u64 {
    std::env::var("BATON_CHECKPOINT_EVERY").ok().and_then(|s| s.parse().ok()).unwrap_or(512)
}

fn duration_ms(var: &str, default: Duration) -> Duration {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}
