// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `baton-worker` — a worker pool process.
//!
//! Plugin executors register here; the stock binary ships only the noop
//! executor for smoke-testing a deployment.

use baton_worker::{NoopExecutor, ToolRegistry, WorkerPool};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = baton_worker::env::worker_config();
    let mut registry = ToolRegistry::new();
    registry.register("noop", Arc::new(NoopExecutor));

    let pool = WorkerPool::new(config, registry);
    let shutdown = CancellationToken::new();

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
        signal_shutdown.cancel();
    });

    if let Err(e) = pool.run(shutdown).await {
        tracing::error!(error = %e, "worker pool exited with error");
        std::process::exit(1);
    }
}
