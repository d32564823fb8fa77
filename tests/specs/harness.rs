// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spec harness: in-process server + worker pool over loopback HTTP.

use baton_core::SystemClock;
use baton_server::http::router;
use baton_server::lifecycle::{startup, Config};
use baton_worker::{CallContext, ToolError, ToolExecutor, ToolRegistry, WorkerConfig, WorkerPool};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub struct TestServer {
    pub base_url: String,
    shutdown: CancellationToken,
    engine: tokio::task::JoinHandle<()>,
    http: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Boot a server over the given state directory.
    pub async fn start(state_dir: PathBuf) -> Self {
        let config = Config {
            lock_path: state_dir.join("server.pid"),
            wal_path: state_dir.join("wal").join("events.wal"),
            snapshot_path: state_dir.join("snapshot.bin"),
            log_path: state_dir.join("server.log"),
            listen_addr: "127.0.0.1:0".into(),
            state_dir,
        };
        let result = startup(config, SystemClock).expect("server startup");

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let base_url = format!("http://{addr}");

        let shutdown = CancellationToken::new();
        let http_shutdown = shutdown.clone();
        let app = router(result.api);
        let http = tokio::spawn(async move {
            let serve = axum::serve(listener, app)
                .with_graceful_shutdown(async move { http_shutdown.cancelled().await });
            let _ = serve.await;
        });
        let engine = tokio::spawn(result.server.run(shutdown.clone()));

        Self { base_url, shutdown, engine, http }
    }

    /// Graceful stop; releases the state-dir lock so a restart can take it.
    pub async fn stop(self) {
        self.shutdown.cancel();
        let _ = self.engine.await;
        let _ = self.http.await;
    }

    pub async fn run_playbook(&self, playbook: Value, parameters: Value) -> String {
        let response = reqwest::Client::new()
            .post(format!("{}/executions/run", self.base_url))
            .json(&serde_json::json!({"playbook": playbook, "parameters": parameters}))
            .send()
            .await
            .expect("run request");
        assert!(
            response.status().is_success(),
            "run failed: {}",
            response.text().await.unwrap_or_default()
        );
        let body: Value = response.json().await.expect("run body");
        body["execution_id"].as_str().expect("execution_id").to_string()
    }

    pub async fn summary(&self, execution_id: &str) -> Value {
        reqwest::Client::new()
            .get(format!("{}/execution/{execution_id}", self.base_url))
            .send()
            .await
            .expect("summary request")
            .json()
            .await
            .expect("summary body")
    }

    /// Poll until the execution reaches a terminal status.
    pub async fn wait_terminal(&self, execution_id: &str, timeout: Duration) -> Value {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let summary = self.summary(execution_id).await;
            let status = summary["status"].as_str().unwrap_or_default().to_string();
            if status == "COMPLETED" || status == "FAILED" {
                return summary;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for terminal status; last: {summary}"
            );
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    /// Spawn a worker pool against this server. Returns a guard that stops
    /// the pool when dropped-and-stopped.
    pub fn spawn_worker(&self, name: &str, registry: ToolRegistry) -> WorkerGuard {
        let config = WorkerConfig {
            server_url: self.base_url.clone(),
            name: name.to_string(),
            capacity: 4,
            poll_interval: Duration::from_millis(25),
            heartbeat_interval: Duration::from_secs(5),
            lease_duration: Duration::from_secs(30),
            ..WorkerConfig::default()
        };
        let pool = WorkerPool::new(config, registry);
        let shutdown = CancellationToken::new();
        let pool_shutdown = shutdown.clone();
        let handle = tokio::spawn(async move {
            let _ = pool.run(pool_shutdown).await;
        });
        WorkerGuard { shutdown, handle }
    }
}

pub struct WorkerGuard {
    shutdown: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
}

impl WorkerGuard {
    pub async fn stop(self) {
        self.shutdown.cancel();
        let _ = self.handle.await;
    }
}

/// Executor that pops scripted outcomes per call, then echoes the spec.
pub struct ScriptedExecutor {
    outcomes: parking_lot::Mutex<std::collections::VecDeque<Result<Value, String>>>,
}

impl ScriptedExecutor {
    pub fn new(outcomes: Vec<Result<Value, String>>) -> Arc<Self> {
        Arc::new(Self { outcomes: parking_lot::Mutex::new(outcomes.into_iter().collect()) })
    }
}

#[async_trait::async_trait]
impl ToolExecutor for ScriptedExecutor {
    async fn execute(&self, spec: &Value, _ctx: &CallContext) -> Result<Value, ToolError> {
        match self.outcomes.lock().pop_front() {
            Some(Ok(value)) => Ok(value),
            Some(Err(message)) => Err(ToolError::failed(message)),
            None => Ok(spec.clone()),
        }
    }
}
