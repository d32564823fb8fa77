// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The worker pool main loop.
//!
//! Register, heartbeat, lease, execute, report. Per-job tasks hold a
//! semaphore permit (bounded parallelism), renew their lease at half the
//! lease duration, and cancel cooperatively — with a grace window — when
//! renewal is refused or shutdown is requested.

use crate::client::{ApiClient, ClientError};
use crate::sanitize::sanitize_context;
use crate::tools::{CallContext, ToolError, ToolRegistry};
use baton_core::error::truncate_error;
use baton_core::{Event, EventKind, QueueJob};
use baton_wire::{AckRequest, FailRequest, HeartbeatRequest, LeaseRequest, RegisterRequest, RenewRequest};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub server_url: String,
    pub name: String,
    /// Maximum jobs in flight.
    pub capacity: usize,
    pub labels: std::collections::BTreeMap<String, String>,
    pub lease_duration: Duration,
    pub poll_interval: Duration,
    pub heartbeat_interval: Duration,
    /// Cooperative cancellation grace window.
    pub grace: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8873".into(),
            name: "worker".into(),
            capacity: 4,
            labels: Default::default(),
            lease_duration: Duration::from_secs(60),
            poll_interval: Duration::from_secs(1),
            heartbeat_interval: Duration::from_secs(15),
            grace: Duration::from_secs(10),
        }
    }
}

pub struct WorkerPool {
    client: Arc<ApiClient>,
    registry: Arc<ToolRegistry>,
    config: WorkerConfig,
}

impl WorkerPool {
    pub fn new(config: WorkerConfig, registry: ToolRegistry) -> Self {
        Self {
            client: Arc::new(ApiClient::new(config.server_url.clone())),
            registry: Arc::new(registry),
            config,
        }
    }

    /// Run until shutdown: register, then heartbeat + lease loops.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), ClientError> {
        let worker_id = self.register().await?;
        tracing::info!(worker_id, name = %self.config.name, "worker pool registered");

        let heartbeat = tokio::spawn(heartbeat_loop(
            Arc::clone(&self.client),
            self.config.clone(),
            shutdown.clone(),
        ));

        let semaphore = Arc::new(Semaphore::new(self.config.capacity));
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }

            let free = semaphore.available_permits();
            if free == 0 {
                continue;
            }

            let jobs = match self
                .client
                .lease(&LeaseRequest {
                    worker_id: worker_id.clone(),
                    max: free as u32,
                    lease_duration_seconds: self.config.lease_duration.as_secs(),
                    capability_filter: self.registry.kinds(),
                    labels: self.config.labels.clone(),
                })
                .await
            {
                Ok(jobs) => jobs,
                Err(e) => {
                    tracing::warn!(error = %e, "lease request failed");
                    continue;
                }
            };

            for job in jobs {
                let permit = match Arc::clone(&semaphore).try_acquire_owned() {
                    Ok(permit) => permit,
                    // More jobs than permits means the server over-leased;
                    // let the lease expire and return them.
                    Err(_) => break,
                };
                let client = Arc::clone(&self.client);
                let registry = Arc::clone(&self.registry);
                let config = self.config.clone();
                let worker_id = worker_id.clone();
                let cancel = shutdown.child_token();
                tokio::spawn(async move {
                    run_job(client, registry, config, worker_id, job, cancel).await;
                    drop(permit);
                });
            }
        }

        heartbeat.abort();
        if let Err(e) = self.client.deregister(&self.config.name).await {
            tracing::warn!(error = %e, "deregister failed on shutdown");
        }
        Ok(())
    }

    async fn register(&self) -> Result<String, ClientError> {
        let request = RegisterRequest {
            name: self.config.name.clone(),
            runtime: serde_json::json!({"type": "worker_pool"}),
            uri: String::new(),
            capacity: self.config.capacity as u32,
            capabilities: self.registry.kinds(),
            labels: self.config.labels.clone(),
            pid: Some(std::process::id()),
            hostname: hostname(),
            kind: None,
        };

        // Registration backs off but keeps trying: a worker that outlives a
        // server restart must come back on its own.
        let mut delay = Duration::from_millis(500);
        loop {
            match self.client.register(&request).await {
                Ok(worker_id) => return Ok(worker_id),
                Err(e) if e.is_retriable() => {
                    tracing::warn!(error = %e, "registration failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(Duration::from_secs(30));
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Heartbeat every interval; retry up to 5 times with backoff on failure,
/// then log and carry on. Heartbeat loss never stops leased work.
async fn heartbeat_loop(client: Arc<ApiClient>, config: WorkerConfig, shutdown: CancellationToken) {
    let request = HeartbeatRequest {
        name: config.name.clone(),
        uri: None,
        capacity: Some(config.capacity as u32),
        capabilities: None,
    };
    let mut ticker = tokio::time::interval(config.heartbeat_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let mut delay = Duration::from_millis(250);
        for attempt in 1..=5 {
            match client.heartbeat(&request).await {
                Ok(_) => break,
                Err(e) if attempt == 5 => {
                    tracing::warn!(error = %e, "heartbeat failed after 5 attempts; continuing");
                }
                Err(e) => {
                    tracing::debug!(error = %e, attempt, "heartbeat failed, retrying");
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }
}

/// Execute one leased job and report its outcome.
async fn run_job(
    client: Arc<ApiClient>,
    registry: Arc<ToolRegistry>,
    config: WorkerConfig,
    worker_id: String,
    job: QueueJob,
    cancel: CancellationToken,
) {
    let attempt = job.meta.retry.as_ref().map(|r| r.attempt_number).unwrap_or(1);
    // Safe snapshot for every event this job reports; the tool itself gets
    // the full render context.
    let snapshot = sanitize_context(&job.action.context);

    emit(
        &client,
        &job,
        EventKind::ActionStarted {
            step: job.node_id.clone(),
            queue_id: job.queue_id,
            attempt,
        },
        None,
        &snapshot,
    )
    .await;

    // Renew at half-lease while the tool runs; losing the renewal race
    // means another worker owns the row now, so cancel cooperatively.
    let renewer = tokio::spawn(renew_loop(
        Arc::clone(&client),
        worker_id.clone(),
        job.queue_id,
        config.lease_duration,
        cancel.clone(),
    ));

    let started = std::time::Instant::now();
    let outcome = execute_tool(&registry, &job, attempt, &config, &cancel).await;
    let duration_ms = started.elapsed().as_millis() as u64;
    renewer.abort();

    match outcome {
        Ok(result) => {
            emit(
                &client,
                &job,
                EventKind::ActionCompleted {
                    step: job.node_id.clone(),
                    queue_id: job.queue_id,
                    result: result.clone(),
                },
                Some(duration_ms),
                &snapshot,
            )
            .await;
            if let Err(e) = client
                .ack(job.queue_id, &AckRequest { worker_id, result })
                .await
            {
                // Lost the row (lease expiry / another worker): the engine
                // already owns the truth; nothing more to do.
                tracing::warn!(queue_id = %job.queue_id, error = %e, "ack rejected");
            }
        }
        Err(error) => {
            let message = truncate_error(&error.to_string());
            let stack_available =
                matches!(&error, ToolError::Failed { stack: Some(_), .. });
            emit(
                &client,
                &job,
                EventKind::ActionFailed {
                    step: job.node_id.clone(),
                    queue_id: job.queue_id,
                    error: message.clone(),
                    reason: error.reason().map(String::from),
                    will_retry: false,
                    stack_available,
                },
                Some(duration_ms),
                &snapshot,
            )
            .await;
            let permanent = matches!(error, ToolError::Cancelled);
            if let Err(e) = client
                .fail(
                    job.queue_id,
                    &FailRequest {
                        worker_id,
                        error: Some(message),
                        // Tool failures are the engine's retry decision, not
                        // the queue's.
                        retry: Some(false),
                        retry_delay_seconds: None,
                        permanent: Some(permanent),
                    },
                )
                .await
            {
                tracing::warn!(queue_id = %job.queue_id, error = %e, "fail report rejected");
            }
        }
    }
}

/// Dispatch to the executor with timeout and cooperative cancellation.
async fn execute_tool(
    registry: &ToolRegistry,
    job: &QueueJob,
    attempt: u32,
    config: &WorkerConfig,
    cancel: &CancellationToken,
) -> Result<Value, ToolError> {
    let Some(executor) = registry.get(&job.action.kind) else {
        return Err(ToolError::failed(format!(
            "no executor registered for kind '{}'",
            job.action.kind
        )));
    };

    let ctx = CallContext {
        execution_id: job.execution_id,
        queue_id: job.queue_id,
        node_id: job.node_id.clone(),
        attempt,
        context: job.action.context.clone(),
    };

    let work = executor.execute(&job.action.spec, &ctx);
    tokio::pin!(work);

    let deadline = job
        .action
        .timeout_secs
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(24 * 3600));

    tokio::select! {
        result = &mut work => result,
        _ = tokio::time::sleep(deadline) => Err(ToolError::Timeout),
        _ = cancel.cancelled() => {
            // Grace window: let the tool wind down before reporting
            // cancellation.
            tokio::select! {
                result = &mut work => result,
                _ = tokio::time::sleep(config.grace) => Err(ToolError::Cancelled),
            }
        }
    }
}

/// Renew the lease at half its duration until aborted or refused.
async fn renew_loop(
    client: Arc<ApiClient>,
    worker_id: String,
    queue_id: baton_core::QueueId,
    lease_duration: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(lease_duration / 2);
    ticker.tick().await; // immediate first tick
    loop {
        ticker.tick().await;
        let request = RenewRequest {
            worker_id: worker_id.clone(),
            lease_duration_seconds: lease_duration.as_secs(),
        };
        match client.renew(queue_id, &request).await {
            Ok(()) => {}
            Err(e) if e.is_conflict() => {
                tracing::warn!(%queue_id, "lease lost, cancelling job");
                cancel.cancel();
                return;
            }
            Err(e) => tracing::debug!(%queue_id, error = %e, "lease renewal failed"),
        }
    }
}

/// Emit an event carrying retry linkage and the sanitized context snapshot.
async fn emit(
    client: &ApiClient,
    job: &QueueJob,
    kind: EventKind,
    duration_ms: Option<u64>,
    snapshot: &Value,
) {
    let mut event = Event::new(job.execution_id, kind)
        .with_node(&job.node_id)
        .with_context(snapshot.clone());
    event.parent_execution_id = job.parent_execution_id;
    event.duration_ms = duration_ms;
    if let Some(retry) = &job.meta.retry {
        event.parent_event_id = Some(retry.parent_event_id);
    }
    if let Err(e) = client.emit(&event).await {
        tracing::warn!(error = %e, event = event.event_type(), "event emission failed");
    }
}

fn hostname() -> Option<String> {
    std::env::var("HOSTNAME").ok()
}
