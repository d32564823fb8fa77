// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker-pool and runtime registry endpoints.

use super::{ApiError, AppState};
use axum::extract::State;
use axum::Json;
use baton_core::registry::component_key;
use baton_core::{
    Clock, Event, EventId, EventKind, Fault, RuntimeComponent, RuntimeKind, RuntimeStatus,
};
use baton_wire::{
    DeregisterRequest, HeartbeatRequest, HeartbeatResponse, MetricsReport, RegisterRequest,
    RegisterResponse,
};

pub async fn register_worker<C: Clock>(
    State(ctx): State<AppState<C>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let worker_id = register(&ctx, RuntimeKind::WorkerPool, &req)?;
    Ok(Json(RegisterResponse { worker_id }))
}

pub async fn register_runtime<C: Clock>(
    State(ctx): State<AppState<C>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let kind = req.kind.unwrap_or(RuntimeKind::Broker);
    let worker_id = register(&ctx, kind, &req)?;
    Ok(Json(RegisterResponse { worker_id }))
}

/// Heartbeat refreshes liveness in memory. An unknown worker is recreated
/// when the payload carries enough to rebuild the row (server restarts
/// would otherwise strand running pools).
pub async fn heartbeat<C: Clock>(
    State(ctx): State<AppState<C>>,
    Json(req): Json<HeartbeatRequest>,
) -> Result<Json<HeartbeatResponse>, ApiError> {
    let key = component_key(RuntimeKind::WorkerPool, &req.name);
    let now = ctx.clock.epoch_ms();

    let known = {
        let mut state = ctx.state.lock();
        match state.registry.get_mut(&key) {
            Some(row) => {
                row.heartbeat = now;
                row.updated_at = now;
                row.status = RuntimeStatus::Online;
                true
            }
            None => false,
        }
    };
    if known {
        return Ok(Json(HeartbeatResponse { ok: true }));
    }

    let Some(capacity) = req.capacity else {
        return Err(
            Fault::NotFound(format!("worker pool '{}' not registered", req.name)).into()
        );
    };
    let recreate = RegisterRequest {
        name: req.name.clone(),
        runtime: serde_json::json!({"recreated": true}),
        uri: req.uri.clone().unwrap_or_default(),
        capacity,
        capabilities: req.capabilities.clone().unwrap_or_default(),
        labels: Default::default(),
        pid: None,
        hostname: None,
        kind: None,
    };
    register(&ctx, RuntimeKind::WorkerPool, &recreate)?;
    tracing::info!(name = %req.name, "auto-recreated worker pool row on heartbeat");
    Ok(Json(HeartbeatResponse { ok: true }))
}

pub async fn deregister_worker<C: Clock>(
    State(ctx): State<AppState<C>>,
    Json(req): Json<DeregisterRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    deregister(&ctx, RuntimeKind::WorkerPool, &req.name)?;
    Ok(Json(serde_json::json!({"ok": true})))
}

pub async fn deregister_runtime<C: Clock>(
    State(ctx): State<AppState<C>>,
    Json(req): Json<DeregisterRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    deregister(&ctx, req.kind.unwrap_or(RuntimeKind::Broker), &req.name)?;
    Ok(Json(serde_json::json!({"ok": true})))
}

/// Accept a metrics snapshot. Observability export lives elsewhere; the
/// core only logs receipt.
pub async fn metrics_report<C: Clock>(
    State(_ctx): State<AppState<C>>,
    Json(report): Json<MetricsReport>,
) -> Json<serde_json::Value> {
    tracing::info!(name = %report.name, metrics = %report.metrics, "metrics report");
    Json(serde_json::json!({"ok": true}))
}

fn register<C: Clock>(
    ctx: &AppState<C>,
    kind: RuntimeKind,
    req: &RegisterRequest,
) -> Result<String, Fault> {
    if req.name.is_empty() {
        return Err(Fault::Validation("component name must not be empty".into()));
    }
    let now = ctx.clock.epoch_ms();

    // Keep a stable runtime id across re-registrations of the same name.
    let existing_id = ctx
        .state
        .lock()
        .registry
        .get(&component_key(kind, &req.name))
        .map(|row| row.runtime_id.clone());
    let runtime_id = existing_id.unwrap_or_else(|| format!("wkr-{}", ctx.ids.next()));

    let mut runtime = req.runtime.clone();
    if runtime.is_null() {
        runtime = serde_json::json!({});
    }
    if let serde_json::Value::Object(map) = &mut runtime {
        if let Some(pid) = req.pid {
            map.entry("pid").or_insert_with(|| pid.into());
        }
        if let Some(hostname) = &req.hostname {
            map.entry("hostname").or_insert_with(|| hostname.clone().into());
        }
    }

    let component = RuntimeComponent {
        runtime_id: runtime_id.clone(),
        name: req.name.clone(),
        kind,
        uri: req.uri.clone(),
        status: RuntimeStatus::Online,
        capabilities: req.capabilities.clone(),
        capacity: req.capacity,
        labels: req.labels.clone(),
        heartbeat: now,
        runtime,
        created_at: now,
        updated_at: now,
    };

    let mut event = Event::infra(EventKind::RuntimeRegistered { component });
    event.event_id = EventId(ctx.ids.next());
    event.timestamp = now;
    ctx.state.lock().apply_event(&event);
    ctx.bus
        .send(event)
        .map_err(|e| Fault::Retriable(format!("wal append failed: {e}")))?;

    Ok(runtime_id)
}

fn deregister<C: Clock>(ctx: &AppState<C>, kind: RuntimeKind, name: &str) -> Result<(), Fault> {
    let exists = ctx.state.lock().registry.contains_key(&component_key(kind, name));
    if !exists {
        return Err(Fault::NotFound(format!("{kind} '{name}' not registered")));
    }

    let mut event =
        Event::infra(EventKind::RuntimeDeregistered { kind, name: name.to_string() });
    event.event_id = EventId(ctx.ids.next());
    event.timestamp = ctx.clock.epoch_ms();
    ctx.state.lock().apply_event(&event);
    ctx.bus
        .send(event)
        .map_err(|e| Fault::Retriable(format!("wal append failed: {e}")))?;
    Ok(())
}
