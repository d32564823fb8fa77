// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `POST /event/emit` — the worker-facing event ingest.

use super::{ApiError, AppState};
use axum::extract::State;
use axum::Json;
use baton_core::{Clock, Event, EventId, EventKind, Fault};
use baton_wire::EmitAck;
use serde_json::Value;

/// Ingest one event.
///
/// Fills `event_id`/`timestamp` when absent, enforces the execution
/// existence rule (only `execution_start` may introduce a new execution),
/// and recognizes client dedup keys: a duplicate returns the original event
/// id instead of persisting a second record.
pub async fn emit<C: Clock>(
    State(ctx): State<AppState<C>>,
    Json(body): Json<Value>,
) -> Result<Json<EmitAck>, ApiError> {
    let mut event: Event = serde_json::from_value(body)
        .map_err(|e| Fault::Validation(format!("malformed event: {e}")))?;

    if event.is_execution_scoped() && event.execution_id.is_none() {
        return Err(Fault::Validation("event is missing execution_id".into()).into());
    }

    // Heartbeats refresh liveness in memory; they are not part of any
    // execution's durable log.
    if let EventKind::WorkerHeartbeat { name } = &event.kind {
        let name = name.clone();
        let touched = touch_worker_heartbeat(&ctx, &name);
        if !touched {
            return Err(Fault::NotFound(format!("worker pool '{name}' not registered")).into());
        }
        return Ok(Json(EmitAck { event_id: event.event_id, ack: true, duplicate: false }));
    }

    {
        let state = ctx.state.lock();

        if !matches!(event.kind, EventKind::ExecutionStart { .. })
            && event.is_execution_scoped()
            && state.execution(event.execution_id).is_none()
        {
            return Err(
                Fault::NotFound(format!("execution {} not found", event.execution_id)).into()
            );
        }

        if let Some(key) = &event.dedup_key {
            if let Some(original) = state.dedup_hit(event.execution_id, key) {
                return Ok(Json(EmitAck { event_id: original, ack: true, duplicate: true }));
            }
        }
    }

    if event.event_id.is_none() {
        event.event_id = EventId(ctx.ids.next());
    }
    if event.timestamp == 0 {
        event.timestamp = ctx.clock.epoch_ms();
    }

    ctx.state.lock().apply_event(&event);
    let event_id = event.event_id;
    ctx.bus
        .send(event)
        .map_err(|e| Fault::Retriable(format!("wal append failed: {e}")))?;

    Ok(Json(EmitAck { event_id, ack: true, duplicate: false }))
}

fn touch_worker_heartbeat<C: Clock>(ctx: &AppState<C>, name: &str) -> bool {
    let key = baton_core::registry::component_key(baton_core::RuntimeKind::WorkerPool, name);
    let now = ctx.clock.epoch_ms();
    let mut state = ctx.state.lock();
    match state.registry.get_mut(&key) {
        Some(row) => {
            row.heartbeat = now;
            row.updated_at = now;
            row.status = baton_core::RuntimeStatus::Online;
            true
        }
        None => false,
    }
}
