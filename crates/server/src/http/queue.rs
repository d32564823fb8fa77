// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue endpoints: lease, ack, fail, renew.

use super::{ApiError, AppState};
use axum::extract::{Path, State};
use axum::Json;
use baton_core::{Clock, Fault, QueueId};
use baton_wire::{AckRequest, FailRequest, LeaseRequest, LeaseResponse, RenewRequest};

fn parse_queue_id(raw: &str) -> Result<QueueId, Fault> {
    raw.parse().map_err(|_| Fault::Validation(format!("bad queue id: {raw}")))
}

pub async fn lease<C: Clock>(
    State(ctx): State<AppState<C>>,
    Json(req): Json<LeaseRequest>,
) -> Result<Json<LeaseResponse>, ApiError> {
    let jobs = ctx.queue.lease(&req)?;
    Ok(Json(LeaseResponse { jobs }))
}

pub async fn ack<C: Clock>(
    State(ctx): State<AppState<C>>,
    Path(id): Path<String>,
    Json(req): Json<AckRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    ctx.queue.ack(parse_queue_id(&id)?, &req)?;
    Ok(Json(serde_json::json!({"ok": true})))
}

pub async fn fail<C: Clock>(
    State(ctx): State<AppState<C>>,
    Path(id): Path<String>,
    Json(req): Json<FailRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    ctx.queue.fail(parse_queue_id(&id)?, &req)?;
    Ok(Json(serde_json::json!({"ok": true})))
}

pub async fn renew<C: Clock>(
    State(ctx): State<AppState<C>>,
    Path(id): Path<String>,
    Json(req): Json<RenewRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let lease_until = ctx.queue.renew(parse_queue_id(&id)?, &req)?;
    Ok(Json(serde_json::json!({"ok": true, "lease_until": lease_until})))
}
