// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `POST /executions/run` and `GET /execution/{id}`.

use super::{ApiError, AppState};
use axum::extract::{Path, State};
use axum::Json;
use baton_core::value::deep_merge;
use baton_core::{
    CatalogId, Clock, Event, EventId, EventKind, ExecutionId, ExecutionStatus, Fault,
};
use baton_playbook::Playbook;
use baton_storage::PlaybookEntry;
use baton_wire::{ExecutionRequest, ExecutionResponse, ExecutionStepSummary, ExecutionSummary};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Start a new execution.
///
/// The playbook is located by `catalog_id`, by `path` (+ optional
/// `version`, defaulting to the latest registered), or registered inline
/// from the `playbook` field. The request workload overrides the playbook's
/// declared defaults key-by-key.
pub async fn run<C: Clock>(
    State(ctx): State<AppState<C>>,
    Json(req): Json<ExecutionRequest>,
) -> Result<Json<ExecutionResponse>, ApiError> {
    let entry = resolve_playbook(&ctx, &req)?;

    let mut workload = entry
        .document
        .get("workload")
        .cloned()
        .unwrap_or_else(|| Value::Object(Default::default()));
    if let Some(parameters) = &req.parameters {
        deep_merge(&mut workload, parameters.clone());
    }

    let parent_execution_id = match &req.parent_execution_id {
        Some(raw) => Some(
            raw.parse::<ExecutionId>()
                .map_err(|_| Fault::Validation(format!("bad parent_execution_id: {raw}")))?,
        ),
        None => None,
    };

    let execution_id = ExecutionId(ctx.ids.next());
    let mut event = Event::new(
        execution_id,
        EventKind::ExecutionStart {
            catalog_id: entry.catalog_id,
            path: entry.path.clone(),
            workload,
        },
    );
    event.event_id = EventId(ctx.ids.next());
    event.timestamp = ctx.clock.epoch_ms();
    event.parent_execution_id = parent_execution_id;

    ctx.state.lock().apply_event(&event);
    let timestamp = event.timestamp;
    ctx.bus
        .send(event)
        .map_err(|e| Fault::Retriable(format!("wal append failed: {e}")))?;

    Ok(Json(ExecutionResponse {
        execution_id,
        catalog_id: entry.catalog_id.to_string(),
        path: entry.path,
        status: ExecutionStatus::Started,
        timestamp,
    }))
}

/// Current aggregate status and per-step summary.
pub async fn summary<C: Clock>(
    State(ctx): State<AppState<C>>,
    Path(id): Path<String>,
) -> Result<Json<ExecutionSummary>, ApiError> {
    let execution_id: ExecutionId = id
        .parse()
        .map_err(|_| Fault::Validation(format!("bad execution id: {id}")))?;

    let state = ctx.state.lock();
    let record = state
        .execution(execution_id)
        .ok_or_else(|| Fault::NotFound(format!("execution {execution_id} not found")))?;

    let mut steps: Vec<ExecutionStepSummary> = state
        .projection(execution_id)
        .map(|projection| {
            projection
                .steps
                .iter()
                .map(|(name, step)| ExecutionStepSummary {
                    step: name.clone(),
                    phase: step.phase,
                    error: step.error.clone(),
                    attempts: step.attempts,
                    started_at: step.started_at,
                    finished_at: step.finished_at,
                })
                .collect()
        })
        .unwrap_or_default();
    steps.sort_by(|a, b| a.step.cmp(&b.step));

    Ok(Json(ExecutionSummary {
        execution_id,
        parent_execution_id: record.parent_execution_id,
        catalog_id: record.catalog_id.to_string(),
        path: record.path.clone(),
        status: record.status,
        start_time: record.start_time,
        end_time: record.end_time,
        error: record.error.clone(),
        steps,
        event_count: state.log(execution_id).len(),
    }))
}

/// Find (or inline-register) the playbook the request names.
fn resolve_playbook<C: Clock>(
    ctx: &AppState<C>,
    req: &ExecutionRequest,
) -> Result<PlaybookEntry, Fault> {
    if let Some(raw) = &req.catalog_id {
        let catalog_id: CatalogId = raw
            .parse()
            .map_err(|_| Fault::Validation(format!("bad catalog_id: {raw}")))?;
        return ctx
            .state
            .lock()
            .catalog
            .get(&catalog_id)
            .cloned()
            .ok_or_else(|| Fault::NotFound(format!("catalog entry {catalog_id} not found")));
    }

    if let Some(document) = &req.playbook {
        return register_inline(ctx, document.clone());
    }

    let Some(path) = &req.path else {
        return Err(Fault::Validation(
            "one of catalog_id, path, or playbook is required".into(),
        ));
    };
    let state = ctx.state.lock();
    let entry = match &req.version {
        Some(version) => state.find_catalog(path, version).cloned(),
        None => state.latest_catalog(path).cloned(),
    };
    entry.ok_or_else(|| Fault::NotFound(format!("playbook '{path}' not found")))
}

/// Register an inline playbook document, content-addressed so repeat
/// submissions reuse the existing catalog entry.
fn register_inline<C: Clock>(
    ctx: &AppState<C>,
    document: Value,
) -> Result<PlaybookEntry, Fault> {
    // Validation up front: a bad document is the caller's error.
    let playbook = Playbook::from_value(document.clone())
        .map_err(|e| Fault::Validation(e.to_string()))?;

    let canonical = serde_json::to_string(&document)
        .map_err(|e| Fault::Validation(format!("unserializable playbook: {e}")))?;
    let content_hash = format!("{:x}", Sha256::digest(canonical.as_bytes()));

    {
        let state = ctx.state.lock();
        if let Some(existing) =
            state.catalog.values().find(|e| e.content_hash == content_hash)
        {
            return Ok(existing.clone());
        }
    }

    let catalog_id = CatalogId(ctx.ids.next());
    let path = if playbook.path.is_empty() {
        format!("inline/{content_hash:.12}")
    } else {
        playbook.path.clone()
    };
    let mut event = Event::infra(EventKind::PlaybookRegistered {
        catalog_id,
        path: path.clone(),
        version: playbook.version.clone(),
        content_hash,
        document,
    });
    event.event_id = EventId(ctx.ids.next());
    event.timestamp = ctx.clock.epoch_ms();

    ctx.state.lock().apply_event(&event);
    ctx.bus
        .send(event)
        .map_err(|e| Fault::Retriable(format!("wal append failed: {e}")))?;

    let state = ctx.state.lock();
    state
        .catalog
        .get(&catalog_id)
        .cloned()
        .ok_or_else(|| Fault::Fatal("catalog entry vanished after registration".into()))
}
