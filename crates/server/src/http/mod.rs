// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP surface: the only way anything outside the server process talks to
//! the engine.

mod events;
mod executions;
mod queue;
mod registry;

use crate::event_bus::EventBus;
use crate::queue_service::QueueService;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use baton_core::{Clock, Fault, IdGen};
use baton_storage::MaterializedState;
use baton_wire::ErrorBody;
use parking_lot::Mutex;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared handler context.
pub struct AppState<C: Clock> {
    pub state: Arc<Mutex<MaterializedState>>,
    pub bus: EventBus,
    pub ids: Arc<dyn IdGen>,
    pub clock: C,
    pub queue: Arc<QueueService<C>>,
}

impl<C: Clock> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            bus: self.bus.clone(),
            ids: Arc::clone(&self.ids),
            clock: self.clock.clone(),
            queue: Arc::clone(&self.queue),
        }
    }
}

/// API error: a [`Fault`] with its HTTP mapping.
pub struct ApiError(pub Fault);

impl From<Fault> for ApiError {
    fn from(fault: Fault) -> Self {
        Self(fault)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Fault::Validation(_) => StatusCode::BAD_REQUEST,
            Fault::NotFound(_) => StatusCode::NOT_FOUND,
            Fault::Conflict(_) => StatusCode::CONFLICT,
            Fault::Retriable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Fault::Tool(_) | Fault::Timeout(_) | Fault::Cancelled(_) => StatusCode::BAD_GATEWAY,
            Fault::Fatal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "fatal API error");
        }
        (status, Json(ErrorBody { error: self.0 })).into_response()
    }
}

/// Build the API router.
pub fn router<C: Clock>(ctx: AppState<C>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/event/emit", post(events::emit::<C>))
        .route("/executions/run", post(executions::run::<C>))
        .route("/execution/:id", get(executions::summary::<C>))
        .route("/queue/lease", post(queue::lease::<C>))
        .route("/queue/:id/ack", post(queue::ack::<C>))
        .route("/queue/:id/fail", post(queue::fail::<C>))
        .route("/queue/:id/renew", post(queue::renew::<C>))
        .route("/worker/pool/register", post(registry::register_worker::<C>))
        .route("/worker/pool/heartbeat", post(registry::heartbeat::<C>))
        .route("/worker/pool/deregister", delete(registry::deregister_worker::<C>))
        .route("/runtime/register", post(registry::register_runtime::<C>))
        .route("/runtime/deregister", delete(registry::deregister_runtime::<C>))
        .route("/metrics/report", post(registry::metrics_report::<C>))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
