// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::queue_service::QueueService;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use baton_core::test_support::SeqIds;
use baton_core::{FakeClock, IdGen};
use baton_storage::Wal;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

struct Api {
    _dir: tempfile::TempDir,
    router: Router,
    clock: FakeClock,
}

fn api() -> Api {
    let dir = tempfile::tempdir().unwrap();
    let clock = FakeClock::new();
    clock.set_epoch_ms(1_700_000_000_000);

    let wal = Wal::open(dir.path().join("events.wal"), 0).unwrap();
    let state = Arc::new(Mutex::new(MaterializedState::new()));
    let bus = EventBus::new(wal);
    let ids: Arc<dyn IdGen> = Arc::new(SeqIds::new(1));
    let queue = Arc::new(QueueService::new(
        Arc::clone(&state),
        bus.clone(),
        Arc::clone(&ids),
        clock.clone(),
    ));

    let ctx = AppState { state, bus, ids, clock: clock.clone(), queue };
    Api { _dir: dir, router: router(ctx), clock }
}

async fn send(router: &Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

fn linear_playbook() -> Value {
    json!({
        "path": "flows/linear",
        "steps": [{"step": "a", "tool": {"kind": "http", "spec": {}}}]
    })
}

#[tokio::test]
async fn health_responds() {
    let api = api();
    let (status, body) = send(&api.router, "GET", "/health", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn run_with_inline_playbook_and_summary() {
    let api = api();
    let (status, body) = send(
        &api.router,
        "POST",
        "/executions/run",
        json!({"playbook": linear_playbook(), "parameters": {"k": 1}}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "STARTED");
    let execution_id = body["execution_id"].as_str().unwrap().to_string();

    let (status, summary) =
        send(&api.router, "GET", &format!("/execution/{execution_id}"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["path"], "flows/linear");
    assert_eq!(summary["event_count"], 1);
}

#[tokio::test]
async fn run_accepts_legacy_field_names() {
    let api = api();
    // Register by inline submission first
    let (_, first) = send(
        &api.router,
        "POST",
        "/executions/run",
        json!({"playbook": linear_playbook()}),
    )
    .await;

    let (status, body) = send(
        &api.router,
        "POST",
        "/executions/run",
        json!({"playbook_id": "flows/linear", "input_payload": {"x": 1}}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["catalog_id"], first["catalog_id"], "same registered playbook");
}

#[tokio::test]
async fn run_unknown_path_is_404() {
    let api = api();
    let (status, body) =
        send(&api.router, "POST", "/executions/run", json!({"path": "flows/ghost"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["class"], "not_found");
}

#[tokio::test]
async fn run_invalid_inline_playbook_is_400() {
    let api = api();
    let (status, _) = send(
        &api.router,
        "POST",
        "/executions/run",
        json!({"playbook": {"path": "p", "steps": []}}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn emit_rejects_malformed_and_unknown() {
    let api = api();

    let (status, _) = send(
        &api.router,
        "POST",
        "/event/emit",
        json!({"execution_id": "1", "event_type": "nonsense"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &api.router,
        "POST",
        "/event/emit",
        json!({
            "execution_id": "424242",
            "event_type": "step_completed",
            "step": "a",
            "result": {}
        }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn emit_deduplicates_by_client_key() {
    let api = api();
    let (_, run) = send(
        &api.router,
        "POST",
        "/executions/run",
        json!({"playbook": linear_playbook()}),
    )
    .await;
    let execution_id = run["execution_id"].as_str().unwrap();

    let event = json!({
        "execution_id": execution_id,
        "event_type": "step_completed",
        "step": "a",
        "result": {"n": 1},
        "dedup_key": "client-7"
    });
    let (status, first) = send(&api.router, "POST", "/event/emit", event.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["ack"], true);

    let (status, second) = send(&api.router, "POST", "/event/emit", event).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["duplicate"], true);
    assert_eq!(second["event_id"], first["event_id"]);
}

#[tokio::test]
async fn worker_registration_heartbeat_and_deregistration() {
    let api = api();

    let (status, body) = send(
        &api.router,
        "POST",
        "/worker/pool/register",
        json!({"name": "pool-1", "uri": "http://w:0", "capacity": 4,
               "capabilities": ["http"], "pid": 42, "hostname": "h1"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["worker_id"].as_str().unwrap().starts_with("wkr-"));

    let (status, body) =
        send(&api.router, "POST", "/worker/pool/heartbeat", json!({"name": "pool-1"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);

    // Unknown worker without recreate payload
    let (status, _) =
        send(&api.router, "POST", "/worker/pool/heartbeat", json!({"name": "ghost"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Unknown worker with enough payload is auto-recreated
    let (status, _) = send(
        &api.router,
        "POST",
        "/worker/pool/heartbeat",
        json!({"name": "ghost", "capacity": 2, "uri": "http://g:0"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &api.router,
        "DELETE",
        "/worker/pool/deregister",
        json!({"name": "pool-1"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn queue_lease_and_ack_round_trip() {
    let api = api();
    send(
        &api.router,
        "POST",
        "/executions/run",
        json!({"playbook": linear_playbook()}),
    )
    .await;

    // No engine loop in these tests: dispatch the job by hand through the
    // queue service the way the engine's executor would.
    // (The run only wrote execution_start; lease must see nothing yet.)
    let (status, body) = send(
        &api.router,
        "POST",
        "/queue/lease",
        json!({"worker_id": "w1", "max": 4, "lease_duration_seconds": 30}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["jobs"].as_array().unwrap().len(), 0);

    let (status, _) = send(
        &api.router,
        "POST",
        "/queue/12345/ack",
        json!({"worker_id": "w1", "result": {}}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    api.clock.advance(std::time::Duration::from_secs(1));
    let (status, _) = send(&api.router, "POST", "/queue/not-a-number/fail", json!({"worker_id": "w1"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn metrics_report_is_accepted() {
    let api = api();
    let (status, body) = send(
        &api.router,
        "POST",
        "/metrics/report",
        json!({"name": "pool-1", "metrics": {"jobs_done": 10}}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
}
