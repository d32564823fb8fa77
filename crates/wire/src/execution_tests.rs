// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;
use yare::parameterized;

#[test]
fn accepts_new_field_names() {
    let req: ExecutionRequest = serde_json::from_value(json!({
        "path": "flows/linear",
        "version": "2",
        "parameters": {"city": "berlin"},
        "type": "manual",
        "timestamp": "2026-01-01T00:00:00Z"
    }))
    .unwrap();

    assert_eq!(req.path.as_deref(), Some("flows/linear"));
    assert_eq!(req.version.as_deref(), Some("2"));
    assert_eq!(req.parameters, Some(json!({"city": "berlin"})));
    assert_eq!(req.type_.as_deref(), Some("manual"));
}

#[parameterized(
    playbook_id = { json!({"playbook_id": "flows/legacy"}) },
    path = { json!({"path": "flows/legacy"}) },
)]
fn legacy_playbook_id_aliases_path(body: serde_json::Value) {
    let req: ExecutionRequest = serde_json::from_value(body).unwrap();
    assert_eq!(req.path.as_deref(), Some("flows/legacy"));
}

#[test]
fn legacy_input_payload_aliases_parameters() {
    let req: ExecutionRequest = serde_json::from_value(json!({
        "playbook_id": "p",
        "input_payload": {"a": 1},
        "execution_type": "scheduled",
        "start_time": "now"
    }))
    .unwrap();
    assert_eq!(req.parameters, Some(json!({"a": 1})));
    assert_eq!(req.type_.as_deref(), Some("scheduled"));
    assert_eq!(req.timestamp.as_deref(), Some("now"));
}

#[test]
fn execution_ids_serialize_as_strings() {
    let resp = ExecutionResponse {
        execution_id: baton_core::ExecutionId(901),
        catalog_id: "17".into(),
        path: "p".into(),
        status: baton_core::ExecutionStatus::Started,
        timestamp: 5,
    };
    let v = serde_json::to_value(&resp).unwrap();
    assert_eq!(v["execution_id"], json!("901"));
    assert_eq!(v["status"], json!("STARTED"));
}

#[test]
fn emit_ack_omits_duplicate_flag_when_false() {
    let ack = EmitAck { event_id: baton_core::EventId(3), ack: true, duplicate: false };
    let v = serde_json::to_value(&ack).unwrap();
    assert_eq!(v.get("duplicate"), None);

    let dup = EmitAck { event_id: baton_core::EventId(3), ack: true, duplicate: true };
    assert_eq!(serde_json::to_value(&dup).unwrap()["duplicate"], json!(true));
}
