// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for the server API.

use baton_core::{Event, Fault, QueueId, QueueJob};
use baton_wire::{
    AckRequest, DeregisterRequest, EmitAck, FailRequest, HeartbeatRequest, HeartbeatResponse,
    LeaseRequest, LeaseResponse, RegisterRequest, RegisterResponse, RenewRequest,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("server error ({status}): {fault}")]
    Api { status: u16, fault: Fault },
}

impl ClientError {
    /// Conflicts mean another owner won; the worker should stand down, not
    /// retry.
    pub fn is_conflict(&self) -> bool {
        matches!(self, ClientError::Api { fault: Fault::Conflict(_), .. })
    }

    pub fn is_retriable(&self) -> bool {
        match self {
            ClientError::Transport(_) => true,
            ClientError::Api { fault, .. } => matches!(fault, Fault::Retriable(_)),
        }
    }
}

#[derive(Clone)]
pub struct ApiClient {
    base: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base: base_url.into().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    async fn request<B: Serialize, T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let response = self
            .http
            .request(method, format!("{}{path}", self.base))
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let fault = response
            .json::<baton_wire::ErrorBody>()
            .await
            .map(|body| body.error)
            .unwrap_or_else(|_| Fault::Retriable(format!("http status {status}")));
        Err(ClientError::Api { status: status.as_u16(), fault })
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        self.request(reqwest::Method::POST, path, body).await
    }

    pub async fn register(&self, req: &RegisterRequest) -> Result<String, ClientError> {
        let response: RegisterResponse = self.post("/worker/pool/register", req).await?;
        Ok(response.worker_id)
    }

    pub async fn heartbeat(&self, req: &HeartbeatRequest) -> Result<bool, ClientError> {
        let response: HeartbeatResponse = self.post("/worker/pool/heartbeat", req).await?;
        Ok(response.ok)
    }

    pub async fn deregister(&self, name: &str) -> Result<(), ClientError> {
        let _: serde_json::Value = self
            .request(
                reqwest::Method::DELETE,
                "/worker/pool/deregister",
                &DeregisterRequest { name: name.to_string(), kind: None },
            )
            .await?;
        Ok(())
    }

    pub async fn lease(&self, req: &LeaseRequest) -> Result<Vec<QueueJob>, ClientError> {
        let response: LeaseResponse = self.post("/queue/lease", req).await?;
        Ok(response.jobs)
    }

    pub async fn ack(&self, queue_id: QueueId, req: &AckRequest) -> Result<(), ClientError> {
        let _: serde_json::Value = self.post(&format!("/queue/{queue_id}/ack"), req).await?;
        Ok(())
    }

    pub async fn fail(&self, queue_id: QueueId, req: &FailRequest) -> Result<(), ClientError> {
        let _: serde_json::Value = self.post(&format!("/queue/{queue_id}/fail"), req).await?;
        Ok(())
    }

    pub async fn renew(&self, queue_id: QueueId, req: &RenewRequest) -> Result<(), ClientError> {
        let _: serde_json::Value = self.post(&format!("/queue/{queue_id}/renew"), req).await?;
        Ok(())
    }

    pub async fn emit(&self, event: &Event) -> Result<EmitAck, ClientError> {
        self.post("/event/emit", event).await
    }
}
