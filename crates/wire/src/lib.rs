// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP API types shared by the server and the worker runtime.
//!
//! All IDs cross the wire as strings. Legacy field names from the v1 API are
//! accepted through serde aliases and normalized here, so handlers only ever
//! see the unified shapes.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod execution;
mod queue;
mod runtime;

pub use execution::{
    EmitAck, ErrorBody, ExecutionRequest, ExecutionResponse, ExecutionStepSummary,
    ExecutionSummary,
};
pub use queue::{AckRequest, FailRequest, LeaseRequest, LeaseResponse, RenewRequest};
pub use runtime::{
    DeregisterRequest, HeartbeatRequest, HeartbeatResponse, MetricsReport, RegisterRequest,
    RegisterResponse,
};
