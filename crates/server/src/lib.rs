// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Baton server: the event-driven orchestration engine, queue service,
//! runtime sweeper, and HTTP surface.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod engine;
pub mod env;
pub mod event_bus;
pub mod http;
pub mod lifecycle;
pub mod queue_service;
pub mod sweeper;

pub use engine::{Executor, Runtime, RuntimeError};
pub use event_bus::EventBus;
