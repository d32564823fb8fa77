// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue event handlers.
//!
//! Transitions are guarded by the current status so replays and the
//! ingest/engine double-apply are no-ops.

use super::MaterializedState;
use baton_core::{Event, EventKind, QueueJob, QueueStatus, RetryKind, StepPhase};

pub(crate) fn apply(state: &mut MaterializedState, event: &Event) {
    match &event.kind {
        EventKind::QueueEnqueued { job } => {
            // Idempotency: the row is immutable once inserted
            if state.queue.contains_key(&job.queue_id) {
                return;
            }
            state.queue.insert(job.queue_id, job.clone());
            set_step_phase(state, job, initial_phase(job));
        }

        EventKind::QueueLeased { queue_id, worker_id, lease_until } => {
            let Some(job) = state.queue.get_mut(queue_id) else { return };
            if job.status != QueueStatus::Queued {
                return;
            }
            job.status = QueueStatus::Leased;
            job.worker_id = Some(worker_id.clone());
            job.lease_until = Some(*lease_until);
            job.attempts += 1;
            let job = job.clone();
            set_step_phase(state, &job, StepPhase::Leased);
        }

        EventKind::QueueLeaseRenewed { queue_id, lease_until } => {
            if let Some(job) = state.queue.get_mut(queue_id) {
                if job.status == QueueStatus::Leased {
                    job.lease_until = Some(*lease_until);
                }
            }
        }

        EventKind::QueueAcked { queue_id, .. } => {
            if let Some(job) = state.queue.get_mut(queue_id) {
                if job.status == QueueStatus::Leased {
                    job.status = QueueStatus::Done;
                    job.lease_until = None;
                }
            }
        }

        EventKind::QueueFailed { queue_id, .. } => {
            if let Some(job) = state.queue.get_mut(queue_id) {
                if !job.status.is_terminal() {
                    job.status = QueueStatus::Failed;
                    job.lease_until = None;
                }
            }
        }

        EventKind::QueueDead { queue_id, .. } => {
            if let Some(job) = state.queue.get_mut(queue_id) {
                if !job.status.is_terminal() {
                    job.status = QueueStatus::Dead;
                    job.lease_until = None;
                }
            }
        }

        EventKind::QueueRequeued { queue_id } => {
            let Some(job) = state.queue.get_mut(queue_id) else { return };
            if job.status != QueueStatus::Leased {
                return;
            }
            job.status = QueueStatus::Queued;
            job.worker_id = None;
            job.lease_until = None;
            job.available_at = event.timestamp;
            let job = job.clone();
            set_step_phase(state, &job, StepPhase::Ready);
        }

        EventKind::QueueAdvanced { queue_id, available_at } => {
            if let Some(job) = state.queue.get_mut(queue_id) {
                if job.status == QueueStatus::Queued {
                    job.available_at = *available_at;
                }
            }
        }

        _ => {}
    }
}

/// Phase a freshly enqueued row puts its step in.
fn initial_phase(job: &QueueJob) -> StepPhase {
    match &job.meta.retry {
        Some(retry) if retry.kind == RetryKind::OnError => StepPhase::RetryPending,
        _ => StepPhase::Ready,
    }
}

/// Reflect a queue transition in the owning step's phase.
///
/// Iterator children do not drive their parent step's phase — the iterator
/// events own it — and finished steps stay finished.
fn set_step_phase(state: &mut MaterializedState, job: &QueueJob, phase: StepPhase) {
    if job.meta.iterator.is_some() {
        return;
    }
    if let Some(projection) = state.projections.get_mut(&job.execution_id) {
        let step_state = projection.step_mut(&job.node_id);
        if !step_state.phase.is_terminal() {
            step_state.phase = phase;
        }
    }
}
