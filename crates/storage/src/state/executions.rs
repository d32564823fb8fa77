// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution and step-projection event handlers.

use super::MaterializedState;
use baton_core::value::deep_merge;
use baton_core::{
    Event, EventKind, ExecutionRecord, ExecutionStatus, LoopProgress, StepPhase,
};

pub(crate) fn apply(state: &mut MaterializedState, event: &Event) {
    match &event.kind {
        EventKind::ExecutionStart { catalog_id, path, workload } => {
            // A sub-playbook start claims its parent step: the parent's
            // completion waits on the child's terminal event.
            if let (Some(parent), Some(node)) = (event.parent_execution_id, &event.node_id) {
                if let Some(parent_projection) = state.projections.get_mut(&parent) {
                    let step_state = parent_projection.step_mut(node);
                    if !step_state.phase.is_terminal() {
                        step_state.phase = StepPhase::Leased;
                    }
                }
            }
            // Idempotency: first start wins
            state.executions.entry(event.execution_id).or_insert_with(|| ExecutionRecord {
                execution_id: event.execution_id,
                parent_execution_id: event.parent_execution_id,
                parent_step: event.node_id.clone(),
                catalog_id: *catalog_id,
                path: path.clone(),
                status: ExecutionStatus::Started,
                start_time: event.timestamp,
                end_time: None,
                workload: workload.clone(),
                error: None,
            });
        }

        EventKind::StepStarted { step, bound } => {
            if let Some(record) = state.executions.get_mut(&event.execution_id) {
                if record.status == ExecutionStatus::Started {
                    record.status = ExecutionStatus::Running;
                }
            }
            if let Some(projection) = state.projections.get_mut(&event.execution_id) {
                if !bound.is_null() {
                    deep_merge(&mut projection.vars, bound.clone());
                }
                let step_state = projection.step_mut(step);
                if step_state.started_at.is_none() {
                    step_state.started_at = Some(event.timestamp);
                }
            }
        }

        EventKind::CallDelivered { step, args } => {
            if let Some(projection) = state.projections.get_mut(&event.execution_id) {
                let step_state = projection.step_mut(step);
                // Dispatches to a finished step are dropped; the buffer no
                // longer matters and must not resurrect it.
                if !step_state.phase.is_terminal() {
                    deep_merge(&mut step_state.call, args.clone());
                }
            }
        }

        EventKind::ActionStarted { step, attempt, .. } => {
            if let Some(projection) = state.projections.get_mut(&event.execution_id) {
                let step_state = projection.step_mut(step);
                step_state.attempts = step_state.attempts.max(*attempt);
            }
        }

        EventKind::ActionCompleted { step, queue_id, result } => {
            // Chain bookkeeping feeds on_success aggregation; iterator
            // children keep their results in the loop progress instead.
            let is_child = state
                .queue
                .get(queue_id)
                .map(|job| job.meta.iterator.is_some())
                .unwrap_or(false);
            if is_child {
                return;
            }
            if let Some(projection) = state.projections.get_mut(&event.execution_id) {
                let step_state = projection.step_mut(step);
                // Re-runs of the same row (lease loss) collapse into one
                // attempt.
                if step_state.chain.iter().all(|a| a.queue_id != *queue_id) {
                    step_state.chain.push(baton_core::projection::ChainAttempt {
                        event_id: event.event_id,
                        queue_id: *queue_id,
                        result: result.clone(),
                    });
                }
            }
        }

        EventKind::StepCompleted { step, result } => {
            if let Some(projection) = state.projections.get_mut(&event.execution_id) {
                let step_state = projection.step_mut(step);
                if step_state.phase != StepPhase::Done {
                    step_state.phase = StepPhase::Done;
                    step_state.result = Some(result.clone());
                    step_state.finished_at = Some(event.timestamp);
                }
            }
        }

        EventKind::StepFailed { step, error } => {
            if let Some(projection) = state.projections.get_mut(&event.execution_id) {
                let step_state = projection.step_mut(step);
                // A step that already completed keeps its result; late
                // failures (expired duplicates) must not kill it.
                if step_state.phase != StepPhase::Done {
                    step_state.phase = StepPhase::Dead;
                    step_state.error = Some(error.clone());
                    step_state.finished_at = Some(event.timestamp);
                }
            }
        }

        EventKind::IteratorStarted { step, total, mode, concurrency, .. } => {
            if let Some(projection) = state.projections.get_mut(&event.execution_id) {
                let step_state = projection.step_mut(step);
                if step_state.loop_progress.is_none() {
                    step_state.loop_progress =
                        Some(LoopProgress::new(*total, *mode, *concurrency));
                }
                step_state.phase = StepPhase::Leased;
                if step_state.started_at.is_none() {
                    step_state.started_at = Some(event.timestamp);
                }
            }
        }

        EventKind::IterationCompleted { step, index, result } => {
            if let Some(projection) = state.projections.get_mut(&event.execution_id) {
                if let Some(progress) = projection.step_mut(step).loop_progress.as_mut() {
                    progress.record_success(*index, result.clone());
                }
            }
        }

        EventKind::IterationFailed { step, index, error } => {
            if let Some(projection) = state.projections.get_mut(&event.execution_id) {
                if let Some(progress) = projection.step_mut(step).loop_progress.as_mut() {
                    progress.record_failure(*index, error.clone());
                }
            }
        }

        EventKind::IteratorCompleted { step, .. } => {
            if let Some(projection) = state.projections.get_mut(&event.execution_id) {
                if let Some(progress) = projection.step_mut(step).loop_progress.as_mut() {
                    progress.try_emit();
                }
            }
        }

        EventKind::ExecutionComplete { status, error } => {
            if let Some(record) = state.executions.get_mut(&event.execution_id) {
                if !record.status.is_terminal() {
                    record.status = *status;
                    record.end_time = Some(event.timestamp);
                    record.error = error.clone();
                }
            }
        }

        EventKind::ExecutionAbort { reason } => {
            if let Some(record) = state.executions.get_mut(&event.execution_id) {
                if !record.status.is_terminal() {
                    record.status = ExecutionStatus::Failed;
                    record.end_time = Some(event.timestamp);
                    record.error =
                        Some(reason.clone().unwrap_or_else(|| "aborted".to_string()));
                }
            }
        }

        EventKind::ExecutionPaused => {
            if let Some(record) = state.executions.get_mut(&event.execution_id) {
                if !record.status.is_terminal() {
                    record.status = ExecutionStatus::Paused;
                }
            }
        }

        EventKind::ExecutionResumed => {
            if let Some(record) = state.executions.get_mut(&event.execution_id) {
                if record.status == ExecutionStatus::Paused {
                    record.status = ExecutionStatus::Running;
                }
            }
        }

        _ => {}
    }
}
