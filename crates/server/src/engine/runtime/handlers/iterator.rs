// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Iterator expansion, window advancement, and the join.

use crate::engine::error::RuntimeError;
use crate::engine::runtime::Runtime;
use baton_core::{
    Clock, Effect, Event, EventKind, ExecutionRecord, IteratorMeta, JobAction, JobSpec,
    QueueStatus, DEFERRED_AVAILABLE_AT,
};
use baton_playbook::{item_scope, render_deep, LoopSpec, StepDef};
use serde_json::Value;

impl<C: Clock> Runtime<C> {
    /// Expand a loop step into child queue rows.
    ///
    /// All children are created up front; the concurrency cap is enforced by
    /// deferring the availability of the excess (`available_at` far future)
    /// and advancing one row per settled child. Sequential mode is the same
    /// window with size 1.
    pub(crate) fn expand_iterator(
        &self,
        record: &ExecutionRecord,
        step: &StepDef,
        spec: &LoopSpec,
        scope: &Value,
    ) -> Result<Vec<Effect>, RuntimeError> {
        let items =
            baton_playbook::shape_collection(spec, self.templater(), scope, &step.step)?;
        let total = items.len();
        let concurrency = spec.effective_concurrency();

        let mut effects = vec![Effect::Emit {
            event: self
                .event(
                    record.execution_id,
                    EventKind::IteratorStarted {
                        step: step.step.clone(),
                        total,
                        mode: spec.mode,
                        concurrency,
                        chunk_size: spec.chunk,
                    },
                )
                .with_node(&step.step),
        }];

        // Empty collection: the join settles immediately.
        if total == 0 {
            effects.push(Effect::Emit {
                event: self
                    .event(
                        record.execution_id,
                        EventKind::IteratorCompleted {
                            step: step.step.clone(),
                            items: vec![],
                            count: 0,
                            errors: vec![],
                        },
                    )
                    .with_node(&step.step),
            });
            return Ok(effects);
        }

        let Some(tool) = &step.tool else {
            // A loop without a tool maps items straight through.
            for (index, item) in items.iter().enumerate() {
                effects.push(Effect::Emit {
                    event: self
                        .event(
                            record.execution_id,
                            EventKind::IterationCompleted {
                                step: step.step.clone(),
                                index,
                                result: item.clone(),
                            },
                        )
                        .with_node(&step.step),
                });
            }
            return Ok(effects);
        };

        let mut specs = Vec::with_capacity(total);
        for (index, item) in items.into_iter().enumerate() {
            let child_scope = item_scope(spec, scope, &item, index);
            let rendered =
                render_deep(self.templater(), &tool.spec, &child_scope).map_err(|source| {
                    RuntimeError::Template {
                        execution: record.execution_id,
                        step: step.step.clone(),
                        source,
                    }
                })?;

            let mut job = JobSpec::new(
                record.execution_id,
                &step.step,
                JobAction {
                    kind: tool.kind.clone(),
                    spec: rendered,
                    timeout_secs: tool.timeout.map(|s| s.ceil() as u64),
                    context: child_scope,
                },
            );
            job.parent_execution_id = Some(record.execution_id);
            job.meta.iterator = Some(IteratorMeta {
                step: step.step.clone(),
                index,
                total,
                element: spec.element.clone(),
                mode: spec.mode,
            });
            job.meta.dedup_key =
                Some(format!("{}:{}:i{}", record.execution_id, step.step, index));
            if index >= concurrency as usize {
                job.available_at = Some(DEFERRED_AVAILABLE_AT);
            }
            specs.push(job);
        }
        effects.push(Effect::EnqueueBatch { specs });
        Ok(effects)
    }

    /// A child settled: advance the availability window, then join if all
    /// children have settled.
    pub(crate) fn handle_iteration_terminal(
        &self,
        event: &Event,
        step: &str,
    ) -> Result<Vec<Event>, RuntimeError> {
        let record = self.require_execution(event.execution_id)?;
        if !self.is_live(&record) {
            return Ok(vec![]);
        }

        let mut effects = Vec::new();

        // Release the next deferred child, lowest index first.
        let next_deferred = self.lock_state(|state| {
            state
                .queue
                .values()
                .filter(|job| {
                    job.execution_id == event.execution_id
                        && job.status == QueueStatus::Queued
                        && job.available_at == DEFERRED_AVAILABLE_AT
                        && job.meta.iterator.as_ref().map(|i| i.step == step).unwrap_or(false)
                })
                .min_by_key(|job| {
                    job.meta.iterator.as_ref().map(|i| i.index).unwrap_or(usize::MAX)
                })
                .map(|job| job.queue_id)
        });
        if let Some(queue_id) = next_deferred {
            effects.push(Effect::Emit {
                event: self.event(
                    event.execution_id,
                    EventKind::QueueAdvanced {
                        queue_id,
                        available_at: self.executor.clock().epoch_ms(),
                    },
                ),
            });
        }

        // Join: exactly once, when completed + failed == total.
        let join = self.lock_state(|state| {
            let progress = state
                .projection(event.execution_id)?
                .step(step)?
                .loop_progress
                .as_ref()?;
            if progress.is_settled() && !progress.join_emitted() {
                Some((progress.items_in_order(), progress.errors.clone()))
            } else {
                None
            }
        });
        if let Some((items, errors)) = join {
            let count = items.len();
            effects.push(Effect::Emit {
                event: self
                    .event(
                        event.execution_id,
                        EventKind::IteratorCompleted {
                            step: step.to_string(),
                            items,
                            count,
                            errors,
                        },
                    )
                    .with_node(step),
            });
        }

        self.executor.execute_all(effects)
    }

    /// The join event finalizes the iterator step.
    pub(crate) fn handle_iterator_completed(
        &self,
        event: &Event,
    ) -> Result<Vec<Event>, RuntimeError> {
        let EventKind::IteratorCompleted { step, items, count, errors } = &event.kind else {
            return Ok(vec![]);
        };
        let record = self.require_execution(event.execution_id)?;
        if !self.is_live(&record) {
            return Ok(vec![]);
        }

        if !errors.is_empty() {
            let playbook = self.playbook_for(record.catalog_id)?;
            let tolerant = playbook
                .get_step(step)
                .map(|s| s.on_error == baton_playbook::ErrorPolicy::Continue)
                .unwrap_or(false);
            if !tolerant {
                let message = format!(
                    "{} of {} iterations failed (first: {})",
                    errors.len(),
                    items.len(),
                    errors.first().map(|e| e.message.as_str()).unwrap_or("unknown")
                );
                return self.fail_step(&record, step, &message);
            }
        }

        let result = serde_json::json!({
            "items": items,
            "count": count,
            "errors": errors,
        });
        self.executor.execute(Effect::Emit {
            event: self
                .event(
                    event.execution_id,
                    EventKind::StepCompleted { step: step.clone(), result },
                )
                .with_parent(event.event_id)
                .with_node(step),
        })
    }
}
