// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker-reported action outcomes.
//!
//! Workers only report; this module decides. Completions either continue an
//! `on_success` chain, settle an iterator child, or finalize the step.
//! Failures consult `retry.on_error` and fall through to the step's error
//! policy when the sequence is exhausted.

use crate::engine::error::RuntimeError;
use crate::engine::runtime::{build_scope, scope, Runtime};
use baton_core::retry::backoff_delay;
use baton_core::value::truthy;
use baton_core::{
    Clock, Effect, Event, EventKind, QueueJob, RetryKind, RetryMeta, StepPhase,
};
use serde_json::Value;

impl<C: Clock> Runtime<C> {
    /// Synthesize `iteration_started` for iterator children on their first
    /// attempt.
    pub(crate) fn handle_action_started(
        &self,
        event: &Event,
    ) -> Result<Vec<Event>, RuntimeError> {
        let EventKind::ActionStarted { queue_id, attempt, .. } = &event.kind else {
            return Ok(vec![]);
        };
        let Some(job) = self.lock_state(|s| s.job(*queue_id).cloned()) else {
            return Ok(vec![]);
        };
        let Some(iter) = &job.meta.iterator else {
            return Ok(vec![]);
        };
        if *attempt > 1 || job.meta.retry.is_some() {
            return Ok(vec![]);
        }
        self.executor.execute(Effect::Emit {
            event: self
                .event(
                    job.execution_id,
                    EventKind::IterationStarted { step: iter.step.clone(), index: iter.index },
                )
                .with_node(&iter.step),
        })
    }

    pub(crate) fn handle_action_completed(
        &self,
        event: &Event,
    ) -> Result<Vec<Event>, RuntimeError> {
        let EventKind::ActionCompleted { step, queue_id, result } = &event.kind else {
            return Ok(vec![]);
        };
        let record = self.require_execution(event.execution_id)?;
        if !self.is_live(&record) {
            return Ok(vec![]);
        }
        let Some(job) = self.lock_state(|s| s.job(*queue_id).cloned()) else {
            tracing::warn!(%queue_id, "action completion for unknown queue row");
            return Ok(vec![]);
        };

        // Iterator children settle through iteration events; the join owns
        // the step outcome.
        if let Some(iter) = &job.meta.iterator {
            return self.executor.execute(Effect::Emit {
                event: self
                    .event(
                        event.execution_id,
                        EventKind::IterationCompleted {
                            step: iter.step.clone(),
                            index: iter.index,
                            result: result.clone(),
                        },
                    )
                    .with_parent(event.event_id)
                    .with_node(&iter.step),
            });
        }

        let projection = self.projection_snapshot(event.execution_id);
        if projection.step(step).map(|s| s.phase == StepPhase::Done).unwrap_or(false) {
            // Late duplicate (lease loss rerun): the step already settled.
            return Ok(vec![]);
        }

        let playbook = self.playbook_for(record.catalog_id)?;
        let Some(step_def) = playbook.get_step(step) else {
            return Ok(vec![]);
        };

        if let Some(policy) = step_def.retry.as_ref().and_then(|r| r.on_success.as_ref()) {
            let call = projection
                .step(step)
                .map(|s| s.call.clone())
                .unwrap_or_else(|| Value::Object(Default::default()));
            let result_scope =
                scope::with_result(&build_scope(&record, &projection, &call), result);

            let attempts = projection.step(step).map(|s| s.chain.len() as u32).unwrap_or(1);
            let keep_going = truthy(&self.render(
                event.execution_id,
                step,
                &policy.while_,
                &result_scope,
            )?) && attempts < policy.max_attempts;

            if keep_going {
                return self.continue_chain(event, &job, policy, &result_scope, attempts);
            }

            // Chain finished: fold attempts per the collect strategy.
            let chain = projection.step(step).map(|s| s.chain.as_slice()).unwrap_or(&[]);
            let aggregated =
                super::aggregate_chain(chain, policy.collect, policy.merge_path.as_deref());
            return self.executor.execute_all(vec![
                Effect::Emit {
                    event: self
                        .event(
                            event.execution_id,
                            EventKind::RetrySequenceCompleted {
                                step: step.clone(),
                                attempts,
                                aggregated_result: aggregated.clone(),
                            },
                        )
                        .with_parent(event.event_id)
                        .with_node(step),
                },
                Effect::Emit {
                    event: self
                        .event(
                            event.execution_id,
                            EventKind::StepCompleted { step: step.clone(), result: aggregated },
                        )
                        .with_node(step),
                },
            ]);
        }

        self.executor.execute(Effect::Emit {
            event: self
                .event(
                    event.execution_id,
                    EventKind::StepCompleted { step: step.clone(), result: result.clone() },
                )
                .with_parent(event.event_id)
                .with_node(step),
        })
    }

    pub(crate) fn handle_action_failed(&self, event: &Event) -> Result<Vec<Event>, RuntimeError> {
        let EventKind::ActionFailed { step, queue_id, error, reason, .. } = &event.kind else {
            return Ok(vec![]);
        };
        let record = self.require_execution(event.execution_id)?;
        if !self.is_live(&record) {
            return Ok(vec![]);
        }
        let Some(job) = self.lock_state(|s| s.job(*queue_id).cloned()) else {
            tracing::warn!(%queue_id, "action failure for unknown queue row");
            return Ok(vec![]);
        };

        let projection = self.projection_snapshot(event.execution_id);
        if projection.step(step).map(|s| s.phase.is_terminal()).unwrap_or(false) {
            return Ok(vec![]);
        }

        let playbook = self.playbook_for(record.catalog_id)?;
        let step_def = playbook.get_step(step);
        let policy = step_def.and_then(|s| s.retry.as_ref()).and_then(|r| r.on_error.as_ref());

        // Attempt number of the failure being handled (1-based).
        let attempt = job.meta.retry.as_ref().map(|r| r.attempt_number).unwrap_or(1);

        if let Some(policy) = policy {
            let call = projection
                .step(step)
                .map(|s| s.call.clone())
                .unwrap_or_else(|| Value::Object(Default::default()));
            let failure_scope = scope::with_failure(
                &build_scope(&record, &projection, &call),
                error,
                reason.as_deref(),
                attempt,
            );

            let retriable = attempt < policy.max_attempts
                && match &policy.when {
                    Some(when) => truthy(&self.render(
                        event.execution_id,
                        step,
                        when,
                        &failure_scope,
                    )?),
                    None => true,
                };

            if retriable {
                let delay =
                    backoff_delay(policy, attempt, self.jitter_frac(policy.jitter));
                let now = self.executor.clock().epoch_ms();

                let mut spec = baton_core::JobSpec::new(
                    job.execution_id,
                    &job.node_id,
                    job.action.clone(),
                );
                spec.parent_execution_id = job.parent_execution_id;
                spec.max_attempts = job.max_attempts;
                spec.available_at = Some(now + delay.as_millis() as u64);
                // Loop + retry are independent wrappers: a retried child
                // keeps its iterator identity.
                spec.meta.iterator = job.meta.iterator.clone();
                spec.meta.retry = Some(RetryMeta {
                    attempt_number: attempt + 1,
                    parent_event_id: event.event_id,
                    kind: RetryKind::OnError,
                });
                // Iterator children need the index in the key: every child
                // runs its own retry sequence.
                spec.meta.dedup_key = Some(match &job.meta.iterator {
                    Some(iter) => format!(
                        "{}:{}:i{}:{}",
                        job.execution_id,
                        job.node_id,
                        iter.index,
                        attempt + 1
                    ),
                    None => format!("{}:{}:{}", job.execution_id, job.node_id, attempt + 1),
                });

                return self.executor.execute_all(vec![
                    // Mark the old row superseded (no-op if the worker's
                    // fail call already killed it).
                    Effect::Emit {
                        event: self.event(
                            job.execution_id,
                            EventKind::QueueFailed {
                                queue_id: job.queue_id,
                                error: error.clone(),
                            },
                        ),
                    },
                    Effect::Enqueue { spec },
                ]);
            }
        }

        // Exhausted (or never retriable): settle the instance.
        if let Some(iter) = &job.meta.iterator {
            return self.executor.execute(Effect::Emit {
                event: self
                    .event(
                        event.execution_id,
                        EventKind::IterationFailed {
                            step: iter.step.clone(),
                            index: iter.index,
                            error: error.clone(),
                        },
                    )
                    .with_parent(event.event_id)
                    .with_node(&iter.step),
            });
        }

        // Failure-scoped case rules get first refusal.
        if let Some(step_def) = step_def {
            let call = projection
                .step(step)
                .map(|s| s.call.clone())
                .unwrap_or_else(|| Value::Object(Default::default()));
            let failure_scope = scope::with_failure(
                &build_scope(&record, &projection, &call),
                error,
                reason.as_deref(),
                attempt,
            );
            let targets =
                self.route(event.execution_id, step_def, &failure_scope, "action_failed")?;
            if !targets.is_empty() {
                // Parented to the failure so completion routing knows the
                // case rule already routed this step.
                let mut effects = vec![Effect::Emit {
                    event: self
                        .event(
                            event.execution_id,
                            EventKind::StepCompleted {
                                step: step.clone(),
                                result: serde_json::json!({"error": error}),
                            },
                        )
                        .with_parent(event.event_id)
                        .with_node(step),
                }];
                effects.extend(targets.into_iter().map(|target| Effect::Emit {
                    event: self
                        .event(
                            event.execution_id,
                            EventKind::CallDelivered { step: target.step, args: target.args },
                        )
                        .with_parent(event.event_id),
                }));
                return self.executor.execute_all(effects);
            }
        }

        self.fail_step(&record, step, error)
    }

    /// Enqueue the next attempt of an `on_success` chain.
    fn continue_chain(
        &self,
        event: &Event,
        job: &QueueJob,
        policy: &baton_core::OnSuccessRetry,
        result_scope: &Value,
        attempts: u32,
    ) -> Result<Vec<Event>, RuntimeError> {
        let mut action = job.action.clone();

        let patches: [(&str, &Option<Value>); 3] = [
            ("params", &policy.next_call.params),
            ("body", &policy.next_call.body),
            ("headers", &policy.next_call.headers),
        ];
        for (key, patch) in patches {
            let Some(patch) = patch else { continue };
            let rendered = baton_playbook::render_deep(self.templater(), patch, result_scope)
                .map_err(|source| RuntimeError::Template {
                    execution: event.execution_id,
                    step: job.node_id.clone(),
                    source,
                })?;
            let mut slot = action
                .spec
                .get(key)
                .cloned()
                .unwrap_or_else(|| Value::Object(Default::default()));
            baton_core::value::deep_merge(&mut slot, rendered);
            baton_core::value::set_path(&mut action.spec, key, slot);
        }

        let mut spec = baton_core::JobSpec::new(job.execution_id, &job.node_id, action);
        spec.parent_execution_id = job.parent_execution_id;
        spec.max_attempts = job.max_attempts;
        spec.meta.retry = Some(RetryMeta {
            attempt_number: attempts + 1,
            parent_event_id: event.event_id,
            kind: RetryKind::OnSuccess,
        });
        spec.meta.dedup_key = Some(format!(
            "{}:{}:s{}",
            job.execution_id,
            job.node_id,
            attempts + 1
        ));

        self.executor.execute(Effect::Enqueue { spec })
    }
}
