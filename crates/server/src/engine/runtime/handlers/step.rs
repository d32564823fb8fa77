// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step dispatch and routing.
//!
//! `try_dispatch` is the single gate every step instance passes through:
//! it evaluates `when` against the call buffer, hoists `bind`, and turns the
//! step into a queue row, an iterator expansion, a sub-playbook start, or an
//! immediate completion for pure routing steps. Routing runs when the
//! engine observes `step_completed` and delivers edge payloads as
//! `call_delivered` events, which re-enter `try_dispatch` on arrival.

use crate::engine::error::RuntimeError;
use crate::engine::runtime::{build_scope, scope, Runtime};
use baton_core::value::truthy;
use baton_core::{
    Clock, Effect, Event, EventKind, ExecutionId, ExecutionStatus, JobAction, JobSpec,
    QueueStatus, StepPhase,
};
use baton_playbook::{render_deep, CaseRule, ErrorPolicy, NextItem, StepDef, ToolDef};
use serde_json::Value;

/// A resolved routing target with its rendered payload.
pub(crate) struct RoutedTarget {
    pub step: String,
    pub args: Value,
}

impl<C: Clock> Runtime<C> {
    pub(crate) fn handle_execution_start(
        &self,
        event: &Event,
    ) -> Result<Vec<Event>, RuntimeError> {
        let record = self.require_execution(event.execution_id)?;
        let playbook = self.playbook_for(record.catalog_id)?;
        let Some(entry) = playbook.entry_step() else {
            return Ok(vec![]);
        };
        let entry_step = entry.step.clone();
        self.try_dispatch(event.execution_id, &entry_step)
    }

    pub(crate) fn handle_call_delivered(
        &self,
        event: &Event,
        step: &str,
    ) -> Result<Vec<Event>, RuntimeError> {
        let mut events = self.try_dispatch(event.execution_id, step)?;
        if events.is_empty() {
            // Still parked (or a duplicate): the execution may have nothing
            // left to do.
            events.extend(self.check_completion(event.execution_id)?);
        }
        Ok(events)
    }

    /// Attempt to dispatch a step instance. No-op when the step has already
    /// dispatched or finished (at-most-once execution per step instance).
    pub(crate) fn try_dispatch(
        &self,
        execution: ExecutionId,
        step_name: &str,
    ) -> Result<Vec<Event>, RuntimeError> {
        let record = self.require_execution(execution)?;
        if !self.is_live(&record) {
            return Ok(vec![]);
        }

        let projection = self.projection_snapshot(execution);
        let visited = projection.step(step_name);
        if let Some(state) = visited {
            if state.phase != StepPhase::Parked {
                return Ok(vec![]);
            }
        }
        let call =
            visited.map(|s| s.call.clone()).unwrap_or_else(|| Value::Object(Default::default()));

        let playbook = self.playbook_for(record.catalog_id)?;
        let step = playbook.get_step(step_name).ok_or_else(|| RuntimeError::StepNotFound {
            execution,
            step: step_name.to_string(),
        })?;

        let mut scope = build_scope(&record, &projection, &call);

        // Gated dispatch: falsy parks, future call deliveries re-evaluate.
        if let Some(when) = &step.when {
            let verdict = self.render(execution, step_name, when, &scope)?;
            if !truthy(&verdict) {
                if visited.is_none() {
                    // Record the arrival so the park is observable.
                    return self.executor.execute(Effect::Emit {
                        event: self.event(
                            execution,
                            EventKind::CallDelivered {
                                step: step_name.to_string(),
                                args: Value::Object(Default::default()),
                            },
                        ),
                    });
                }
                return Ok(vec![]);
            }
        }

        // Hoist bind assignments; later binds see earlier ones.
        let mut bound = serde_json::Map::new();
        for (key, template) in &step.bind {
            let value = render_deep(self.templater(), template, &scope).map_err(|source| {
                RuntimeError::Template { execution, step: step_name.to_string(), source }
            })?;
            if let Value::Object(map) = &mut scope {
                map.insert(key.clone(), value.clone());
            }
            bound.insert(key.clone(), value);
        }
        let bound =
            if bound.is_empty() { Value::Null } else { Value::Object(bound) };

        let mut effects = vec![Effect::Emit {
            event: self
                .event(
                    execution,
                    EventKind::StepStarted { step: step_name.to_string(), bound },
                )
                .with_node(step_name),
        }];

        if let Some(loop_spec) = &step.loop_ {
            effects.extend(self.expand_iterator(&record, step, loop_spec, &scope)?);
        } else if let Some(tool) = &step.tool {
            if tool.kind == "playbooks" {
                effects.extend(self.start_sub_playbook(&record, step, tool, &scope)?);
            } else {
                effects.push(Effect::Enqueue {
                    spec: self.job_for(&record, step, tool, &scope, 1),
                });
            }
        } else {
            // Pure routing step: completes immediately.
            effects.push(Effect::Emit {
                event: self
                    .event(
                        execution,
                        EventKind::StepCompleted {
                            step: step_name.to_string(),
                            result: Value::Null,
                        },
                    )
                    .with_node(step_name),
            });
        }

        self.executor.execute_all(effects)
    }

    /// Build the queue job for a tool step, rendering its spec in `scope`.
    pub(crate) fn job_for(
        &self,
        record: &baton_core::ExecutionRecord,
        step: &StepDef,
        tool: &ToolDef,
        scope: &Value,
        attempt: u32,
    ) -> JobSpec {
        let rendered = match render_deep(self.templater(), &tool.spec, scope) {
            Ok(value) => value,
            Err(e) => {
                // A spec that fails to render still dispatches; the worker
                // reports the failure through the normal retry path.
                tracing::warn!(step = %step.step, error = %e, "tool spec render failed");
                tool.spec.clone()
            }
        };
        let mut spec = JobSpec::new(
            record.execution_id,
            &step.step,
            JobAction {
                kind: tool.kind.clone(),
                spec: rendered,
                timeout_secs: tool.timeout.map(|s| s.ceil() as u64),
                context: scope.clone(),
            },
        );
        spec.meta.dedup_key =
            Some(format!("{}:{}:{}", record.execution_id, step.step, attempt));
        spec
    }

    /// Routing for a completed step.
    pub(crate) fn handle_step_completed(
        &self,
        event: &Event,
        step_name: &str,
        result: &Value,
    ) -> Result<Vec<Event>, RuntimeError> {
        let record = self.require_execution(event.execution_id)?;
        if !self.is_live(&record) {
            return Ok(vec![]);
        }

        // A completion parented to an action_failed came from a failure
        // case rule, which already routed; only the completion check runs.
        if let Some(parent_id) = event.parent_event_id {
            let failure_parent = self.lock_state(|state| {
                state
                    .log(event.execution_id)
                    .iter()
                    .find(|e| e.event_id == parent_id)
                    .map(|e| matches!(e.kind, EventKind::ActionFailed { .. }))
                    .unwrap_or(false)
            });
            if failure_parent {
                return self.check_completion(event.execution_id);
            }
        }

        let projection = self.projection_snapshot(event.execution_id);
        let playbook = self.playbook_for(record.catalog_id)?;
        let Some(step) = playbook.get_step(step_name) else {
            return Ok(vec![]);
        };

        let call = projection
            .step(step_name)
            .map(|s| s.call.clone())
            .unwrap_or_else(|| Value::Object(Default::default()));
        let scope = scope::with_result(&build_scope(&record, &projection, &call), result);

        let targets = self.route(event.execution_id, step, &scope, "action_completed")?;
        if targets.is_empty() {
            // Terminal sink: the branch ends here.
            return self.check_completion(event.execution_id);
        }

        let effects = targets
            .into_iter()
            .map(|target| Effect::Emit {
                event: self
                    .event(
                        event.execution_id,
                        EventKind::CallDelivered { step: target.step, args: target.args },
                    )
                    .with_parent(event.event_id),
            })
            .collect();
        self.executor.execute_all(effects)
    }

    /// An unrecovered step failure fails the execution.
    pub(crate) fn handle_step_failed(
        &self,
        event: &Event,
        step_name: &str,
        error: &str,
    ) -> Result<Vec<Event>, RuntimeError> {
        let record = self.require_execution(event.execution_id)?;
        if !self.is_live(&record) {
            return Ok(vec![]);
        }
        self.executor.execute(Effect::Emit {
            event: self.event(
                event.execution_id,
                EventKind::ExecutionComplete {
                    status: ExecutionStatus::Failed,
                    error: Some(format!("step '{step_name}' failed: {error}")),
                },
            ),
        })
    }

    /// Resolve routing targets: `case` rules first, then the `next` array
    /// with edge → fan → else precedence.
    pub(crate) fn route(
        &self,
        execution: ExecutionId,
        step: &StepDef,
        scope: &Value,
        trigger: &str,
    ) -> Result<Vec<RoutedTarget>, RuntimeError> {
        for rule in &step.case {
            if !case_matches(rule, trigger) {
                continue;
            }
            if let Some(when) = &rule.when {
                if !truthy(&self.render(execution, &step.step, when, scope)?) {
                    continue;
                }
            }
            return self.render_targets(
                execution,
                &step.step,
                rule.then.iter().map(|t| (t.step.as_str(), t.args.as_ref())),
                scope,
            );
        }

        // Failure triggers only route through explicit case rules.
        if is_failure_trigger(trigger) {
            return Ok(vec![]);
        }

        // 1. First conditional edge whose predicate holds
        for item in &step.next {
            if let NextItem::Edge { step: target, when: Some(when), args } = item {
                if truthy(&self.render(execution, &step.step, when, scope)?) {
                    return self.render_targets(
                        execution,
                        &step.step,
                        std::iter::once((target.as_str(), args.as_ref())),
                        scope,
                    );
                }
            }
        }
        // 2. First fan whose predicate holds dispatches all its targets
        for item in &step.next {
            if let NextItem::Fan { when, then } = item {
                if truthy(&self.render(execution, &step.step, when, scope)?) {
                    return self.render_targets(
                        execution,
                        &step.step,
                        then.iter().map(|t| (t.step.as_str(), t.args.as_ref())),
                        scope,
                    );
                }
            }
        }
        // 3. First else edge
        for item in &step.next {
            if let NextItem::Edge { step: target, when: None, args } = item {
                return self.render_targets(
                    execution,
                    &step.step,
                    std::iter::once((target.as_str(), args.as_ref())),
                    scope,
                );
            }
        }
        // 4. Terminal sink
        Ok(vec![])
    }

    /// Render edge payloads in the sender's post-result context.
    fn render_targets<'a>(
        &self,
        execution: ExecutionId,
        sender: &str,
        targets: impl Iterator<Item = (&'a str, Option<&'a Value>)>,
        scope: &Value,
    ) -> Result<Vec<RoutedTarget>, RuntimeError> {
        targets
            .map(|(step, args)| {
                let args = match args {
                    Some(args) => render_deep(self.templater(), args, scope).map_err(
                        |source| RuntimeError::Template {
                            execution,
                            step: sender.to_string(),
                            source,
                        },
                    )?,
                    None => Value::Object(Default::default()),
                };
                Ok(RoutedTarget { step: step.to_string(), args })
            })
            .collect()
    }

    /// Emit `execution_complete` when no step has outstanding work.
    ///
    /// Parked steps whose gate currently passes count as outstanding: their
    /// dispatch is in flight behind a pending `call_delivered`. Parked steps
    /// whose gate stays falsy are abandoned branches and do not hold the
    /// execution open.
    pub(crate) fn check_completion(
        &self,
        execution: ExecutionId,
    ) -> Result<Vec<Event>, RuntimeError> {
        let quiet = self.lock_state(|state| {
            let Some(record) = state.execution(execution) else { return false };
            if !matches!(record.status, ExecutionStatus::Started | ExecutionStatus::Running) {
                return false;
            }
            let active_steps = state
                .projection(execution)
                .map(|p| p.has_active_steps())
                .unwrap_or(false);
            let active_jobs = state.queue.values().any(|job| {
                job.execution_id == execution
                    && matches!(job.status, QueueStatus::Queued | QueueStatus::Leased)
            });
            let active_children = state.executions.values().any(|child| {
                child.parent_execution_id == Some(execution) && !child.status.is_terminal()
            });
            !active_steps && !active_jobs && !active_children
        });
        if !quiet {
            return Ok(vec![]);
        }

        let record = self.require_execution(execution)?;
        let projection = self.projection_snapshot(execution);
        let playbook = self.playbook_for(record.catalog_id)?;
        for (name, step_state) in &projection.steps {
            if step_state.phase != StepPhase::Parked {
                continue;
            }
            let Some(step) = playbook.get_step(name) else { continue };
            let dispatchable = match &step.when {
                None => true,
                Some(when) => {
                    let scope = build_scope(&record, &projection, &step_state.call);
                    self.render(execution, name, when, &scope)
                        .map(|verdict| truthy(&verdict))
                        .unwrap_or(false)
                }
            };
            if dispatchable {
                return Ok(vec![]);
            }
        }

        self.executor.execute(Effect::Emit {
            event: self.event(
                execution,
                EventKind::ExecutionComplete { status: ExecutionStatus::Completed, error: None },
            ),
        })
    }

    /// Dispatch a sub-playbook step: start a child execution that reports
    /// back to this step on its terminal event.
    fn start_sub_playbook(
        &self,
        record: &baton_core::ExecutionRecord,
        step: &StepDef,
        tool: &ToolDef,
        scope: &Value,
    ) -> Result<Vec<Effect>, RuntimeError> {
        let rendered = render_deep(self.templater(), &tool.spec, scope).map_err(|source| {
            RuntimeError::Template {
                execution: record.execution_id,
                step: step.step.clone(),
                source,
            }
        })?;

        let path = rendered.get("path").and_then(Value::as_str).unwrap_or_default().to_string();
        let version = rendered.get("version").and_then(Value::as_str);
        let workload = rendered.get("workload").cloned().unwrap_or(Value::Null);

        let entry = self.lock_state(|state| {
            match version {
                Some(v) => state.find_catalog(&path, v).cloned(),
                None => state.latest_catalog(&path).cloned(),
            }
        });
        let Some(entry) = entry else {
            // Unknown child playbook is a step failure, not an engine crash.
            return Ok(vec![Effect::Emit {
                event: self
                    .event(
                        record.execution_id,
                        EventKind::StepFailed {
                            step: step.step.clone(),
                            error: format!("playbook '{path}' not found in catalog"),
                        },
                    )
                    .with_node(&step.step),
            }]);
        };

        let child_id = ExecutionId(self.executor.ids().next());
        let mut start = self.event(
            child_id,
            EventKind::ExecutionStart {
                catalog_id: entry.catalog_id,
                path: entry.path.clone(),
                workload,
            },
        );
        start.parent_execution_id = Some(record.execution_id);
        start.node_id = Some(step.step.clone());
        Ok(vec![Effect::Emit { event: start }])
    }

    /// A finished child execution reports back to its parent step.
    pub(crate) fn handle_execution_complete(
        &self,
        event: &Event,
        status: ExecutionStatus,
    ) -> Result<Vec<Event>, RuntimeError> {
        let record = self.require_execution(event.execution_id)?;
        let (Some(parent_id), Some(parent_step)) =
            (record.parent_execution_id, record.parent_step.clone())
        else {
            return Ok(vec![]);
        };

        let parent = self.require_execution(parent_id)?;
        if !self.is_live(&parent) {
            return Ok(vec![]);
        }

        let child_projection = self.projection_snapshot(event.execution_id);
        let result = serde_json::json!({
            "execution_id": record.execution_id,
            "status": status,
            "steps": child_projection.step_results(),
        });

        if status == ExecutionStatus::Completed {
            return self.executor.execute(Effect::Emit {
                event: self
                    .event(
                        parent_id,
                        EventKind::StepCompleted { step: parent_step.clone(), result },
                    )
                    .with_node(&parent_step),
            });
        }

        let error = record.error.unwrap_or_else(|| "sub-playbook failed".to_string());
        self.fail_step(&parent, &parent_step, &error)
    }

    /// Terminal failure of a step: honor the step's `on_error` policy.
    pub(crate) fn fail_step(
        &self,
        record: &baton_core::ExecutionRecord,
        step_name: &str,
        error: &str,
    ) -> Result<Vec<Event>, RuntimeError> {
        let playbook = self.playbook_for(record.catalog_id)?;
        let policy =
            playbook.get_step(step_name).map(|s| s.on_error).unwrap_or(ErrorPolicy::Fail);

        let kind = match policy {
            // Record the failure, keep routing.
            ErrorPolicy::Continue => EventKind::StepCompleted {
                step: step_name.to_string(),
                result: serde_json::json!({"error": error}),
            },
            ErrorPolicy::Fail => EventKind::StepFailed {
                step: step_name.to_string(),
                error: error.to_string(),
            },
        };
        self.executor.execute(Effect::Emit {
            event: self.event(record.execution_id, kind).with_node(step_name),
        })
    }

    /// Recompute dispatch decisions from the current projection.
    ///
    /// Safe to call any number of times: dispatched and finished steps are
    /// no-ops, parked steps re-evaluate their gates, and the completion
    /// check runs when nothing moved. Given the same events this produces
    /// the same outputs.
    pub fn evaluate_execution(
        &self,
        execution: ExecutionId,
    ) -> Result<Vec<Event>, RuntimeError> {
        let record = self.require_execution(execution)?;
        if !self.is_live(&record) {
            return Ok(vec![]);
        }

        let parked: Vec<String> = self.lock_state(|state| {
            state
                .projection(execution)
                .map(|projection| {
                    projection
                        .steps
                        .iter()
                        .filter(|(_, step)| step.phase == StepPhase::Parked)
                        .map(|(name, _)| name.clone())
                        .collect()
                })
                .unwrap_or_default()
        });

        let mut events = Vec::new();
        for step in parked {
            events.extend(self.try_dispatch(execution, &step)?);
        }
        if events.is_empty() {
            events.extend(self.check_completion(execution)?);
        }
        Ok(events)
    }

    pub(crate) fn handle_execution_resumed(
        &self,
        event: &Event,
    ) -> Result<Vec<Event>, RuntimeError> {
        // Work queued before the pause becomes leasable again; parked gates
        // may also have become satisfiable while paused.
        self.evaluate_execution(event.execution_id)
    }
}

fn case_matches(rule: &CaseRule, trigger: &str) -> bool {
    match (rule.on.as_str(), trigger) {
        ("action_completed" | "step_completed", "action_completed") => true,
        ("action_failed" | "step_failed", "action_failed") => true,
        (on, t) => on == t,
    }
}

fn is_failure_trigger(trigger: &str) -> bool {
    matches!(trigger, "action_failed" | "step_failed")
}
