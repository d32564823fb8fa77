// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine test harness: an in-process server without the HTTP layer.
//!
//! Tests drive the engine the way production does — events in, WAL drain,
//! effects out — with a fake clock and sequential ids so every assertion is
//! deterministic. Worker behavior is simulated through the same queue
//! service the HTTP handlers call.

use crate::engine::Runtime;
use crate::event_bus::EventBus;
use crate::queue_service::QueueService;
use baton_core::test_support::SeqIds;
use baton_core::{
    CatalogId, Event, EventId, EventKind, ExecutionId, ExecutionStatus, FakeClock, IdGen,
    QueueJob, QueueStatus, StepPhase,
};
use baton_playbook::ExprEvaluator;
use baton_storage::{MaterializedState, Wal};
use baton_wire::LeaseRequest;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;

pub(crate) struct Harness {
    _dir: TempDir,
    pub clock: FakeClock,
    pub ids: Arc<dyn IdGen>,
    pub state: Arc<Mutex<MaterializedState>>,
    pub bus: EventBus,
    pub runtime: Runtime<FakeClock>,
    pub queue: QueueService<FakeClock>,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let clock = FakeClock::new();
        clock.set_epoch_ms(1_700_000_000_000);

        let wal = Wal::open(dir.path().join("events.wal"), 0).unwrap();
        let state = Arc::new(Mutex::new(MaterializedState::new()));
        let bus = EventBus::new(wal);
        let ids: Arc<dyn IdGen> = Arc::new(SeqIds::new(1));

        let runtime = Runtime::new(
            Arc::clone(&state),
            Arc::clone(&ids),
            clock.clone(),
            Arc::new(ExprEvaluator),
        )
        .with_rng_seed(7);
        let queue = QueueService::new(
            Arc::clone(&state),
            bus.clone(),
            Arc::clone(&ids),
            clock.clone(),
        );

        Self { _dir: dir, clock, ids, state, bus, runtime, queue }
    }

    /// Build an event with fresh id and current fake time.
    pub fn event(&self, execution: ExecutionId, kind: EventKind) -> Event {
        let mut event = Event::new(execution, kind);
        event.event_id = EventId(self.ids.next());
        event.timestamp = self.clock.epoch_ms();
        event
    }

    /// Ingest an event the way the HTTP handler does: apply + persist.
    pub fn emit(&self, event: Event) {
        self.state.lock().apply_event(&event);
        self.bus.send(event).unwrap();
    }

    /// Drain the WAL: the engine loop, synchronously.
    pub fn pump(&self) {
        loop {
            let entry = self.bus.wal().lock().next_unprocessed().unwrap();
            let Some(entry) = entry else { break };
            self.state.lock().apply_event(&entry.event);
            let events = self.runtime.handle_event(&entry.event).unwrap();
            self.bus.send_all(events).unwrap();
            self.bus.wal().lock().mark_processed(entry.seq);
        }
    }

    pub fn register_playbook(&self, document: Value) -> CatalogId {
        let catalog_id = CatalogId(self.ids.next());
        let mut event = Event::infra(EventKind::PlaybookRegistered {
            catalog_id,
            path: document
                .get("path")
                .and_then(Value::as_str)
                .unwrap_or("test/playbook")
                .to_string(),
            version: "1".into(),
            content_hash: format!("hash-{catalog_id}"),
            document,
        });
        event.event_id = EventId(self.ids.next());
        event.timestamp = self.clock.epoch_ms();
        self.emit(event);
        self.pump();
        catalog_id
    }

    /// Register + start an execution, pumping the engine.
    pub fn run_playbook(&self, document: Value, workload: Value) -> ExecutionId {
        let path = document
            .get("path")
            .and_then(Value::as_str)
            .unwrap_or("test/playbook")
            .to_string();
        let catalog_id = self.register_playbook(document);
        let execution = ExecutionId(self.ids.next());
        let event = self.event(
            execution,
            EventKind::ExecutionStart { catalog_id, path, workload },
        );
        self.emit(event);
        self.pump();
        execution
    }

    // ── worker simulation ───────────────────────────────────────────────────

    pub fn lease_as(&self, worker: &str, max: u32) -> Vec<QueueJob> {
        let jobs = self
            .queue
            .lease(&LeaseRequest {
                worker_id: worker.to_string(),
                max,
                lease_duration_seconds: 60,
                capability_filter: vec![],
                labels: Default::default(),
            })
            .unwrap();
        self.pump();
        jobs
    }

    pub fn lease_all(&self, worker: &str) -> Vec<QueueJob> {
        self.lease_as(worker, 64)
    }

    fn action_event(&self, job: &QueueJob, kind: EventKind) -> Event {
        let mut event = self.event(job.execution_id, kind).with_node(&job.node_id);
        if let Some(retry) = &job.meta.retry {
            event.parent_event_id = Some(retry.parent_event_id);
        }
        event
    }

    pub fn start_job(&self, job: &QueueJob) {
        let attempt = job.meta.retry.as_ref().map(|r| r.attempt_number).unwrap_or(1);
        let event = self.action_event(
            job,
            EventKind::ActionStarted {
                step: job.node_id.clone(),
                queue_id: job.queue_id,
                attempt,
            },
        );
        self.emit(event);
        self.pump();
    }

    /// Worker happy path: action_started, action_completed, ack.
    pub fn complete_job(&self, worker: &str, job: &QueueJob, result: Value) {
        self.start_job(job);
        let event = self.action_event(
            job,
            EventKind::ActionCompleted {
                step: job.node_id.clone(),
                queue_id: job.queue_id,
                result: result.clone(),
            },
        );
        self.emit(event);
        self.queue
            .ack(
                job.queue_id,
                &baton_wire::AckRequest { worker_id: worker.to_string(), result },
            )
            .unwrap();
        self.pump();
    }

    /// Worker failure path: action_started, action_failed, fail(no retry).
    pub fn fail_job(&self, worker: &str, job: &QueueJob, error: &str) {
        self.start_job(job);
        let event = self.action_event(
            job,
            EventKind::ActionFailed {
                step: job.node_id.clone(),
                queue_id: job.queue_id,
                error: error.to_string(),
                reason: None,
                will_retry: false,
                stack_available: false,
            },
        );
        self.emit(event);
        self.queue
            .fail(
                job.queue_id,
                &baton_wire::FailRequest {
                    worker_id: worker.to_string(),
                    error: Some(error.to_string()),
                    retry: Some(false),
                    retry_delay_seconds: None,
                    permanent: None,
                },
            )
            .unwrap();
        self.pump();
    }

    // ── assertions ──────────────────────────────────────────────────────────

    pub fn status(&self, execution: ExecutionId) -> ExecutionStatus {
        self.state.lock().execution(execution).unwrap().status
    }

    pub fn phase(&self, execution: ExecutionId, step: &str) -> Option<StepPhase> {
        self.state
            .lock()
            .projection(execution)
            .and_then(|p| p.step(step).map(|s| s.phase))
    }

    pub fn step_result(&self, execution: ExecutionId, step: &str) -> Option<Value> {
        self.state
            .lock()
            .projection(execution)
            .and_then(|p| p.step(step).and_then(|s| s.result.clone()))
    }

    /// Wire event types of the execution's log, in order.
    pub fn log_types(&self, execution: ExecutionId) -> Vec<&'static str> {
        self.state.lock().log(execution).iter().map(|e| e.event_type()).collect()
    }

    /// Events of one type, cloned out of the log.
    pub fn events_of(&self, execution: ExecutionId, event_type: &str) -> Vec<Event> {
        self.state
            .lock()
            .log(execution)
            .iter()
            .filter(|e| e.event_type() == event_type)
            .cloned()
            .collect()
    }

    pub fn leased_count(&self, execution: ExecutionId) -> usize {
        self.state
            .lock()
            .queue
            .values()
            .filter(|j| j.execution_id == execution && j.status == QueueStatus::Leased)
            .count()
    }

    pub fn job(&self, id: baton_core::QueueId) -> Option<QueueJob> {
        self.state.lock().job(id).cloned()
    }
}
