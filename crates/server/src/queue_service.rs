// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue service: the only coordination channel between engine and workers.
//!
//! Lease, ack, fail, and renew run synchronously against the materialized
//! state under one lock (the row-level transaction), then persist their
//! events through the bus. The engine loop re-applies those events from the
//! WAL; reducers are idempotent so the double apply is harmless.

use crate::event_bus::EventBus;
use baton_core::{
    Clock, Event, EventId, EventKind, ExecutionStatus, Fault, IdGen, JobSpec, QueueId, QueueJob,
    QueueStatus,
};
use baton_storage::MaterializedState;
use baton_wire::{AckRequest, FailRequest, LeaseRequest, RenewRequest};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Outcome of a lease-expiry sweep.
#[derive(Debug, Default, Clone, Copy)]
pub struct LeaseSweepStats {
    pub requeued: usize,
    pub dead: usize,
}

pub struct QueueService<C: Clock> {
    state: Arc<Mutex<MaterializedState>>,
    bus: EventBus,
    ids: Arc<dyn IdGen>,
    clock: C,
}

impl<C: Clock> QueueService<C> {
    pub fn new(
        state: Arc<Mutex<MaterializedState>>,
        bus: EventBus,
        ids: Arc<dyn IdGen>,
        clock: C,
    ) -> Self {
        Self { state, bus, ids, clock }
    }

    fn stamp(&self, mut event: Event) -> Event {
        event.event_id = EventId(self.ids.next());
        event.timestamp = self.clock.epoch_ms();
        event
    }

    /// Apply events to state under the given guard, then persist them.
    fn commit(
        &self,
        state: &mut MaterializedState,
        events: Vec<Event>,
    ) -> Result<(), Fault> {
        for event in &events {
            state.apply_event(event);
        }
        self.bus
            .send_all(events)
            .map_err(|e| Fault::Retriable(format!("wal append failed: {e}")))
    }

    /// Insert a row. Idempotent on `meta.dedup_key`: a duplicate insert
    /// returns the existing row's id. A future `available_at` makes this a
    /// scheduled enqueue.
    pub fn enqueue(&self, spec: JobSpec) -> Result<QueueId, Fault> {
        let mut state = self.state.lock();

        if let Some(key) = &spec.meta.dedup_key {
            if let Some(existing) = state
                .queue
                .values()
                .find(|job| job.meta.dedup_key.as_deref() == Some(key.as_str()))
            {
                return Ok(existing.queue_id);
            }
        }

        let queue_id = QueueId(self.ids.next());
        let job = spec.into_job(queue_id, self.clock.epoch_ms());
        let event = self.stamp(Event::infra(EventKind::QueueEnqueued { job }));
        self.commit(&mut state, vec![event])?;
        Ok(queue_id)
    }

    /// Atomic batch insert (iterator expansion, bulk schedulers).
    pub fn enqueue_batch(&self, specs: Vec<JobSpec>) -> Result<Vec<QueueId>, Fault> {
        let mut state = self.state.lock();
        let now = self.clock.epoch_ms();

        let mut ids = Vec::with_capacity(specs.len());
        let mut events = Vec::with_capacity(specs.len());
        for spec in specs {
            let queue_id = QueueId(self.ids.next());
            ids.push(queue_id);
            events.push(
                self.stamp(Event::infra(EventKind::QueueEnqueued {
                    job: spec.into_job(queue_id, now),
                })),
            );
        }
        self.commit(&mut state, events)?;
        Ok(ids)
    }

    /// Lease up to `max` available jobs for a worker.
    ///
    /// Selection is FIFO by `(available_at, queue_id)` within an execution,
    /// interleaved round-robin across executions so one hot execution cannot
    /// monopolize the pool. PAUSED and terminal executions are filtered, as
    /// are rows whose step has already finished (duplicate inserts).
    pub fn lease(&self, req: &LeaseRequest) -> Result<Vec<QueueJob>, Fault> {
        if req.max == 0 {
            return Ok(vec![]);
        }
        let mut state = self.state.lock();
        let now = self.clock.epoch_ms();

        // Bucket candidates per execution, each bucket FIFO.
        let mut buckets: BTreeMap<u64, Vec<QueueId>> = BTreeMap::new();
        for job in state.queue.values() {
            if !job.leasable_at(now) {
                continue;
            }
            if !req.capability_filter.is_empty()
                && !req.capability_filter.contains(&job.action.kind)
            {
                continue;
            }
            if !job.meta.labels.iter().all(|(k, v)| req.labels.get(k) == Some(v)) {
                continue;
            }
            let Some(record) = state.execution(job.execution_id) else { continue };
            if !matches!(record.status, ExecutionStatus::Started | ExecutionStatus::Running) {
                continue;
            }
            // A done step never executes again; stale duplicates are
            // ignored at lease time.
            if job.meta.iterator.is_none() {
                let done = state
                    .projection(job.execution_id)
                    .and_then(|p| p.step(&job.node_id))
                    .map(|s| s.is_done())
                    .unwrap_or(false);
                if done {
                    continue;
                }
            }
            buckets.entry(job.execution_id.as_u64()).or_default().push(job.queue_id);
        }
        for bucket in buckets.values_mut() {
            bucket.sort_by_key(|id| {
                state.queue.get(id).map(|j| (j.available_at, j.queue_id)).unwrap_or_default()
            });
        }

        // Round-robin across executions.
        let mut selected = Vec::new();
        let mut cursors: Vec<(u64, std::vec::IntoIter<QueueId>)> =
            buckets.into_iter().map(|(k, v)| (k, v.into_iter())).collect();
        'outer: while selected.len() < req.max as usize {
            let mut any = false;
            for (_, cursor) in cursors.iter_mut() {
                if let Some(id) = cursor.next() {
                    selected.push(id);
                    any = true;
                    if selected.len() == req.max as usize {
                        break 'outer;
                    }
                }
            }
            if !any {
                break;
            }
        }

        let lease_until = now + req.lease_duration_seconds * 1_000;
        let events: Vec<Event> = selected
            .iter()
            .map(|queue_id| {
                self.stamp(Event::infra(EventKind::QueueLeased {
                    queue_id: *queue_id,
                    worker_id: req.worker_id.clone(),
                    lease_until,
                }))
            })
            .collect();
        self.commit(&mut state, events)?;

        Ok(selected.iter().filter_map(|id| state.queue.get(id).cloned()).collect())
    }

    /// Transition `leased → done`. Idempotent for rows already done.
    pub fn ack(&self, queue_id: QueueId, req: &AckRequest) -> Result<(), Fault> {
        let mut state = self.state.lock();
        let now = self.clock.epoch_ms();
        let job = state
            .queue
            .get(&queue_id)
            .ok_or_else(|| Fault::NotFound(format!("queue row {queue_id}")))?;

        match job.status {
            // Duplicate ack from the completing worker is idempotent; a
            // late ack from a worker that lost the lease is not.
            QueueStatus::Done => {
                if job.worker_id.as_deref() == Some(req.worker_id.as_str()) {
                    return Ok(());
                }
                return Err(Fault::Conflict(format!(
                    "lease expired: queue row {queue_id} was completed by another worker"
                )));
            }
            QueueStatus::Leased => {}
            _ => {
                return Err(Fault::Conflict(format!(
                    "lease expired: queue row {queue_id} is {:?}",
                    job.status
                )))
            }
        }
        if job.worker_id.as_deref() != Some(req.worker_id.as_str()) {
            return Err(Fault::Conflict(format!(
                "queue row {queue_id} is not leased by {}",
                req.worker_id
            )));
        }
        if job.lease_until.map(|until| until < now).unwrap_or(true) {
            return Err(Fault::Conflict(format!("lease expired on queue row {queue_id}")));
        }

        let event = self.stamp(Event::infra(EventKind::QueueAcked {
            queue_id,
            result: req.result.clone(),
        }));
        self.commit(&mut state, vec![event])
    }

    /// Report a failed job.
    ///
    /// Queue-level retry (`retry: true`) is for infrastructure failures and
    /// requeues the same row with backoff; tool failures arrive with
    /// `retry: false` because the engine owns that retry policy. Exhausted
    /// infra retries synthesize an `action_failed` so the engine still
    /// observes the terminal failure.
    pub fn fail(&self, queue_id: QueueId, req: &FailRequest) -> Result<(), Fault> {
        let mut state = self.state.lock();
        let now = self.clock.epoch_ms();
        let job = state
            .queue
            .get(&queue_id)
            .cloned()
            .ok_or_else(|| Fault::NotFound(format!("queue row {queue_id}")))?;

        if job.status.is_terminal() {
            return Ok(());
        }
        if job.status != QueueStatus::Leased {
            return Err(Fault::Conflict(format!(
                "queue row {queue_id} is not leased ({:?})",
                job.status
            )));
        }
        if job.worker_id.as_deref() != Some(req.worker_id.as_str()) {
            return Err(Fault::Conflict(format!(
                "queue row {queue_id} is not leased by {}",
                req.worker_id
            )));
        }

        let error = req.error.clone().unwrap_or_else(|| "unspecified failure".to_string());
        let permanent = req.permanent.unwrap_or(false);
        let retry_requested = req.retry.unwrap_or(false);
        let exhausted = job.attempts >= job.max_attempts;

        let mut events = Vec::new();
        if permanent || !retry_requested || exhausted {
            events.push(self.stamp(Event::infra(EventKind::QueueDead {
                queue_id,
                error: error.clone(),
            })));
            if retry_requested && exhausted && !permanent {
                events.push(self.stamp(synthetic_failure(&job, &error)));
            }
        } else {
            events.push(
                self.stamp(Event::infra(EventKind::QueueRequeued { queue_id })),
            );
            if let Some(delay) = req.retry_delay_seconds {
                events.push(self.stamp(Event::infra(EventKind::QueueAdvanced {
                    queue_id,
                    available_at: now + delay * 1_000,
                })));
            }
        }
        self.commit(&mut state, events)
    }

    /// Extend a held lease. Rejected once the row is no longer this
    /// worker's, which tells the worker to cancel cooperatively.
    pub fn renew(&self, queue_id: QueueId, req: &RenewRequest) -> Result<u64, Fault> {
        let mut state = self.state.lock();
        let now = self.clock.epoch_ms();
        let job = state
            .queue
            .get(&queue_id)
            .ok_or_else(|| Fault::NotFound(format!("queue row {queue_id}")))?;

        if job.status != QueueStatus::Leased
            || job.worker_id.as_deref() != Some(req.worker_id.as_str())
            || job.lease_until.map(|until| until < now).unwrap_or(true)
        {
            return Err(Fault::Conflict(format!(
                "queue row {queue_id} is no longer leased by {}",
                req.worker_id
            )));
        }

        let lease_until = now + req.lease_duration_seconds * 1_000;
        let event = self
            .stamp(Event::infra(EventKind::QueueLeaseRenewed { queue_id, lease_until }));
        self.commit(&mut state, vec![event])?;
        Ok(lease_until)
    }

    /// Return expired leases to the queue; exhausted rows go dead and
    /// surface a synthetic `action_failed` for the engine.
    pub fn sweep_expired_leases(&self) -> Result<LeaseSweepStats, Fault> {
        let mut state = self.state.lock();
        let now = self.clock.epoch_ms();

        let expired: Vec<QueueJob> =
            state.queue.values().filter(|job| job.lease_expired(now)).cloned().collect();

        let mut stats = LeaseSweepStats::default();
        let mut events = Vec::new();
        for job in expired {
            if job.attempts >= job.max_attempts {
                stats.dead += 1;
                let error = format!(
                    "lease expired after {} of {} attempts",
                    job.attempts, job.max_attempts
                );
                events.push(self.stamp(Event::infra(EventKind::QueueDead {
                    queue_id: job.queue_id,
                    error: error.clone(),
                })));
                events.push(self.stamp(synthetic_failure(&job, &error)));
            } else {
                stats.requeued += 1;
                events.push(
                    self.stamp(Event::infra(EventKind::QueueRequeued {
                        queue_id: job.queue_id,
                    })),
                );
            }
        }
        self.commit(&mut state, events)?;
        Ok(stats)
    }
}

/// The `action_failed` the engine would have received had a worker been
/// alive to report the failure.
fn synthetic_failure(job: &QueueJob, error: &str) -> Event {
    Event::new(
        job.execution_id,
        EventKind::ActionFailed {
            step: job.node_id.clone(),
            queue_id: job.queue_id,
            error: error.to_string(),
            reason: Some("lease_expired".to_string()),
            will_retry: false,
            stack_available: false,
        },
    )
    .with_node(&job.node_id)
}

#[cfg(test)]
#[path = "queue_service_tests.rs"]
mod tests;
