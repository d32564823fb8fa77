// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Server startup: lock the state directory, recover state, wire the
//! engine.
//!
//! Recovery is snapshot + WAL replay: the snapshot fixes the state at its
//! sequence number and the engine loop re-handles every later entry.
//! Handler idempotence (done-step guards, dedup-keyed enqueues) makes the
//! replay safe.

use super::{Config, LifecycleError, ServerState};
use crate::engine::Runtime;
use crate::event_bus::EventBus;
use crate::http::AppState;
use crate::queue_service::QueueService;
use crate::sweeper::{Sweeper, SweeperConfig};
use baton_core::{Clock, IdGen, Snowflake};
use baton_playbook::ExprEvaluator;
use baton_storage::{load_snapshot, Checkpointer, MaterializedState, Wal};
use fs2::FileExt;
use parking_lot::Mutex;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Arc;
use tracing::info;

/// Everything `main` needs after startup.
pub struct StartupResult<C: Clock> {
    pub server: ServerState<C>,
    pub api: AppState<C>,
}

/// Start the server: exclusive lock, state recovery, engine wiring.
pub fn startup<C: Clock>(config: Config, clock: C) -> Result<StartupResult<C>, LifecycleError> {
    std::fs::create_dir_all(&config.state_dir)?;

    // Exclusive state-dir lock: at most one server owns these projections.
    let mut lock_file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&config.lock_path)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;
    let _ = writeln!(lock_file, "{}", std::process::id());

    // Recover: snapshot fixes the base, WAL replay covers the rest.
    let snapshot = load_snapshot(&config.snapshot_path)?;
    let (state, processed_seq) = match snapshot {
        Some(snapshot) => {
            info!(seq = snapshot.seq, "loaded snapshot");
            (snapshot.state, snapshot.seq)
        }
        None => (MaterializedState::new(), 0),
    };

    let wal = Wal::open(&config.wal_path, processed_seq)?;
    let replay_from = wal.processed_seq();
    let replay_to = wal.write_seq();
    if replay_to > replay_from {
        info!(from = replay_from, to = replay_to, "replaying WAL entries");
    }

    let state = Arc::new(Mutex::new(state));
    let bus = EventBus::new(wal);
    let ids: Arc<dyn IdGen> = Arc::new(Snowflake::new(clock.clone(), crate::env::node_id()));
    let templater = Arc::new(ExprEvaluator);

    let runtime = Arc::new(Runtime::new(
        Arc::clone(&state),
        Arc::clone(&ids),
        clock.clone(),
        templater,
    ));
    let queue = Arc::new(QueueService::new(
        Arc::clone(&state),
        bus.clone(),
        Arc::clone(&ids),
        clock.clone(),
    ));

    let sweeper = Sweeper::new(
        Arc::clone(&state),
        bus.clone(),
        Arc::clone(&ids),
        clock.clone(),
        Arc::clone(&queue),
        Checkpointer::new(config.snapshot_path.clone()),
        SweeperConfig {
            server_name: crate::env::server_name(),
            server_uri: format!("http://{}", config.listen_addr),
            offline_after: crate::env::offline_after(),
            prune_after: crate::env::prune_after(),
            checkpoint_every: crate::env::checkpoint_every(),
        },
        processed_seq,
    );

    let api = AppState {
        state: Arc::clone(&state),
        bus: bus.clone(),
        ids,
        clock,
        queue,
    };

    let server = ServerState {
        config,
        lock_file,
        state,
        runtime,
        bus,
        sweeper,
        sweep_interval: crate::env::sweep_interval(),
    };

    Ok(StartupResult { server, api })
}
