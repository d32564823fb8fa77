// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime registry event handlers.

use super::MaterializedState;
use baton_core::registry::component_key;
use baton_core::{Event, EventKind, RuntimeStatus};

pub(crate) fn apply(state: &mut MaterializedState, event: &Event) {
    match &event.kind {
        EventKind::RuntimeRegistered { component } => {
            let key = component.key();
            match state.registry.get_mut(&key) {
                // Re-registration refreshes everything but keeps the row's
                // original creation time.
                Some(existing) => {
                    let created_at = existing.created_at;
                    *existing = component.clone();
                    existing.created_at = created_at;
                    existing.status = RuntimeStatus::Online;
                }
                None => {
                    state.registry.insert(key, component.clone());
                }
            }
        }

        EventKind::RuntimeOffline { kind, name } => {
            if let Some(row) = state.registry.get_mut(&component_key(*kind, name)) {
                row.status = RuntimeStatus::Offline;
                row.updated_at = event.timestamp;
            }
        }

        EventKind::RuntimeDeregistered { kind, name } => {
            state.registry.remove(&component_key(*kind, name));
        }

        _ => {}
    }
}
