// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Playbook catalog event handlers.

use super::types::PlaybookEntry;
use super::MaterializedState;
use baton_core::{Event, EventKind};

pub(crate) fn apply(state: &mut MaterializedState, event: &Event) {
    if let EventKind::PlaybookRegistered { catalog_id, path, version, content_hash, document } =
        &event.kind
    {
        // Idempotency: registration is content-addressed upstream
        if state.catalog.contains_key(catalog_id) {
            return;
        }
        state.catalog.insert(
            *catalog_id,
            PlaybookEntry {
                catalog_id: *catalog_id,
                path: path.clone(),
                version: version.clone(),
                content_hash: content_hash.clone(),
                document: document.clone(),
                registered_at: event.timestamp,
            },
        );
        state
            .catalog_paths
            .insert(PlaybookEntry::path_key(path, version), *catalog_id);
    }
}
