// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error types.

use baton_core::{CatalogId, ExecutionId};
use baton_playbook::{PlaybookError, TemplateError};
use baton_storage::WalError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("execution {0} not found")]
    ExecutionNotFound(ExecutionId),

    #[error("execution {execution}: step '{step}' not found in playbook")]
    StepNotFound { execution: ExecutionId, step: String },

    #[error("playbook {0} not found in catalog")]
    PlaybookNotFound(CatalogId),

    #[error("playbook error: {0}")]
    Playbook(#[from] PlaybookError),

    #[error("execution {execution} step '{step}': {source}")]
    Template {
        execution: ExecutionId,
        step: String,
        #[source]
        source: TemplateError,
    },

    #[error("storage error: {0}")]
    Storage(#[from] WalError),
}
