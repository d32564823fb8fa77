// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Playbook validation: structural errors rejected before any execution.

use crate::model::{NextItem, Playbook};
use crate::template::TemplateError;
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlaybookError {
    #[error("malformed playbook document: {0}")]
    Malformed(String),

    #[error("playbook has no steps")]
    Empty,

    #[error("duplicate step name '{step}'")]
    DuplicateStep { step: String },

    #[error("step '{step}' routes to unknown step '{target}'")]
    UnknownTarget { step: String, target: String },

    #[error("step '{step}': 'until' is not supported — it is early termination, not filtering; use 'where'")]
    UntilUnsupported { step: String },

    #[error("step '{step}': iteration over a mapping is not allowed; convert it to a list upstream")]
    MappingIteration { step: String },

    #[error("step '{step}': a step cannot carry both 'loop' and plain 'tool' continuation retry")]
    LoopWithOnSuccess { step: String },

    #[error("step '{step}': template error: {source}")]
    Render {
        step: String,
        #[source]
        source: TemplateError,
    },
}

/// Validate a parsed playbook. Called by [`Playbook::from_value`].
pub fn validate(playbook: &Playbook) -> Result<(), PlaybookError> {
    if playbook.steps.is_empty() {
        return Err(PlaybookError::Empty);
    }

    let mut names = HashSet::new();
    for step in &playbook.steps {
        if !names.insert(step.step.as_str()) {
            return Err(PlaybookError::DuplicateStep { step: step.step.clone() });
        }
    }

    for step in &playbook.steps {
        if let Some(spec) = &step.loop_ {
            if spec.until.is_some() {
                return Err(PlaybookError::UntilUnsupported { step: step.step.clone() });
            }
            // A literal mapping collection is known-bad at validation time;
            // rendered mappings are caught again at expansion.
            if matches!(spec.collection, Value::Object(_)) {
                return Err(PlaybookError::MappingIteration { step: step.step.clone() });
            }
            if step.retry.as_ref().and_then(|r| r.on_success.as_ref()).is_some() {
                return Err(PlaybookError::LoopWithOnSuccess { step: step.step.clone() });
            }
        }

        for item in &step.next {
            match item {
                NextItem::Edge { step: target, .. } => {
                    check_target(playbook, &step.step, target)?;
                }
                NextItem::Fan { then, .. } => {
                    for target in then {
                        check_target(playbook, &step.step, &target.step)?;
                    }
                }
            }
        }
        for rule in &step.case {
            for target in &rule.then {
                check_target(playbook, &step.step, &target.step)?;
            }
        }
    }

    Ok(())
}

fn check_target(playbook: &Playbook, step: &str, target: &str) -> Result<(), PlaybookError> {
    if playbook.get_step(target).is_none() {
        return Err(PlaybookError::UnknownTarget {
            step: step.to_string(),
            target: target.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
