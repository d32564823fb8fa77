// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    retriable = { Fault::Retriable("db".into()), true },
    timeout = { Fault::Timeout("30s".into()), true },
    tool = { Fault::Tool("500".into()), true },
    validation = { Fault::Validation("bad".into()), false },
    conflict = { Fault::Conflict("lease".into()), false },
    fatal = { Fault::Fatal("invariant".into()), false },
)]
fn retriability(fault: Fault, expected: bool) {
    assert_eq!(fault.is_retriable(), expected);
}

#[test]
fn reasons_only_for_timeout_and_cancel() {
    assert_eq!(Fault::Timeout("x".into()).reason(), Some("timeout"));
    assert_eq!(Fault::Cancelled("x".into()).reason(), Some("cancelled"));
    assert_eq!(Fault::Tool("x".into()).reason(), None);
}

#[test]
fn truncation_preserves_short_messages() {
    assert_eq!(truncate_error("boom"), "boom");
}

#[test]
fn truncation_cuts_at_limit() {
    let long = "x".repeat(2 * ERROR_MESSAGE_LIMIT);
    let cut = truncate_error(&long);
    assert!(cut.len() < long.len());
    assert!(cut.ends_with("[truncated]"));
    assert_eq!(cut.chars().filter(|c| *c == 'x').count(), ERROR_MESSAGE_LIMIT);
}

#[test]
fn serializes_with_class_tag() {
    let v = serde_json::to_value(Fault::Conflict("dup".into())).unwrap();
    assert_eq!(v["class"], "conflict");
    assert_eq!(v["message"], "dup");
}
