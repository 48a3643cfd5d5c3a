// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared error taxonomy.
//!
//! Every crate in the workspace surfaces one of these variants, wrapped or
//! re-exported through its own error enum via `#[from]`. The taxonomy
//! itself lives here so `control-store`, `control-queue` and
//! `control-engine` agree on what "not found" or "fatal" means without
//! depending on each other.

use thiserror::Error;

/// The error taxonomy shared across the control plane.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A submitted plan failed validation. Never retried.
    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    /// A referenced run/step/gate does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A state transition was attempted that the status DAG forbids.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// `createStep` collided with an existing `(runId, name)`; non-fatal,
    /// callers should use the existing row.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Transient I/O/network failure; safe to retry.
    #[error("transient error: {0}")]
    Transient(String),

    /// Policy denial, contract violation, or unknown tool; never retried.
    #[error("fatal error: {0}")]
    Fatal(String),

    /// A step exceeded `STEP_TIMEOUT_MS`.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The inbox said no; caller must silently stop, no state change.
    #[error("duplicate delivery")]
    DuplicateDelivery,
}

impl CoreError {
    /// Whether a worker should retry after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Transient(_) | CoreError::Timeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_and_timeout_are_retryable() {
        assert!(CoreError::Transient("io".into()).is_retryable());
        assert!(CoreError::Timeout("slow".into()).is_retryable());
    }

    #[test]
    fn fatal_and_invalid_are_not_retryable() {
        assert!(!CoreError::Fatal("policy".into()).is_retryable());
        assert!(!CoreError::InvalidPlan("empty steps".into()).is_retryable());
        assert!(!CoreError::NotFound("run".into()).is_retryable());
        assert!(!CoreError::InvalidTransition("bad".into()).is_retryable());
        assert!(!CoreError::AlreadyExists("step".into()).is_retryable());
        assert!(!CoreError::DuplicateDelivery.is_retryable());
    }
}
