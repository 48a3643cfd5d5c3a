// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store error taxonomy, the subset raised by `control-store`.

use control_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A submitted plan failed validation before any row was written.
    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    /// A referenced run/step/gate does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A state transition was attempted that the status DAG forbids.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// `createStep` collided with an existing `(runId, name)`; callers use
    /// the returned existing row instead of treating this as fatal.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Disk/lock I/O failure in a driver; safe to retry.
    #[error("transient store error: {0}")]
    Transient(String),
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidPlan(m) => CoreError::InvalidPlan(m),
            StoreError::NotFound(m) => CoreError::NotFound(m),
            StoreError::InvalidTransition(m) => CoreError::InvalidTransition(m),
            StoreError::AlreadyExists(m) => CoreError::AlreadyExists(m),
            StoreError::Transient(m) => CoreError::Transient(m),
        }
    }
}
