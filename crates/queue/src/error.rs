// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use control_core::CoreError;
use thiserror::Error;

/// Errors surfaced by the [`crate::Queue`] contract.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("topic not found: {0}")]
    NotFound(String),
    #[error("transient queue error: {0}")]
    Transient(String),
}

impl From<QueueError> for CoreError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::NotFound(msg) => CoreError::NotFound(msg),
            QueueError::Transient(msg) => CoreError::Transient(msg),
        }
    }
}
