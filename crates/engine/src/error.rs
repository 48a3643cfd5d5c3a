// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use control_core::CoreError;
use control_queue::QueueError;
use control_store::StoreError;
use thiserror::Error;

/// Errors surfaced by the Run Coordinator, Gate Engine and Worker.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid plan: {0}")]
    InvalidPlan(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Queue(#[from] QueueError),
    #[error("step timed out: {0}")]
    Timeout(String),
    #[error("fatal error: {0}")]
    Fatal(String),
}

impl From<EngineError> for CoreError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidPlan(msg) => CoreError::InvalidPlan(msg),
            EngineError::Store(e) => e.into(),
            EngineError::Queue(e) => e.into(),
            EngineError::Timeout(msg) => CoreError::Timeout(msg),
            EngineError::Fatal(msg) => CoreError::Fatal(msg),
        }
    }
}
