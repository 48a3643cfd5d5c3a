// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("unsupported {knob}: {value:?}")]
    UnsupportedDriver { knob: &'static str, value: String },
    #[error("store init failed: {0}")]
    Store(#[from] control_store::StoreError),
    #[error("queue subscribe failed: {0}")]
    Queue(#[from] control_queue::QueueError),
}
