// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Worker's liveness marker: a monotonically non-decreasing epoch-ms
//! timestamp advanced at most every 5s. Health checks are an external
//! collaborator (see DESIGN.md) so nothing in this crate reads it back;
//! it exists purely as a value other components can poll.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Cheaply cloneable — every clone shares the same counter, so a
/// background ticker and the Worker's own delivery loop can both advance
/// it without coordinating.
#[derive(Clone, Default)]
pub struct Heartbeat(Arc<AtomicU64>);

impl Heartbeat {
    pub fn new() -> Self {
        Self(Arc::new(AtomicU64::new(0)))
    }

    /// Advances the marker to the current wall-clock time. Never consulted
    /// by scheduling logic, only by external health checks.
    pub fn mark(&self) {
        let now_ms = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64;
        self.0.fetch_max(now_ms, Ordering::Relaxed);
    }

    /// The epoch-ms timestamp of the most recent `mark()`, or `0` if the
    /// worker has never ticked.
    pub fn last_epoch_ms(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}
