// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! control-queue: topic-based work distribution behind the
//! [`Queue`] contract, with [`MemoryQueue`] as the sole shipped driver.
//! Delivery is at-least-once, ordered per consumer only; failed handler
//! calls are retried with jittered exponential backoff up to
//! [`backoff::MAX_ATTEMPTS`] attempts before landing in that topic's DLQ.

mod backoff;
mod error;
mod memory;
mod message;
mod subscription;

pub use backoff::{backoff_ms, BASE_DELAY_MS, MAX_ATTEMPTS, MAX_BACKOFF_MS};
pub use error::QueueError;
pub use memory::MemoryQueue;
pub use message::{HandlerError, QueueCounts, QueueMessage};
pub use subscription::SubscriptionHandle;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// One consumer's delivery callback for a `subscribe` call. `attempt` is
/// 1 on first delivery, incremented on every retryable redelivery.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, payload: Value, attempt: u32) -> Result<(), HandlerError>;
}

/// The Queue contract: enqueue, subscribe, DLQ inspection and
/// rehydration, depth/age telemetry.
pub trait Queue: Send + Sync {
    fn enqueue(&self, topic: &str, payload: Value, delay_ms: Option<u64>) -> Result<(), QueueError>;
    fn subscribe(
        &self,
        topic: &str,
        concurrency: usize,
        handler: Arc<dyn Handler>,
    ) -> Result<SubscriptionHandle, QueueError>;
    fn list_dlq(&self, topic: &str) -> Result<Vec<Value>, QueueError>;
    fn rehydrate_dlq(&self, topic: &str, max: usize) -> Result<usize, QueueError>;
    fn counts(&self, topic: &str) -> Result<QueueCounts, QueueError>;
    fn oldest_age_ms(&self, topic: &str) -> Result<Option<u64>, QueueError>;
}
