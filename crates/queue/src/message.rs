// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde_json::Value;

/// A message in flight on a topic. `attempt` starts at 1 and is
/// incremented on each redelivery; `payload` is preserved verbatim across
/// retries so the DLQ copy matches what the producer originally enqueued.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub payload: Value,
    pub attempt: u32,
    pub enqueued_at_epoch_ms: u64,
    pub available_at_epoch_ms: u64,
}

/// Aggregate depth of a topic: waiting, in-flight, and dead-lettered counts,
/// consulted by the Coordinator to decide whether to defer enqueueing onto a
/// saturated topic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueCounts {
    /// Messages ready or waiting out a delay, not currently handed to a consumer.
    pub waiting: usize,
    /// Messages currently handed to a consumer, awaiting outcome.
    pub in_flight: usize,
    /// Messages parked in `{topic}.dlq` after exhausting retries.
    pub dlq: usize,
}

/// A handler's verdict on one delivery — the retryable/fatal
/// classification, reused here so a fatal Worker error can skip straight
/// to the DLQ instead of burning through the full retry budget.
#[derive(Debug, Clone)]
pub struct HandlerError {
    pub message: String,
    pub retryable: bool,
}

impl HandlerError {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self { message: message.into(), retryable: true }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self { message: message.into(), retryable: false }
    }
}

impl std::fmt::Display for HandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for HandlerError {}
