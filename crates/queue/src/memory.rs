// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process Queue driver — the sole shipped driver, with the trait left
//! open for a future broker-backed one. Each topic is an independent FIFO
//! with its own delayed set and DLQ, guarded by its own lock so busy
//! topics never contend with idle ones.

use crate::backoff::backoff_ms;
use crate::error::QueueError;
use crate::message::{HandlerError, QueueCounts, QueueMessage};
use crate::subscription::SubscriptionHandle;
use crate::{Handler, Queue};
use control_core::{Clock, SystemClock};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const MAX_ATTEMPTS: u32 = crate::backoff::MAX_ATTEMPTS;
const IDLE_POLL_MS: u64 = 50;

#[derive(Default)]
struct TopicState {
    ready: VecDeque<QueueMessage>,
    delayed: Vec<QueueMessage>,
    dlq: VecDeque<Value>,
    in_flight: usize,
}

impl TopicState {
    fn promote_due(&mut self, now_ms: u64) {
        if self.delayed.is_empty() {
            return;
        }
        let mut due: Vec<QueueMessage> =
            self.delayed.iter().filter(|m| m.available_at_epoch_ms <= now_ms).cloned().collect();
        self.delayed.retain(|m| m.available_at_epoch_ms > now_ms);
        due.sort_by_key(|m| m.available_at_epoch_ms);
        for m in due {
            self.ready.push_back(m);
        }
    }

    fn pop_ready(&mut self, now_ms: u64) -> Option<QueueMessage> {
        self.promote_due(now_ms);
        let msg = self.ready.pop_front();
        if msg.is_some() {
            self.in_flight += 1;
        }
        msg
    }

    fn oldest_enqueued_at(&self) -> Option<u64> {
        self.ready
            .iter()
            .chain(self.delayed.iter())
            .map(|m| m.enqueued_at_epoch_ms)
            .min()
    }
}

struct Topic {
    state: Mutex<TopicState>,
    notify: tokio::sync::Notify,
}

impl Topic {
    fn new() -> Self {
        Self { state: Mutex::new(TopicState::default()), notify: tokio::sync::Notify::new() }
    }
}

/// A `Queue` backed entirely by in-process topics. No persistence: a
/// process restart loses every in-flight and delayed message, matching
/// `MemoryStore`'s scope (tests, local/dev, embedded use).
pub struct MemoryQueue<C: Clock = SystemClock> {
    topics: Mutex<HashMap<String, Arc<Topic>>>,
    clock: C,
}

impl MemoryQueue<SystemClock> {
    pub fn new() -> Self {
        Self { topics: Mutex::new(HashMap::new()), clock: SystemClock }
    }
}

impl Default for MemoryQueue<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> MemoryQueue<C> {
    pub fn with_clock(clock: C) -> Self {
        Self { topics: Mutex::new(HashMap::new()), clock }
    }

    fn topic(&self, name: &str) -> Arc<Topic> {
        self.topics.lock().entry(name.to_string()).or_insert_with(|| Arc::new(Topic::new())).clone()
    }
}

async fn consumer_loop<C: Clock>(
    topic: Arc<Topic>,
    handler: Arc<dyn Handler>,
    clock: C,
    token: CancellationToken,
) {
    loop {
        if token.is_cancelled() {
            return;
        }
        let now = clock.epoch_ms();
        let popped = topic.state.lock().pop_ready(now);
        let Some(mut message) = popped else {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = topic.notify.notified() => {}
                _ = tokio::time::sleep(Duration::from_millis(IDLE_POLL_MS)) => {}
            }
            continue;
        };

        let outcome = handler.handle(message.payload.clone(), message.attempt).await;
        let mut state = topic.state.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        match outcome {
            Ok(()) => {}
            Err(HandlerError { message: msg, retryable }) => {
                if retryable && message.attempt < MAX_ATTEMPTS {
                    let next_attempt = message.attempt + 1;
                    message.attempt = next_attempt;
                    message.available_at_epoch_ms =
                        clock.epoch_ms() + backoff_ms(next_attempt - 1);
                    state.delayed.push(message);
                } else {
                    tracing::warn!(attempt = message.attempt, retryable, error = %msg, "delivery dead-lettered");
                    state.dlq.push_back(message.payload);
                }
            }
        }
        drop(state);
        topic.notify.notify_waiters();
    }
}

impl<C: Clock + 'static> Queue for MemoryQueue<C> {
    fn enqueue(&self, topic: &str, payload: Value, delay_ms: Option<u64>) -> Result<(), QueueError> {
        let now = self.clock.epoch_ms();
        let available_at = now + delay_ms.unwrap_or(0);
        let message = QueueMessage {
            payload,
            attempt: 1,
            enqueued_at_epoch_ms: now,
            available_at_epoch_ms: available_at,
        };
        let t = self.topic(topic);
        {
            let mut state = t.state.lock();
            if available_at <= now {
                state.ready.push_back(message);
            } else {
                state.delayed.push(message);
            }
        }
        t.notify.notify_waiters();
        Ok(())
    }

    fn subscribe(
        &self,
        topic: &str,
        concurrency: usize,
        handler: Arc<dyn Handler>,
    ) -> Result<SubscriptionHandle, QueueError> {
        if concurrency == 0 {
            return Err(QueueError::Transient("concurrency must be >= 1".into()));
        }
        let t = self.topic(topic);
        let token = CancellationToken::new();
        let mut tasks = Vec::with_capacity(concurrency);
        for _ in 0..concurrency {
            let t = t.clone();
            let handler = handler.clone();
            let clock = self.clock.clone();
            let token = token.clone();
            tasks.push(tokio::spawn(consumer_loop(t, handler, clock, token)));
        }
        Ok(SubscriptionHandle::new(token, tasks))
    }

    fn list_dlq(&self, topic: &str) -> Result<Vec<Value>, QueueError> {
        let t = self.topic(topic);
        Ok(t.state.lock().dlq.iter().cloned().collect())
    }

    fn rehydrate_dlq(&self, topic: &str, max: usize) -> Result<usize, QueueError> {
        let now = self.clock.epoch_ms();
        let t = self.topic(topic);
        let mut state = t.state.lock();
        let take = max.min(state.dlq.len());
        let mut moved = 0;
        for _ in 0..take {
            if let Some(payload) = state.dlq.pop_front() {
                state.ready.push_back(QueueMessage {
                    payload,
                    attempt: 1,
                    enqueued_at_epoch_ms: now,
                    available_at_epoch_ms: now,
                });
                moved += 1;
            }
        }
        drop(state);
        if moved > 0 {
            t.notify.notify_waiters();
        }
        Ok(moved)
    }

    fn counts(&self, topic: &str) -> Result<QueueCounts, QueueError> {
        let t = self.topic(topic);
        let state = t.state.lock();
        Ok(QueueCounts {
            waiting: state.ready.len() + state.delayed.len(),
            in_flight: state.in_flight,
            dlq: state.dlq.len(),
        })
    }

    fn oldest_age_ms(&self, topic: &str) -> Result<Option<u64>, QueueError> {
        let t = self.topic(topic);
        let now = self.clock.epoch_ms();
        Ok(t.state.lock().oldest_enqueued_at().map(|enqueued_at| now.saturating_sub(enqueued_at)))
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
