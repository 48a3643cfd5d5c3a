// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! control-daemon: process assembly. Reads configuration from the
//! environment once at startup, wires Store + Queue + Coordinator + Worker
//! pool, and exposes a handle `main` can drain on shutdown.

pub mod env;
mod error;

pub use error::DaemonError;

use control_engine::{Coordinator, StaticToolRegistry, Worker};
use control_queue::{MemoryQueue, Queue, SubscriptionHandle};
use control_store::{FsStore, MemoryStore, Store};
use std::sync::Arc;

/// Resolved startup configuration (env var table in `env.rs`).
#[derive(Debug, Clone)]
pub struct Config {
    pub worker_concurrency: usize,
    pub step_timeout_ms: u64,
    pub queue_driver: String,
    pub data_driver: String,
    pub data_dir: std::path::PathBuf,
    pub backpressure_threshold: usize,
    pub backpressure_age_ms: u64,
}

impl Config {
    pub fn load() -> Result<Self, DaemonError> {
        let queue_driver = env::queue_driver();
        if queue_driver != "memory" {
            return Err(DaemonError::UnsupportedDriver { knob: "QUEUE_DRIVER", value: queue_driver });
        }
        let data_driver = env::data_driver();
        if data_driver != "memory" && data_driver != "fs" {
            return Err(DaemonError::UnsupportedDriver { knob: "DATA_DRIVER", value: data_driver });
        }

        let requested_attempts = env::step_max_attempts();
        if requested_attempts != control_queue::MAX_ATTEMPTS {
            tracing::warn!(
                requested = requested_attempts,
                shipped = control_queue::MAX_ATTEMPTS,
                "STEP_MAX_ATTEMPTS override is not honored by the memory queue driver"
            );
        }

        Ok(Self {
            worker_concurrency: env::worker_concurrency(),
            step_timeout_ms: env::step_timeout().as_millis() as u64,
            queue_driver,
            data_driver,
            data_dir: env::data_dir(),
            backpressure_threshold: env::backpressure_threshold(),
            backpressure_age_ms: env::backpressure_age_ms(),
        })
    }
}

/// The assembled pipeline: a live Store, a live Queue with one Worker
/// subscription already running, and the Coordinator used to submit work
/// and make gate decisions.
pub struct Daemon {
    pub store: Arc<dyn Store>,
    pub queue: Arc<dyn Queue>,
    pub coordinator: Arc<Coordinator>,
    heartbeat: control_engine::Heartbeat,
    subscription: Option<SubscriptionHandle>,
    heartbeat_ticker: Option<tokio::task::JoinHandle<()>>,
}

/// Worker heartbeats are advanced at most every 5s, independent of
/// delivery traffic.
const HEARTBEAT_INTERVAL_MS: u64 = 5_000;

impl Daemon {
    /// Builds the Store/Queue/Coordinator/Worker pipeline from `config` and
    /// starts the worker pool consuming `step.ready`. Tools come from
    /// `control_engine::test_support::registry` (`test:echo`, `test:sleep`,
    /// `test:fail`) — the only tool surface named in scope.
    pub fn start(config: &Config) -> Result<Self, DaemonError> {
        let store: Arc<dyn Store> = match config.data_driver.as_str() {
            "fs" => Arc::new(FsStore::open(&config.data_dir)?),
            _ => Arc::new(MemoryStore::new()),
        };
        let queue: Arc<dyn Queue> = Arc::new(MemoryQueue::new());
        let coordinator = Arc::new(
            Coordinator::new(store.clone(), queue.clone())
                .with_backpressure(config.backpressure_threshold, config.backpressure_age_ms),
        );

        let registry = Arc::new(registry());
        let worker = Arc::new(
            Worker::new(store.clone(), registry, coordinator.clone())
                .with_timeout(std::time::Duration::from_millis(config.step_timeout_ms)),
        );
        let heartbeat = worker.heartbeat();
        let subscription = worker.subscribe(queue.as_ref(), config.worker_concurrency)?;

        // Advance the liveness marker on a fixed tick so it keeps moving
        // even when `step.ready` is quiet; consulted only by external
        // health checks, never by scheduling logic.
        let ticker_heartbeat = heartbeat.clone();
        let heartbeat_ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_millis(HEARTBEAT_INTERVAL_MS));
            loop {
                interval.tick().await;
                ticker_heartbeat.mark();
            }
        }));

        tracing::info!(
            worker_concurrency = config.worker_concurrency,
            step_timeout_ms = config.step_timeout_ms,
            data_driver = %config.data_driver,
            "daemon started"
        );

        Ok(Self { store, queue, coordinator, heartbeat, subscription: Some(subscription), heartbeat_ticker })
    }

    /// Epoch-ms timestamp of the most recent worker heartbeat; `0` before
    /// the first tick. Consulted by health checks, not by scheduling.
    pub fn heartbeat_epoch_ms(&self) -> u64 {
        self.heartbeat.last_epoch_ms()
    }

    /// Stops the worker pool from pulling new deliveries and waits for
    /// in-flight handler calls to finish.
    pub async fn shutdown(mut self) {
        if let Some(ticker) = self.heartbeat_ticker.take() {
            ticker.abort();
        }
        if let Some(sub) = self.subscription.take() {
            sub.shutdown().await;
        }
        tracing::info!("daemon drained");
    }
}

fn registry() -> StaticToolRegistry {
    control_engine::test_support::registry()
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
