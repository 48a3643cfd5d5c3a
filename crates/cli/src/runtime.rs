// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Assembles a Store + Queue + Coordinator + Worker for one `ctl`
//! invocation. There is no IPC transport to a long-running `ctld`, so every
//! command opens its own pipeline: the Store persists across invocations
//! when `--data-dir` points at an `fs` directory, but the Queue (and
//! therefore its DLQ) is in-process only and does not survive past the
//! command that created it.

use anyhow::{Context, Result};
use control_engine::{Coordinator, Worker};
use control_queue::{MemoryQueue, Queue};
use control_store::{FsStore, MemoryStore, Store};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub fn open_store(data_dir: Option<&Path>) -> Result<Arc<dyn Store>> {
    match data_dir {
        Some(dir) => {
            let store = FsStore::open(dir).with_context(|| format!("opening {}", dir.display()))?;
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(MemoryStore::new())),
    }
}

/// Brings a run to quiescence (terminal, or blocked on a gate) by running
/// the worker pool against a fresh Queue until nothing is left waiting or
/// in flight, then tearing the subscription down.
pub async fn drain(
    store: Arc<dyn Store>,
    run_id: &control_core::RunId,
    timeout: Duration,
) -> Result<control_core::Run> {
    let queue: Arc<dyn Queue> = Arc::new(MemoryQueue::new());
    let coordinator = Arc::new(Coordinator::new(store.clone(), queue.clone()));
    coordinator.reconcile(run_id)?;

    let worker = Arc::new(Worker::new(store.clone(), Arc::new(control_engine::test_support::registry()), coordinator));
    let concurrency = std::env::var("WORKER_CONCURRENCY").ok().and_then(|s| s.parse().ok()).unwrap_or(4);
    let subscription = worker.subscribe(queue.as_ref(), concurrency)?;

    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let run = store.get_run(run_id)?;
        let counts = queue.counts(control_engine::STEP_READY_TOPIC)?;
        if run.status.is_terminal() || (counts.waiting == 0 && counts.in_flight == 0) {
            subscription.shutdown().await;
            return Ok(store.get_run(run_id)?);
        }
        if tokio::time::Instant::now() >= deadline {
            subscription.shutdown().await;
            anyhow::bail!("run {run_id} did not reach quiescence within {timeout:?}");
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
