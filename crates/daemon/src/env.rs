// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

/// `WORKER_CONCURRENCY` — parallel handler tasks per process.
pub fn worker_concurrency() -> usize {
    std::env::var("WORKER_CONCURRENCY").ok().and_then(|s| s.parse().ok()).unwrap_or(4)
}

/// `STEP_TIMEOUT_MS` — wall-clock budget for one tool execution.
pub fn step_timeout() -> Duration {
    std::env::var("STEP_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_millis(control_engine::STEP_TIMEOUT_MS))
}

/// `STEP_MAX_ATTEMPTS` — read and validated against the shipped
/// `MemoryQueue` driver's fixed retry schedule (`control_queue::MAX_ATTEMPTS`);
/// the in-process driver does not take this per-instance, so a mismatching
/// override is logged and ignored rather than silently honored.
pub fn step_max_attempts() -> u32 {
    std::env::var("STEP_MAX_ATTEMPTS").ok().and_then(|s| s.parse().ok()).unwrap_or(control_queue::MAX_ATTEMPTS)
}

/// `STEP_BACKOFF_BASE_MS` — see [`step_max_attempts`] caveat.
pub fn step_backoff_base_ms() -> u64 {
    std::env::var("STEP_BACKOFF_BASE_MS").ok().and_then(|s| s.parse().ok()).unwrap_or(control_queue::BASE_DELAY_MS)
}

/// `STEP_BACKOFF_MAX_MS` — see [`step_max_attempts`] caveat.
pub fn step_backoff_max_ms() -> u64 {
    std::env::var("STEP_BACKOFF_MAX_MS").ok().and_then(|s| s.parse().ok()).unwrap_or(control_queue::MAX_BACKOFF_MS)
}

/// `QUEUE_DRIVER` — only `memory` is shipped.
pub fn queue_driver() -> String {
    std::env::var("QUEUE_DRIVER").unwrap_or_else(|_| "memory".to_string())
}

/// `DATA_DRIVER` — `memory` or `fs`; `fs` additionally consults
/// [`data_dir`].
pub fn data_driver() -> String {
    std::env::var("DATA_DRIVER").unwrap_or_else(|_| "memory".to_string())
}

/// Root directory for the `fs` Store driver: `DATA_DIR` >
/// `XDG_STATE_HOME/control` > `~/.local/state/control`.
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("DATA_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("control");
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".local/state/control")
}

/// `BACKPRESSURE_AGE_MS` — deferred-enqueue delay once `step.ready` is
/// saturated, default 5s.
pub fn backpressure_age_ms() -> u64 {
    std::env::var("BACKPRESSURE_AGE_MS").ok().and_then(|s| s.parse().ok()).unwrap_or(5_000)
}

/// `BACKPRESSURE_THRESHOLD` — waiting-count threshold default 100.
pub fn backpressure_threshold() -> usize {
    std::env::var("BACKPRESSURE_THRESHOLD").ok().and_then(|s| s.parse().ok()).unwrap_or(100)
}
