// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dead-letter inspection. The Queue has no durable driver in scope, so the
//! DLQ these commands see is scoped to this process only — meaningful right
//! after a `ctl submit` in the same invocation reported a failure, not as a
//! standing view onto a separately-running `ctld`.

use anyhow::Result;
use clap::Subcommand;
use control_queue::{MemoryQueue, Queue};
use std::sync::Arc;

#[derive(Subcommand)]
pub enum DlqCommand {
    /// List payloads dead-lettered on a topic (defaults to `step.ready`).
    List { topic: Option<String> },
    /// Rehydrate up to `max` dead-lettered payloads back onto the topic.
    Rehydrate {
        topic: Option<String>,
        #[arg(long, default_value_t = 10)]
        max: usize,
    },
}

pub fn dispatch(command: DlqCommand) -> Result<()> {
    let queue: Arc<dyn Queue> = Arc::new(MemoryQueue::new());
    match command {
        DlqCommand::List { topic } => {
            let topic = topic.unwrap_or_else(|| control_engine::STEP_READY_TOPIC.to_string());
            for payload in queue.list_dlq(&topic)? {
                println!("{payload}");
            }
        }
        DlqCommand::Rehydrate { topic, max } => {
            let topic = topic.unwrap_or_else(|| control_engine::STEP_READY_TOPIC.to_string());
            let n = queue.rehydrate_dlq(&topic, max)?;
            println!("rehydrated {n} payload(s)");
        }
    }
    Ok(())
}
