// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::output::{print_gate, OutputFormat};
use crate::runtime;
use anyhow::Result;
use clap::Subcommand;
use control_core::GateId;
use control_engine::Coordinator;
use control_queue::MemoryQueue;
use control_store::Store;
use std::sync::Arc;
use std::time::Duration;

#[derive(Subcommand)]
pub enum GatesCommand {
    /// Approve a pending gate, unblocking the step(s) waiting on it.
    Approve {
        gate_id: String,
        #[arg(long)]
        actor: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Waive a pending gate (same effect as approval, distinct audit trail).
    Waive {
        gate_id: String,
        #[arg(long)]
        actor: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Fail a pending gate, cascading cancellation to its dependents.
    Fail {
        gate_id: String,
        #[arg(long)]
        reason: Option<String>,
    },
}

pub async fn dispatch(
    store: Arc<dyn Store>,
    command: GatesCommand,
    timeout: Duration,
    format: OutputFormat,
) -> Result<()> {
    let coordinator = Arc::new(Coordinator::new(store.clone(), Arc::new(MemoryQueue::new())));

    let gate_id = match &command {
        GatesCommand::Approve { gate_id, .. }
        | GatesCommand::Waive { gate_id, .. }
        | GatesCommand::Fail { gate_id, .. } => GateId::from(gate_id.as_str()),
    };

    match command {
        GatesCommand::Approve { actor, reason, .. } => coordinator.approve_gate(&gate_id, &actor, reason)?,
        GatesCommand::Waive { actor, reason, .. } => coordinator.waive_gate(&gate_id, &actor, reason)?,
        GatesCommand::Fail { reason, .. } => coordinator.fail_gate(&gate_id, reason)?,
    }

    let gate = store.get_gate(&gate_id)?;
    runtime::drain(store, &gate.run_id, timeout).await?;
    print_gate(&gate, format);
    Ok(())
}
