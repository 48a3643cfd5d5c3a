// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use anyhow::Result;
use clap::Subcommand;
use control_core::RunId;
use control_store::Store;
use std::sync::Arc;

#[derive(Subcommand)]
pub enum AdminCommand {
    /// Permanently destroy a run and its steps/events/gates. Irreversible;
    /// never invoked by the Coordinator or Worker themselves.
    Prune {
        run_id: String,
        /// Required acknowledgement that this is destructive and irreversible.
        #[arg(long)]
        yes: bool,
    },
}

pub fn dispatch(store: Arc<dyn Store>, command: AdminCommand) -> Result<()> {
    match command {
        AdminCommand::Prune { run_id, yes } => {
            if !yes {
                anyhow::bail!("refusing to prune without --yes");
            }
            let run_id = RunId::from(run_id.as_str());
            store.prune_run(&run_id)?;
            println!("pruned {run_id}");
        }
    }
    Ok(())
}
