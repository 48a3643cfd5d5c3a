// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::output::{print_run, OutputFormat};
use anyhow::Result;
use clap::Subcommand;
use control_core::RunId;
use control_store::Store;
use std::sync::Arc;

#[derive(Subcommand)]
pub enum RunsCommand {
    /// List the most recently created runs.
    List {
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Show one run by id.
    Show { run_id: String },
}

pub fn dispatch(store: Arc<dyn Store>, command: RunsCommand, format: OutputFormat) -> Result<()> {
    match command {
        RunsCommand::List { limit } => {
            for run in store.list_runs(limit)? {
                print_run(&run, format);
            }
        }
        RunsCommand::Show { run_id } => {
            let run = store.get_run(&RunId::from(run_id.as_str()))?;
            print_run(&run, format);
        }
    }
    Ok(())
}
