// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::output::{print_event, OutputFormat};
use anyhow::Result;
use clap::Subcommand;
use control_core::RunId;
use control_store::Store;
use std::sync::Arc;

#[derive(Subcommand)]
pub enum EventsCommand {
    /// List a run's timeline, optionally from a given sequence onward.
    List {
        run_id: String,
        #[arg(long)]
        since: Option<u64>,
    },
}

pub fn dispatch(store: Arc<dyn Store>, command: EventsCommand, format: OutputFormat) -> Result<()> {
    match command {
        EventsCommand::List { run_id, since } => {
            let run_id = RunId::from(run_id.as_str());
            for event in store.list_events(&run_id, since)? {
                print_event(&event, format);
            }
        }
    }
    Ok(())
}
