// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod commands;
mod output;
mod runtime;

use anyhow::Result;
use clap::{Parser, Subcommand};
use output::OutputFormat;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "ctl",
    version = concat!(env!("CARGO_PKG_VERSION"), "+", env!("BUILD_GIT_HASH")),
    about = "Control plane CLI"
)]
struct Cli {
    /// Directory for the filesystem Store driver. Omit to use an ephemeral
    /// in-memory store scoped to this invocation.
    #[arg(long, env = "DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Output format for inspection commands.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    format: OutputFormat,

    /// How long to wait for a run to reach quiescence after submit or a
    /// gate decision before giving up.
    #[arg(long, default_value_t = 30_000, global = true)]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit a plan file and run it to quiescence.
    Submit {
        plan_file: PathBuf,
        #[arg(long, default_value = "cli")]
        project: String,
    },
    /// Inspect runs.
    Runs {
        #[command(subcommand)]
        command: commands::runs::RunsCommand,
    },
    /// Inspect a run's event timeline.
    Events {
        #[command(subcommand)]
        command: commands::events::EventsCommand,
    },
    /// Resolve gate decisions.
    Gates {
        #[command(subcommand)]
        command: commands::gates::GatesCommand,
    },
    /// Inspect the dead-letter queue for a topic.
    Dlq {
        #[command(subcommand)]
        command: commands::dlq::DlqCommand,
    },
    /// Administrative operations with no ordinary-operation counterpart.
    Admin {
        #[command(subcommand)]
        command: commands::admin::AdminCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let store = runtime::open_store(cli.data_dir.as_deref())?;
    let timeout = Duration::from_millis(cli.timeout_ms);

    match cli.command {
        Command::Submit { plan_file, project } => {
            commands::submit::run(store, plan_file, project, timeout, cli.format).await
        }
        Command::Runs { command } => commands::runs::dispatch(store, command, cli.format),
        Command::Events { command } => commands::events::dispatch(store, command, cli.format),
        Command::Gates { command } => commands::gates::dispatch(store, command, timeout, cli.format).await,
        Command::Dlq { command } => commands::dlq::dispatch(command),
        Command::Admin { command } => commands::admin::dispatch(store, command),
    }
}
