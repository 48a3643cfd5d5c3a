// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::output::{print_run, OutputFormat};
use crate::runtime;
use anyhow::{Context, Result};
use control_core::Plan;
use control_store::Store;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Submits a plan and drives it to quiescence (every step terminal, or a
/// gate left pending) before returning.
pub async fn run(
    store: Arc<dyn Store>,
    plan_file: PathBuf,
    project: String,
    timeout: Duration,
    format: OutputFormat,
) -> Result<()> {
    let raw = std::fs::read_to_string(&plan_file)
        .with_context(|| format!("reading {}", plan_file.display()))?;
    let plan = Plan::parse(&raw).context("parsing plan")?;

    let run = store.create_run(plan, &project)?;
    let run = runtime::drain(store, &run.id, timeout).await?;
    print_run(&run, format);

    if run.status == control_core::RunStatus::Failed {
        anyhow::bail!("run {} failed", run.id);
    }
    Ok(())
}
