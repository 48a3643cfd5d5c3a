// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::ValueEnum;
use control_core::{Event, Gate, Run};
use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

pub fn print_run(run: &Run, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(run),
        OutputFormat::Text => println!(
            "{}  {:<10}  project={}  goal={:?}",
            run.id, run.status, run.project_id, run.plan.goal
        ),
    }
}

pub fn print_event(event: &Event, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(event),
        OutputFormat::Text => println!("#{:<4} {:<18} {}", event.sequence, event.kind.tag(), event.id),
    }
}

pub fn print_gate(gate: &Gate, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(gate),
        OutputFormat::Text => {
            println!("{}  {:<8}  type={}  run={}", gate.id, gate.status, gate.gate_type, gate.run_id)
        }
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(err) => eprintln!("failed to serialize output: {err}"),
    }
}
