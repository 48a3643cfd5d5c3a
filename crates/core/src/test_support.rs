// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test fixtures for downstream crates (gated behind `test-support`).
//!
//! Exposes builder helpers from this crate for other crates' test suites
//! rather than re-deriving sample domain values in every crate.

use crate::gate::{Gate, GateId};
use crate::plan::{GateDecl, Plan, StepSpec};
use crate::run::{Run, RunId};
use crate::step::{Step, StepId};
use serde_json::{json, Value};

/// A single-step plan using the `test:echo` tool, for tests that don't
/// care about plan shape.
pub fn sample_plan() -> Plan {
    Plan::parse(r#"{"goal":"demo","steps":[{"name":"echo","tool":"test:echo"}]}"#)
        .expect("sample_plan is a valid literal plan")
}

/// Builds a plan from `(name, tool, depends_on)` triples, skipping JSON
/// round-tripping for tests that need to construct plans programmatically.
pub fn plan_with_steps(steps: &[(&str, &str, &[&str])]) -> Plan {
    Plan {
        goal: "test".into(),
        steps: steps
            .iter()
            .map(|(name, tool, deps)| StepSpec {
                name: (*name).to_string(),
                tool: (*tool).to_string(),
                inputs: Value::Object(serde_json::Map::new()),
                tools_allowed: None,
                env_allowed: None,
                secrets_scope: None,
                depends_on: deps.iter().map(|s| s.to_string()).collect(),
                gate: None,
            })
            .collect(),
    }
}

/// A gated single-step plan, for tests exercising the Gate Engine.
pub fn gated_plan(gate_type: &str) -> Plan {
    Plan {
        goal: "gated".into(),
        steps: vec![StepSpec {
            name: "approve_me".into(),
            tool: "test:echo".into(),
            inputs: json!({}),
            tools_allowed: None,
            env_allowed: None,
            secrets_scope: None,
            depends_on: Vec::new(),
            gate: Some(GateDecl {
                gate_type: gate_type.into(),
            }),
        }],
    }
}

pub fn sample_run(epoch_ms: u64) -> Run {
    Run::new(RunId::new(), "proj-test".into(), sample_plan(), epoch_ms)
}

pub fn sample_step_for(run_id: RunId, epoch_ms: u64) -> Step {
    let _ = epoch_ms;
    Step::new(
        StepId::new(),
        run_id,
        "echo".into(),
        "test:echo".into(),
        json!({}),
        None,
        Vec::new(),
        Vec::new(),
    )
}

pub fn sample_gate_for(run_id: RunId, epoch_ms: u64) -> Gate {
    Gate::new(GateId::new(), run_id, None, "approval".into(), epoch_ms)
}
