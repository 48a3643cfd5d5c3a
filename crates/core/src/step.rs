// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step identifier and state machine.

use serde::{Deserialize, Serialize};
use serde_json::Value;

crate::define_id! {
    /// Unique identifier for a step instance.
    pub struct StepId("stp-");
}

/// Status of a step. Follows the DAG `queued -> running -> terminal`
/// with no back-transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
    TimedOut,
}

crate::simple_display! {
    StepStatus {
        Queued => "queued",
        Running => "running",
        Succeeded => "succeeded",
        Failed => "failed",
        Cancelled => "cancelled",
        TimedOut => "timed_out",
    }
}

impl StepStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, StepStatus::Queued | StepStatus::Running)
    }

    /// Whether `self -> next` is a legal transition under the status DAG.
    pub fn can_transition_to(self, next: StepStatus) -> bool {
        match (self, next) {
            (StepStatus::Queued, StepStatus::Running) => true,
            (StepStatus::Running, StepStatus::Succeeded)
            | (StepStatus::Running, StepStatus::Failed)
            | (StepStatus::Running, StepStatus::Cancelled)
            | (StepStatus::Running, StepStatus::TimedOut) => true,
            // Cancellation may also reach a queued (not yet claimed) step directly.
            (StepStatus::Queued, StepStatus::Cancelled) => true,
            _ => false,
        }
    }
}

/// A step: one unit of work executed by one tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    pub run_id: crate::run::RunId,
    pub name: String,
    pub tool: String,
    pub inputs: Value,
    pub status: StepStatus,
    pub outputs: Option<Value>,
    pub idempotency_key: Option<String>,
    pub started_at_epoch_ms: Option<u64>,
    pub ended_at_epoch_ms: Option<u64>,
    pub depends_on: Vec<String>,
    pub gate_types: Vec<String>,
    #[serde(default)]
    pub tools_allowed: Option<Vec<String>>,
    #[serde(default)]
    pub env_allowed: Option<Vec<String>>,
    #[serde(default)]
    pub secrets_scope: Option<String>,
}

impl Step {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: StepId,
        run_id: crate::run::RunId,
        name: String,
        tool: String,
        inputs: Value,
        idempotency_key: Option<String>,
        depends_on: Vec<String>,
        gate_types: Vec<String>,
    ) -> Self {
        Self {
            id,
            run_id,
            name,
            tool,
            inputs,
            status: StepStatus::Queued,
            outputs: None,
            idempotency_key,
            started_at_epoch_ms: None,
            ended_at_epoch_ms: None,
            depends_on,
            gate_types,
            tools_allowed: None,
            env_allowed: None,
            secrets_scope: None,
        }
    }
}

/// A partial update to a [`Step`]; unset fields leave the current value alone.
#[derive(Debug, Clone, Default)]
pub struct StepPatch {
    pub status: Option<StepStatus>,
    pub outputs: Option<Value>,
    pub started_at_epoch_ms: Option<u64>,
    pub ended_at_epoch_ms: Option<u64>,
}

#[cfg(test)]
#[path = "step_tests.rs"]
mod tests;
