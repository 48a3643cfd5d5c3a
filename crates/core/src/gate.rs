// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gate identifier and state machine.

use crate::run::RunId;
use crate::step::StepId;
use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a gate instance.
    pub struct GateId("gat-");
}

/// Status of a gate. `pending -> terminal` is one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    Pending,
    Passed,
    Waived,
    Failed,
}

crate::simple_display! {
    GateStatus {
        Pending => "pending",
        Passed => "passed",
        Waived => "waived",
        Failed => "failed",
    }
}

impl GateStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, GateStatus::Pending)
    }

    /// A step may advance once its gates are all `passed` or `waived`
    ///; a `failed` gate never unblocks a step.
    pub fn unblocks_step(self) -> bool {
        matches!(self, GateStatus::Passed | GateStatus::Waived)
    }
}

/// A gate: a policy/approval checkpoint attached to a run, optionally a step
///.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Gate {
    pub id: GateId,
    pub run_id: RunId,
    pub step_id: Option<StepId>,
    pub gate_type: String,
    pub status: GateStatus,
    pub approved_by: Option<String>,
    pub reason: Option<String>,
    pub created_at_epoch_ms: u64,
    pub resolved_at_epoch_ms: Option<u64>,
}

impl Gate {
    pub fn new(
        id: GateId,
        run_id: RunId,
        step_id: Option<StepId>,
        gate_type: String,
        epoch_ms: u64,
    ) -> Self {
        Self {
            id,
            run_id,
            step_id,
            gate_type,
            status: GateStatus::Pending,
            approved_by: None,
            reason: None,
            created_at_epoch_ms: epoch_ms,
            resolved_at_epoch_ms: None,
        }
    }
}

/// A partial update to a [`Gate`]; unset fields leave the current value alone.
#[derive(Debug, Clone, Default)]
pub struct GatePatch {
    pub status: Option<GateStatus>,
    pub approved_by: Option<String>,
    pub reason: Option<String>,
    pub resolved_at_epoch_ms: Option<u64>,
}

#[cfg(test)]
#[path = "gate_tests.rs"]
mod tests;
