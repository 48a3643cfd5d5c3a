// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run timeline events.
//!
//! Serializes with `{"type": "event:name", ...fields}`, a tagged-enum event
//! log. `EventKind` carries only payload shape — the envelope (`run_id`,
//! `sequence`, `occurred_at`) is a separate [`Event`] struct, since
//! sequencing is a Store concern, not a property of the event itself.

use crate::gate::GateId;
use crate::run::RunId;
use crate::step::StepId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

crate::define_id! {
    /// Unique identifier for an event row (distinct from its per-run sequence).
    pub struct EventId("evt-");
}

/// The typed payload of a timeline event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventKind {
    #[serde(rename = "run.created")]
    RunCreated { goal: String, step_count: usize },

    /// Not emitted by `Coordinator::reconcile` — run-level status
    /// transitions other than creation and cancellation are status-only,
    /// per Scenario 1's pinned timeline. Kept for manual recording.
    #[serde(rename = "run.running")]
    RunRunning,

    #[serde(rename = "run.blocked")]
    RunBlocked,

    #[serde(rename = "run.succeeded")]
    RunSucceeded,

    #[serde(rename = "run.failed")]
    RunFailed,

    #[serde(rename = "run.cancelled")]
    RunCancelled,

    #[serde(rename = "step.started")]
    StepStarted { step_name: String },

    #[serde(rename = "step.succeeded")]
    StepSucceeded { step_name: String, outputs: Value },

    #[serde(rename = "step.failed")]
    StepFailed {
        step_name: String,
        error: String,
        retryable: bool,
        attempt: u32,
    },

    #[serde(rename = "step.cancelled")]
    StepCancelled { step_name: String },

    #[serde(rename = "step.timed_out")]
    StepTimedOut { step_name: String, attempt: u32 },

    #[serde(rename = "gate.created")]
    GateCreated { gate_id: GateId, gate_type: String },

    #[serde(rename = "gate.approved")]
    GateApproved {
        gate_id: GateId,
        actor: String,
        reason: Option<String>,
    },

    #[serde(rename = "gate.waived")]
    GateWaived {
        gate_id: GateId,
        actor: String,
        reason: Option<String>,
    },

    #[serde(rename = "gate.failed")]
    GateFailed { gate_id: GateId, reason: Option<String> },

    #[serde(rename = "run.rolled_back")]
    RunRolledBack { to_sequence: u64 },
}

impl EventKind {
    /// The `{family}.{verb}` tag used in logs and the wire format.
    pub fn tag(&self) -> &'static str {
        match self {
            EventKind::RunCreated { .. } => "run.created",
            EventKind::RunRunning => "run.running",
            EventKind::RunBlocked => "run.blocked",
            EventKind::RunSucceeded => "run.succeeded",
            EventKind::RunFailed => "run.failed",
            EventKind::RunCancelled => "run.cancelled",
            EventKind::StepStarted { .. } => "step.started",
            EventKind::StepSucceeded { .. } => "step.succeeded",
            EventKind::StepFailed { .. } => "step.failed",
            EventKind::StepCancelled { .. } => "step.cancelled",
            EventKind::StepTimedOut { .. } => "step.timed_out",
            EventKind::GateCreated { .. } => "gate.created",
            EventKind::GateApproved { .. } => "gate.approved",
            EventKind::GateWaived { .. } => "gate.waived",
            EventKind::GateFailed { .. } => "gate.failed",
            EventKind::RunRolledBack { .. } => "run.rolled_back",
        }
    }
}

/// One row in a run's append-only timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub run_id: RunId,
    /// 1-based, contiguous within a run.
    pub sequence: u64,
    pub step_id: Option<StepId>,
    pub kind: EventKind,
    pub occurred_at_epoch_ms: u64,
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
