// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run Coordinator and Gate Engine.
//!
//! Reconciliation runs synchronously after every terminal or
//! gate-resolution Store write rather than on a separate polling loop.

use crate::error::EngineError;
use control_core::{
    Event, EventKind, GateId, GatePatch, GateStatus, Plan, Run, RunId, RunPatch, RunStatus, Step,
    StepId, StepPatch, StepStatus,
};
use control_queue::Queue;
use control_store::Store;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

/// The queue topic steps are scheduled onto once ready.
pub const STEP_READY_TOPIC: &str = "step.ready";

/// Default `BACKPRESSURE_THRESHOLD`: waiting-count on
/// `step.ready` above which newly-ready enqueues are deferred.
pub const DEFAULT_BACKPRESSURE_THRESHOLD: usize = 100;

/// Default `BACKPRESSURE_AGE_MS`: how long a deferred enqueue is
/// delayed by.
pub const DEFAULT_BACKPRESSURE_AGE_MS: u64 = 5_000;

/// Drives Run/Step lifecycle: materialisation, ready-set computation,
/// terminal reconciliation and cancellation, plus the Gate
/// Engine's three decision entry points.
pub struct Coordinator {
    store: Arc<dyn Store>,
    queue: Arc<dyn Queue>,
    backpressure_threshold: usize,
    backpressure_age_ms: u64,
}

impl Coordinator {
    pub fn new(store: Arc<dyn Store>, queue: Arc<dyn Queue>) -> Self {
        Self {
            store,
            queue,
            backpressure_threshold: DEFAULT_BACKPRESSURE_THRESHOLD,
            backpressure_age_ms: DEFAULT_BACKPRESSURE_AGE_MS,
        }
    }

    /// Overrides the backpressure knobs (`BACKPRESSURE_THRESHOLD`,
    /// `BACKPRESSURE_AGE_MS`), advisory only — never a correctness property.
    pub fn with_backpressure(mut self, threshold: usize, age_ms: u64) -> Self {
        self.backpressure_threshold = threshold;
        self.backpressure_age_ms = age_ms;
        self
    }

    /// Validates and materialises a plan into a Run, then runs the first
    /// reconciliation pass to enqueue whatever is immediately ready.
    pub fn submit(&self, plan: Plan, project_id: &str) -> Result<Run, EngineError> {
        let run = self.store.create_run(plan, project_id)?;
        self.reconcile(&run.id)?;
        self.store.get_run(&run.id).map_err(EngineError::from)
    }

    /// Sets every non-terminal step `cancelled` and the run `cancelled`
    ///. In-flight deliveries for those steps are
    /// short-circuited by the Worker's own pre-execution status check.
    pub fn cancel(&self, run_id: &RunId) -> Result<Run, EngineError> {
        let run = self.store.get_run(run_id)?;
        if run.status.is_terminal() {
            return Ok(run);
        }
        for step in self.store.list_steps_by_run(run_id)? {
            if !step.status.is_terminal() {
                self.store.update_step(
                    &step.id,
                    StepPatch { status: Some(StepStatus::Cancelled), ..Default::default() },
                )?;
                self.store.record_event(
                    run_id,
                    EventKind::StepCancelled { step_name: step.name.clone() },
                    Some(step.id),
                )?;
            }
        }
        let run = self.store.update_run(run_id, RunPatch::status(RunStatus::Cancelled))?;
        self.store.record_event(run_id, EventKind::RunCancelled, None)?;
        Ok(run)
    }

    /// `approve`: caller asserts an admin capability — identity is not
    /// validated here, see DESIGN.md.
    pub fn approve_gate(
        &self,
        gate_id: &GateId,
        actor: &str,
        reason: Option<String>,
    ) -> Result<(), EngineError> {
        let gate = self.store.update_gate(
            gate_id,
            GatePatch {
                status: Some(GateStatus::Passed),
                approved_by: Some(actor.to_string()),
                reason: reason.clone(),
                ..Default::default()
            },
        )?;
        self.store.record_event(
            &gate.run_id,
            EventKind::GateApproved { gate_id: *gate_id, actor: actor.to_string(), reason },
            gate.step_id,
        )?;
        self.reconcile(&gate.run_id)
    }

    pub fn waive_gate(
        &self,
        gate_id: &GateId,
        actor: &str,
        reason: Option<String>,
    ) -> Result<(), EngineError> {
        let gate = self.store.update_gate(
            gate_id,
            GatePatch {
                status: Some(GateStatus::Waived),
                approved_by: Some(actor.to_string()),
                reason: reason.clone(),
                ..Default::default()
            },
        )?;
        self.store.record_event(
            &gate.run_id,
            EventKind::GateWaived { gate_id: *gate_id, actor: actor.to_string(), reason },
            gate.step_id,
        )?;
        self.reconcile(&gate.run_id)
    }

    /// May be invoked by an automated check with no actor.
    pub fn fail_gate(&self, gate_id: &GateId, reason: Option<String>) -> Result<(), EngineError> {
        let gate = self.store.update_gate(
            gate_id,
            GatePatch { status: Some(GateStatus::Failed), reason: reason.clone(), ..Default::default() },
        )?;
        self.store.record_event(
            &gate.run_id,
            EventKind::GateFailed { gate_id: *gate_id, reason },
            gate.step_id,
        )?;
        self.reconcile(&gate.run_id)
    }

    /// Re-runs ready-set computation and terminal reconciliation for a run
    ///. Called after every step-terminal or
    /// gate-resolution write; idempotent modulo re-enqueuing already-ready
    /// steps, which the Worker's Inbox guard absorbs rather
    /// than the Coordinator tracking "already enqueued" state itself.
    pub fn reconcile(&self, run_id: &RunId) -> Result<(), EngineError> {
        let run = self.store.get_run(run_id)?;
        if run.status.is_terminal() {
            return Ok(());
        }

        self.cascade_cancel_blocked_steps(run_id)?;

        let steps = self.store.list_steps_by_run(run_id)?;
        let events = self.store.list_events(run_id, None)?;
        let by_name: HashMap<&str, &Step> = steps.iter().map(|s| (s.name.as_str(), s)).collect();

        let mut ready_count = 0usize;
        let mut running_count = 0usize;
        for step in &steps {
            match step.status {
                StepStatus::Running => running_count += 1,
                StepStatus::Queued => {
                    if self.is_ready(step, &by_name, &events)? {
                        ready_count += 1;
                        self.enqueue_ready(run_id, step)?;
                    }
                }
                _ => {}
            }
        }

        self.reconcile_run_status(&run, &steps, ready_count, running_count)
    }

    fn is_ready(
        &self,
        step: &Step,
        by_name: &HashMap<&str, &Step>,
        events: &[Event],
    ) -> Result<bool, EngineError> {
        let deps_ok = step
            .depends_on
            .iter()
            .all(|dep| by_name.get(dep.as_str()).map(|d| d.status == StepStatus::Succeeded).unwrap_or(false));
        if !deps_ok {
            return Ok(false);
        }
        if step.gate_types.is_empty() {
            return Ok(true);
        }
        let gates = self.gates_for_step(step.id, events)?;
        Ok(gates.len() == step.gate_types.len() && gates.iter().all(|g| g.status.unblocks_step()))
    }

    fn gates_for_step(
        &self,
        step_id: StepId,
        events: &[Event],
    ) -> Result<Vec<control_core::Gate>, EngineError> {
        let mut gates = Vec::new();
        for event in events {
            if event.step_id == Some(step_id) {
                if let EventKind::GateCreated { gate_id, .. } = &event.kind {
                    gates.push(self.store.get_gate(gate_id)?);
                }
            }
        }
        Ok(gates)
    }

    /// A `Queued` step that can never become ready because a predecessor
    /// terminated without succeeding is dead weight — mark it cancelled so
    /// it stops being considered and the run can reach a terminal state.
    fn cascade_cancel_blocked_steps(&self, run_id: &RunId) -> Result<(), EngineError> {
        loop {
            let steps = self.store.list_steps_by_run(run_id)?;
            let by_name: HashMap<&str, &Step> =
                steps.iter().map(|s| (s.name.as_str(), s)).collect();
            let mut changed = false;
            for step in &steps {
                if step.status != StepStatus::Queued {
                    continue;
                }
                let blocked = step.depends_on.iter().any(|dep| {
                    by_name
                        .get(dep.as_str())
                        .map(|d| {
                            matches!(
                                d.status,
                                StepStatus::Failed | StepStatus::TimedOut | StepStatus::Cancelled
                            )
                        })
                        .unwrap_or(false)
                });
                if blocked {
                    self.store.update_step(
                        &step.id,
                        StepPatch { status: Some(StepStatus::Cancelled), ..Default::default() },
                    )?;
                    self.store.record_event(
                        run_id,
                        EventKind::StepCancelled { step_name: step.name.clone() },
                        Some(step.id),
                    )?;
                    changed = true;
                }
            }
            if !changed {
                return Ok(());
            }
        }
    }

    fn enqueue_ready(&self, run_id: &RunId, step: &Step) -> Result<(), EngineError> {
        let payload = json!({
            "runId": run_id.to_string(),
            "stepId": step.id.to_string(),
            "attempt": 1,
            "idempotencyKey": step.idempotency_key,
        });
        // Backpressure: defer rather than drop — a saturated
        // `step.ready` topic gets this enqueue pushed back by
        // `backpressure_age_ms` instead of piling on immediately.
        let delay_ms = match self.queue.counts(STEP_READY_TOPIC) {
            Ok(counts) if counts.waiting >= self.backpressure_threshold => Some(self.backpressure_age_ms),
            _ => None,
        };
        self.queue.enqueue(STEP_READY_TOPIC, payload, delay_ms)?;
        Ok(())
    }

    fn reconcile_run_status(
        &self,
        run: &Run,
        steps: &[Step],
        ready_count: usize,
        running_count: usize,
    ) -> Result<(), EngineError> {
        let all_terminal = steps.iter().all(|s| s.status.is_terminal());
        let any_failed = steps.iter().any(|s| matches!(s.status, StepStatus::Failed | StepStatus::TimedOut));

        let next_status = if all_terminal {
            if any_failed {
                RunStatus::Failed
            } else {
                RunStatus::Succeeded
            }
        } else if ready_count > 0 || running_count > 0 {
            RunStatus::Running
        } else {
            RunStatus::Blocked
        };

        if next_status == run.status {
            return Ok(());
        }

        // Status-only transition: the timeline only ever records
        // `run.created` and `run.cancelled` at the run level (§4.F), so
        // Scenario 1's happy-path sequence is exactly
        // `run.created, step.started, step.succeeded` with no
        // `run.running`/`run.succeeded` entries in between.
        self.store.update_run(&run.id, RunPatch::status(next_status))?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
