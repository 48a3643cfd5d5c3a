// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process Store driver — no persistence, for tests and embedded use
//!.

use crate::error::StoreError;
use crate::snapshot::Snapshot;
use crate::state::StoreState;
use crate::Store;
use control_core::{
    Clock, Event, Gate, GateId, GatePatch, Plan, Run, RunId, RunPatch, Step, StepId, StepPatch,
    SystemClock,
};
use parking_lot::Mutex;
use serde_json::Value;

/// A `Store` backed entirely by an in-memory `StoreState` guarded by a
/// single mutex. Restarting the process loses all state; this driver
/// exists for tests and single-process demos, not production durability.
pub struct MemoryStore<C: Clock = SystemClock> {
    state: Mutex<StoreState>,
    clock: C,
}

impl MemoryStore<SystemClock> {
    pub fn new() -> Self {
        Self { state: Mutex::new(StoreState::new()), clock: SystemClock }
    }
}

impl Default for MemoryStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> MemoryStore<C> {
    pub fn with_clock(clock: C) -> Self {
        Self { state: Mutex::new(StoreState::new()), clock }
    }
}

impl<C: Clock> Store for MemoryStore<C> {
    fn create_run(&self, plan: Plan, project_id: &str) -> Result<Run, StoreError> {
        let now = self.clock.epoch_ms();
        Ok(self.state.lock().create_run(plan, project_id, now))
    }

    fn get_run(&self, run_id: &RunId) -> Result<Run, StoreError> {
        self.state.lock().get_run(run_id)
    }

    fn list_runs(&self, limit: usize) -> Result<Vec<Run>, StoreError> {
        Ok(self.state.lock().list_runs(limit))
    }

    fn update_run(&self, run_id: &RunId, patch: RunPatch) -> Result<Run, StoreError> {
        let now = self.clock.epoch_ms();
        self.state.lock().update_run(run_id, patch, now)
    }

    fn create_step(
        &self,
        run_id: &RunId,
        name: &str,
        tool: &str,
        inputs: Value,
        idempotency_key: Option<String>,
    ) -> Result<Step, StoreError> {
        self.state.lock().create_step(run_id, name, tool, inputs, idempotency_key)
    }

    fn get_step(&self, step_id: &StepId) -> Result<Step, StoreError> {
        self.state.lock().get_step(step_id)
    }

    fn list_steps_by_run(&self, run_id: &RunId) -> Result<Vec<Step>, StoreError> {
        Ok(self.state.lock().list_steps_by_run(run_id))
    }

    fn update_step(&self, step_id: &StepId, patch: StepPatch) -> Result<Step, StoreError> {
        let now = self.clock.epoch_ms();
        self.state.lock().update_step(step_id, patch, now)
    }

    fn record_event(
        &self,
        run_id: &RunId,
        kind: control_core::EventKind,
        step_id: Option<StepId>,
    ) -> Result<Event, StoreError> {
        let now = self.clock.epoch_ms();
        self.state.lock().record_event(run_id, kind, step_id, now)
    }

    fn list_events(&self, run_id: &RunId, since_seq: Option<u64>) -> Result<Vec<Event>, StoreError> {
        Ok(self.state.lock().list_events(run_id, since_seq))
    }

    fn inbox_mark_if_new(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.state.lock().inbox_mark_if_new(key))
    }

    fn create_or_get_gate(
        &self,
        run_id: &RunId,
        step_id: Option<StepId>,
        gate_type: &str,
    ) -> Result<Gate, StoreError> {
        let now = self.clock.epoch_ms();
        self.state.lock().create_or_get_gate(run_id, step_id, gate_type, now)
    }

    fn get_gate(&self, gate_id: &GateId) -> Result<Gate, StoreError> {
        self.state.lock().get_gate(gate_id)
    }

    fn update_gate(&self, gate_id: &GateId, patch: GatePatch) -> Result<Gate, StoreError> {
        let now = self.clock.epoch_ms();
        self.state.lock().update_gate(gate_id, patch, now)
    }

    fn snapshot_at(&self, run_id: &RunId, sequence: u64) -> Result<Snapshot, StoreError> {
        self.state.lock().snapshot_at(run_id, sequence)
    }

    fn rollback(&self, run_id: &RunId, sequence: u64) -> Result<Snapshot, StoreError> {
        let now = self.clock.epoch_ms();
        self.state.lock().rollback(run_id, sequence, now)
    }

    fn prune_run(&self, run_id: &RunId) -> Result<(), StoreError> {
        self.state.lock().prune_run(run_id)
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
