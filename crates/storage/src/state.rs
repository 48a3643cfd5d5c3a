// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The materialized state behind both store drivers.
//!
//! `StoreState` holds every row the Store contract promises to persist and
//! applies mutations synchronously under whatever lock its driver holds.
//! It performs no I/O itself — `MemoryStore` wraps it in a bare
//! `parking_lot::Mutex`; `FsStore` wraps it the same way but additionally
//! serializes the whole struct to disk after each mutation and reloads it
//! on open (see `FsStore::persist`).

use crate::error::StoreError;
use crate::snapshot::Snapshot;
use control_core::{
    Event, EventId, EventKind, Gate, GateId, GatePatch, GateStatus, Plan, Run, RunId, RunPatch,
    RunStatus, Step, StepId, StepPatch, StepStatus,
};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
pub struct StoreState {
    runs: HashMap<RunId, Run>,
    /// Insertion order, newest last; `list_runs` reverses it.
    run_order: Vec<RunId>,
    steps: HashMap<StepId, Step>,
    steps_by_run: HashMap<RunId, Vec<StepId>>,
    /// Derived from `steps`; `serde_json` rejects tuple map keys, so this
    /// is never serialized and is rebuilt by `rebuild_indexes` after load.
    #[serde(skip)]
    step_name_index: HashMap<(RunId, String), StepId>,
    events_by_run: HashMap<RunId, Vec<Event>>,
    gates: HashMap<GateId, Gate>,
    /// Derived from `gates`; see `step_name_index`.
    #[serde(skip)]
    gate_index: HashMap<(RunId, Option<StepId>, String), GateId>,
    inbox: HashSet<String>,
}

impl StoreState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the derived, non-serialized index maps from `steps` and
    /// `gates`. Must be called once after deserializing a `StoreState` from
    /// disk, since `step_name_index`/`gate_index` are not persisted.
    pub fn rebuild_indexes(&mut self) {
        self.step_name_index.clear();
        for step in self.steps.values() {
            self.step_name_index.insert((step.run_id, step.name.clone()), step.id);
        }
        self.gate_index.clear();
        for gate in self.gates.values() {
            self.gate_index.insert((gate.run_id, gate.step_id, gate.gate_type.clone()), gate.id);
        }
    }

    fn next_sequence(&self, run_id: &RunId) -> u64 {
        self.events_by_run.get(run_id).map(|v| v.len() as u64).unwrap_or(0) + 1
    }

    /// Appends an event under the caller's lock; assigns the sequence
    /// internally so callers can never produce a gap or a duplicate.
    fn append_event(
        &mut self,
        run_id: RunId,
        kind: EventKind,
        step_id: Option<StepId>,
        now_ms: u64,
    ) -> Event {
        let sequence = self.next_sequence(&run_id);
        let event = Event {
            id: EventId::new(),
            run_id,
            sequence,
            step_id,
            kind,
            occurred_at_epoch_ms: now_ms,
        };
        self.events_by_run.entry(run_id).or_default().push(event.clone());
        event
    }

    pub fn create_run(&mut self, plan: Plan, project_id: &str, now_ms: u64) -> Run {
        let run_id = RunId::new();
        let step_count = plan.steps.len();
        let run = Run::new(run_id, project_id.to_string(), plan.clone(), now_ms);
        self.runs.insert(run_id, run.clone());
        self.run_order.push(run_id);

        let mut created_steps = Vec::with_capacity(step_count);
        for spec in &plan.steps {
            let step_id = StepId::new();
            let gate_types: Vec<String> =
                spec.gate.iter().map(|g| g.gate_type.clone()).collect();
            let step = Step::new(
                step_id,
                run_id,
                spec.name.clone(),
                spec.tool.clone(),
                spec.inputs.clone(),
                None,
                spec.depends_on.clone(),
                gate_types.clone(),
            );
            let mut step = step;
            step.tools_allowed = spec.tools_allowed.clone();
            step.env_allowed = spec.env_allowed.clone();
            step.secrets_scope = spec.secrets_scope.clone();
            self.steps.insert(step_id, step.clone());
            self.steps_by_run.entry(run_id).or_default().push(step_id);
            self.step_name_index.insert((run_id, spec.name.clone()), step_id);
            created_steps.push((step_id, gate_types));
        }

        self.append_event(
            run_id,
            EventKind::RunCreated { goal: plan.goal.clone(), step_count },
            None,
            now_ms,
        );

        for (step_id, gate_types) in created_steps {
            for gate_type in gate_types {
                let gate_id = GateId::new();
                let gate = Gate::new(gate_id, run_id, Some(step_id), gate_type.clone(), now_ms);
                self.gates.insert(gate_id, gate);
                self.gate_index.insert((run_id, Some(step_id), gate_type.clone()), gate_id);
                self.append_event(
                    run_id,
                    EventKind::GateCreated { gate_id, gate_type },
                    Some(step_id),
                    now_ms,
                );
            }
        }

        run
    }

    pub fn get_run(&self, run_id: &RunId) -> Result<Run, StoreError> {
        self.runs
            .get(run_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("run {run_id}")))
    }

    pub fn list_runs(&self, limit: usize) -> Vec<Run> {
        self.run_order
            .iter()
            .rev()
            .filter_map(|id| self.runs.get(id).cloned())
            .take(limit)
            .collect()
    }

    pub fn update_run(
        &mut self,
        run_id: &RunId,
        patch: RunPatch,
        now_ms: u64,
    ) -> Result<Run, StoreError> {
        let run = self
            .runs
            .get_mut(run_id)
            .ok_or_else(|| StoreError::NotFound(format!("run {run_id}")))?;
        if let Some(status) = patch.status {
            if run.status.is_terminal() && run.status != status {
                return Err(StoreError::InvalidTransition(format!(
                    "run {run_id} is terminal ({}), cannot move to {status}",
                    run.status
                )));
            }
            run.status = status;
        }
        if let Some(metadata) = patch.metadata {
            run.metadata.extend(metadata);
        }
        run.updated_at_epoch_ms = now_ms.max(run.updated_at_epoch_ms);
        Ok(run.clone())
    }

    pub fn create_step(
        &mut self,
        run_id: &RunId,
        name: &str,
        tool: &str,
        inputs: Value,
        idempotency_key: Option<String>,
    ) -> Result<Step, StoreError> {
        if !self.runs.contains_key(run_id) {
            return Err(StoreError::NotFound(format!("run {run_id}")));
        }
        if let Some(existing) = self.step_name_index.get(&(*run_id, name.to_string())) {
            return Ok(self.steps[existing].clone());
        }
        let step_id = StepId::new();
        let step = Step::new(
            step_id,
            *run_id,
            name.to_string(),
            tool.to_string(),
            inputs,
            idempotency_key,
            Vec::new(),
            Vec::new(),
        );
        self.steps.insert(step_id, step.clone());
        self.steps_by_run.entry(*run_id).or_default().push(step_id);
        self.step_name_index.insert((*run_id, name.to_string()), step_id);
        Ok(step)
    }

    pub fn get_step(&self, step_id: &StepId) -> Result<Step, StoreError> {
        self.steps
            .get(step_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("step {step_id}")))
    }

    pub fn list_steps_by_run(&self, run_id: &RunId) -> Vec<Step> {
        self.steps_by_run
            .get(run_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.steps.get(id).cloned())
            .collect()
    }

    pub fn update_step(
        &mut self,
        step_id: &StepId,
        patch: StepPatch,
        now_ms: u64,
    ) -> Result<Step, StoreError> {
        let step = self
            .steps
            .get_mut(step_id)
            .ok_or_else(|| StoreError::NotFound(format!("step {step_id}")))?;
        if let Some(status) = patch.status {
            if status != step.status && !step.status.can_transition_to(status) {
                return Err(StoreError::InvalidTransition(format!(
                    "step {step_id} cannot move {} -> {status}",
                    step.status
                )));
            }
            step.status = status;
            if status.is_terminal() {
                step.ended_at_epoch_ms = Some(patch.ended_at_epoch_ms.unwrap_or(now_ms));
            }
        }
        if let Some(outputs) = patch.outputs {
            step.outputs = Some(outputs);
        }
        if let Some(started) = patch.started_at_epoch_ms {
            step.started_at_epoch_ms = Some(started);
        }
        Ok(step.clone())
    }

    pub fn record_event(
        &mut self,
        run_id: &RunId,
        kind: EventKind,
        step_id: Option<StepId>,
        now_ms: u64,
    ) -> Result<Event, StoreError> {
        if !self.runs.contains_key(run_id) {
            return Err(StoreError::NotFound(format!("run {run_id}")));
        }
        Ok(self.append_event(*run_id, kind, step_id, now_ms))
    }

    pub fn list_events(&self, run_id: &RunId, since_seq: Option<u64>) -> Vec<Event> {
        self.events_by_run
            .get(run_id)
            .into_iter()
            .flatten()
            .filter(|e| since_seq.map(|s| e.sequence > s).unwrap_or(true))
            .cloned()
            .collect()
    }

    pub fn inbox_mark_if_new(&mut self, key: &str) -> bool {
        self.inbox.insert(key.to_string())
    }

    pub fn create_or_get_gate(
        &mut self,
        run_id: &RunId,
        step_id: Option<StepId>,
        gate_type: &str,
        now_ms: u64,
    ) -> Result<Gate, StoreError> {
        if !self.runs.contains_key(run_id) {
            return Err(StoreError::NotFound(format!("run {run_id}")));
        }
        let key = (*run_id, step_id, gate_type.to_string());
        if let Some(existing) = self.gate_index.get(&key) {
            return Ok(self.gates[existing].clone());
        }
        let gate_id = GateId::new();
        let gate = Gate::new(gate_id, *run_id, step_id, gate_type.to_string(), now_ms);
        self.gates.insert(gate_id, gate.clone());
        self.gate_index.insert(key, gate_id);
        self.append_event(
            *run_id,
            EventKind::GateCreated { gate_id, gate_type: gate_type.to_string() },
            step_id,
            now_ms,
        );
        Ok(gate)
    }

    pub fn get_gate(&self, gate_id: &GateId) -> Result<Gate, StoreError> {
        self.gates
            .get(gate_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("gate {gate_id}")))
    }

    pub fn update_gate(
        &mut self,
        gate_id: &GateId,
        patch: GatePatch,
        now_ms: u64,
    ) -> Result<Gate, StoreError> {
        let gate = self
            .gates
            .get_mut(gate_id)
            .ok_or_else(|| StoreError::NotFound(format!("gate {gate_id}")))?;
        if let Some(status) = patch.status {
            if gate.status.is_terminal() {
                return Err(StoreError::InvalidTransition(format!(
                    "gate {gate_id} is already {}",
                    gate.status
                )));
            }
            gate.status = status;
            if status != GateStatus::Pending {
                gate.resolved_at_epoch_ms = Some(now_ms);
            }
        }
        if let Some(approved_by) = patch.approved_by {
            gate.approved_by = Some(approved_by);
        }
        if let Some(reason) = patch.reason {
            gate.reason = Some(reason);
        }
        Ok(gate.clone())
    }

    pub fn snapshot_at(&self, run_id: &RunId, sequence: u64) -> Result<Snapshot, StoreError> {
        let run = self.get_run(run_id)?;
        let events = self
            .events_by_run
            .get(run_id)
            .into_iter()
            .flatten()
            .filter(|e| e.sequence <= sequence)
            .cloned()
            .collect();
        Ok(Snapshot { run, events })
    }

    /// Truncates the timeline to `seq` and records the rollback point in
    /// run metadata. Events past `seq` already formed
    /// a contiguous `1..=n` prefix, so dropping the tail leaves `1..=seq`
    /// contiguous with no renumbering needed; the next `record_event` picks
    /// up at `seq + 1` because `next_sequence` reads the truncated length.
    pub fn rollback(
        &mut self,
        run_id: &RunId,
        sequence: u64,
        now_ms: u64,
    ) -> Result<Snapshot, StoreError> {
        if !self.runs.contains_key(run_id) {
            return Err(StoreError::NotFound(format!("run {run_id}")));
        }
        if let Some(events) = self.events_by_run.get_mut(run_id) {
            events.retain(|e| e.sequence <= sequence);
        }
        let run = self
            .runs
            .get_mut(run_id)
            .ok_or_else(|| StoreError::NotFound(format!("run {run_id}")))?;
        run.metadata.insert("last_rollback_sequence".to_string(), sequence.to_string());
        run.updated_at_epoch_ms = now_ms.max(run.updated_at_epoch_ms);
        // Deliberately does not append a `run.rolled_back` event: doing so
        // would itself consume the next sequence number, so the first
        // post-rollback `record_event` call is assigned `sequence + 1`.
        // `EventKind::RunRolledBack` remains available for callers (e.g. the
        // CLI) that want to record the rollback explicitly via `record_event`.
        self.snapshot_at(run_id, u64::MAX)
    }

    pub fn prune_run(&mut self, run_id: &RunId) -> Result<(), StoreError> {
        if self.runs.remove(run_id).is_none() {
            return Err(StoreError::NotFound(format!("run {run_id}")));
        }
        self.run_order.retain(|id| id != run_id);
        if let Some(step_ids) = self.steps_by_run.remove(run_id) {
            for step_id in step_ids {
                self.steps.remove(&step_id);
            }
        }
        self.step_name_index.retain(|(rid, _), _| rid != run_id);
        self.events_by_run.remove(run_id);
        self.gate_index.retain(|(rid, _, _), _| rid != run_id);
        self.gates.retain(|_, g| g.run_id != *run_id);
        Ok(())
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
