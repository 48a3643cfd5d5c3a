// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! control-store: the durable Store contract behind two
//! drivers — [`MemoryStore`] for tests and local/dev use, [`FsStore`] for a
//! filesystem-backed deployment. Both share the same pure, in-memory
//! [`state::StoreState`] and differ only in whether mutations are also
//! persisted to disk as a whole-state snapshot, splitting materialized
//! state from its on-disk persistence.

mod error;
mod fs;
mod memory;
mod snapshot;
mod state;

pub use error::StoreError;
pub use fs::FsStore;
pub use memory::MemoryStore;
pub use snapshot::Snapshot;
pub use state::StoreState;

use control_core::{Event, Gate, GatePatch, Plan, Run, RunId, RunPatch, Step, StepId, StepPatch};
use serde_json::Value;

/// The Store contract: durable mapping of Runs, Steps, Events,
/// Gates and Inbox keys, with the transactional guarantees described there.
/// Every mutator is linearisable with respect to its own entity; compound
/// operations (`create_run`, `record_event`, `create_or_get_gate`) execute
/// under a single lock acquisition in both drivers.
pub trait Store: Send + Sync {
    fn create_run(&self, plan: Plan, project_id: &str) -> Result<Run, StoreError>;
    fn get_run(&self, run_id: &RunId) -> Result<Run, StoreError>;
    fn list_runs(&self, limit: usize) -> Result<Vec<Run>, StoreError>;
    fn update_run(&self, run_id: &RunId, patch: RunPatch) -> Result<Run, StoreError>;

    fn create_step(
        &self,
        run_id: &RunId,
        name: &str,
        tool: &str,
        inputs: Value,
        idempotency_key: Option<String>,
    ) -> Result<Step, StoreError>;
    fn get_step(&self, step_id: &StepId) -> Result<Step, StoreError>;
    fn list_steps_by_run(&self, run_id: &RunId) -> Result<Vec<Step>, StoreError>;
    fn update_step(&self, step_id: &StepId, patch: StepPatch) -> Result<Step, StoreError>;

    fn record_event(
        &self,
        run_id: &RunId,
        kind: control_core::EventKind,
        step_id: Option<StepId>,
    ) -> Result<Event, StoreError>;
    fn list_events(&self, run_id: &RunId, since_seq: Option<u64>) -> Result<Vec<Event>, StoreError>;

    fn inbox_mark_if_new(&self, key: &str) -> Result<bool, StoreError>;

    fn create_or_get_gate(
        &self,
        run_id: &RunId,
        step_id: Option<StepId>,
        gate_type: &str,
    ) -> Result<Gate, StoreError>;
    fn get_gate(&self, gate_id: &control_core::GateId) -> Result<Gate, StoreError>;
    fn update_gate(&self, gate_id: &control_core::GateId, patch: GatePatch) -> Result<Gate, StoreError>;

    fn snapshot_at(&self, run_id: &RunId, sequence: u64) -> Result<Snapshot, StoreError>;
    fn rollback(&self, run_id: &RunId, sequence: u64) -> Result<Snapshot, StoreError>;

    /// Administrative prune: a Run is destroyed only by an explicit call
    /// here, never by the Coordinator or Worker.
    fn prune_run(&self, run_id: &RunId) -> Result<(), StoreError>;
}
