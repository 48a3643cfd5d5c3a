// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem-backed Store driver — durable across restarts. A
//! transactional database driver for production isn't shipped here; this
//! is the one conforming on-disk driver, named in DESIGN.md.
//!
//! Every mutation is applied to the in-memory `StoreState` under its mutex
//! and then serialized whole to a temp file and atomically renamed over
//! `state.json`, so a reader never observes a partially-written file. A
//! process-wide advisory lock (`fs2::FileExt::lock_exclusive`) on `.lock`
//! enforces the single-leader assumption across processes pointed at the
//! same directory.

use crate::error::StoreError;
use crate::snapshot::Snapshot;
use crate::state::StoreState;
use crate::Store;
use control_core::{
    Clock, Event, Gate, GateId, GatePatch, Plan, Run, RunId, RunPatch, Step, StepId, StepPatch,
    SystemClock,
};
use fs2::FileExt;
use parking_lot::Mutex;
use serde_json::Value;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct FsStore<C: Clock = SystemClock> {
    state: Mutex<StoreState>,
    clock: C,
    dir: PathBuf,
    #[allow(dead_code)] // held for its Drop impl, releasing the advisory lock
    lock_file: File,
}

impl FsStore<SystemClock> {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with_clock(dir, SystemClock)
    }
}

impl<C: Clock> FsStore<C> {
    pub fn open_with_clock(dir: impl AsRef<Path>, clock: C) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .map_err(|e| StoreError::Transient(format!("create store dir: {e}")))?;

        let lock_path = dir.join(".lock");
        let lock_file = File::create(&lock_path)
            .map_err(|e| StoreError::Transient(format!("open lock file: {e}")))?;
        lock_file
            .try_lock_exclusive()
            .map_err(|e| StoreError::Transient(format!("store already locked by another process: {e}")))?;

        let data_path = dir.join("state.json");
        let mut state = if data_path.exists() {
            let raw = fs::read_to_string(&data_path)
                .map_err(|e| StoreError::Transient(format!("read state.json: {e}")))?;
            if raw.trim().is_empty() {
                StoreState::new()
            } else {
                serde_json::from_str(&raw)
                    .map_err(|e| StoreError::Transient(format!("parse state.json: {e}")))?
            }
        } else {
            StoreState::new()
        };
        // step_name_index/gate_index are not serialized (serde_json
        // rejects tuple map keys); rebuild them from the loaded rows.
        state.rebuild_indexes();

        Ok(Self { state: Mutex::new(state), clock, dir, lock_file })
    }

    fn persist(&self, state: &StoreState) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(state)
            .map_err(|e| StoreError::Transient(format!("serialize state: {e}")))?;
        let tmp_path = self.dir.join(".state.json.tmp");
        let mut tmp = File::create(&tmp_path)
            .map_err(|e| StoreError::Transient(format!("write temp state: {e}")))?;
        tmp.write_all(&json)
            .map_err(|e| StoreError::Transient(format!("write temp state: {e}")))?;
        tmp.sync_all().map_err(|e| StoreError::Transient(format!("fsync temp state: {e}")))?;
        fs::rename(&tmp_path, self.dir.join("state.json"))
            .map_err(|e| StoreError::Transient(format!("rename state.json: {e}")))?;
        Ok(())
    }
}

macro_rules! mutate {
    ($self:expr, |$state:ident| $body:expr) => {{
        let mut guard = $self.state.lock();
        let result = {
            let $state = &mut *guard;
            $body
        };
        if result.is_ok() {
            $self.persist(&guard)?;
        }
        result
    }};
}

impl<C: Clock> Store for FsStore<C> {
    fn create_run(&self, plan: Plan, project_id: &str) -> Result<Run, StoreError> {
        let now = self.clock.epoch_ms();
        let mut guard = self.state.lock();
        let run = guard.create_run(plan, project_id, now);
        self.persist(&guard)?;
        Ok(run)
    }

    fn get_run(&self, run_id: &RunId) -> Result<Run, StoreError> {
        self.state.lock().get_run(run_id)
    }

    fn list_runs(&self, limit: usize) -> Result<Vec<Run>, StoreError> {
        Ok(self.state.lock().list_runs(limit))
    }

    fn update_run(&self, run_id: &RunId, patch: RunPatch) -> Result<Run, StoreError> {
        let now = self.clock.epoch_ms();
        mutate!(self, |state| state.update_run(run_id, patch, now))
    }

    fn create_step(
        &self,
        run_id: &RunId,
        name: &str,
        tool: &str,
        inputs: Value,
        idempotency_key: Option<String>,
    ) -> Result<Step, StoreError> {
        mutate!(self, |state| state.create_step(run_id, name, tool, inputs, idempotency_key))
    }

    fn get_step(&self, step_id: &StepId) -> Result<Step, StoreError> {
        self.state.lock().get_step(step_id)
    }

    fn list_steps_by_run(&self, run_id: &RunId) -> Result<Vec<Step>, StoreError> {
        Ok(self.state.lock().list_steps_by_run(run_id))
    }

    fn update_step(&self, step_id: &StepId, patch: StepPatch) -> Result<Step, StoreError> {
        let now = self.clock.epoch_ms();
        mutate!(self, |state| state.update_step(step_id, patch, now))
    }

    fn record_event(
        &self,
        run_id: &RunId,
        kind: control_core::EventKind,
        step_id: Option<StepId>,
    ) -> Result<Event, StoreError> {
        let now = self.clock.epoch_ms();
        mutate!(self, |state| state.record_event(run_id, kind, step_id, now))
    }

    fn list_events(&self, run_id: &RunId, since_seq: Option<u64>) -> Result<Vec<Event>, StoreError> {
        Ok(self.state.lock().list_events(run_id, since_seq))
    }

    fn inbox_mark_if_new(&self, key: &str) -> Result<bool, StoreError> {
        let mut guard = self.state.lock();
        let is_new = guard.inbox_mark_if_new(key);
        if is_new {
            self.persist(&guard)?;
        }
        Ok(is_new)
    }

    fn create_or_get_gate(
        &self,
        run_id: &RunId,
        step_id: Option<StepId>,
        gate_type: &str,
    ) -> Result<Gate, StoreError> {
        let now = self.clock.epoch_ms();
        mutate!(self, |state| state.create_or_get_gate(run_id, step_id, gate_type, now))
    }

    fn get_gate(&self, gate_id: &GateId) -> Result<Gate, StoreError> {
        self.state.lock().get_gate(gate_id)
    }

    fn update_gate(&self, gate_id: &GateId, patch: GatePatch) -> Result<Gate, StoreError> {
        let now = self.clock.epoch_ms();
        mutate!(self, |state| state.update_gate(gate_id, patch, now))
    }

    fn snapshot_at(&self, run_id: &RunId, sequence: u64) -> Result<Snapshot, StoreError> {
        self.state.lock().snapshot_at(run_id, sequence)
    }

    fn rollback(&self, run_id: &RunId, sequence: u64) -> Result<Snapshot, StoreError> {
        let now = self.clock.epoch_ms();
        mutate!(self, |state| state.rollback(run_id, sequence, now))
    }

    fn prune_run(&self, run_id: &RunId) -> Result<(), StoreError> {
        mutate!(self, |state| state.prune_run(run_id))
    }
}

#[cfg(test)]
#[path = "fs_tests.rs"]
mod tests;
