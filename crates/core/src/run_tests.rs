// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::plan::Plan;

fn sample_plan() -> Plan {
    Plan::parse(
        r#"{"goal":"demo","steps":[{"name":"echo","tool":"test:echo","inputs":{}}]}"#,
    )
    .expect("valid plan")
}

#[test]
fn new_run_starts_queued() {
    let run = Run::new(RunId::new(), "proj".into(), sample_plan(), 1000);
    assert_eq!(run.status, RunStatus::Queued);
    assert_eq!(run.created_at_epoch_ms, run.updated_at_epoch_ms);
}

#[test]
fn terminal_statuses() {
    assert!(RunStatus::Succeeded.is_terminal());
    assert!(RunStatus::Failed.is_terminal());
    assert!(RunStatus::Cancelled.is_terminal());
    assert!(!RunStatus::Queued.is_terminal());
    assert!(!RunStatus::Running.is_terminal());
    assert!(!RunStatus::Blocked.is_terminal());
}

#[test]
fn run_id_round_trips_through_json() {
    let id = RunId::new();
    let run = Run::new(id, "proj".into(), sample_plan(), 1000);
    let json = serde_json::to_string(&run).expect("serialize");
    let back: Run = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back.id, id);
}
