// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use control_core::test_support::sample_plan;
use control_core::{EventKind, FakeClock, RunStatus};

#[test]
fn create_run_is_visible_through_the_store_trait() {
    let store = MemoryStore::new();
    let run = store.create_run(sample_plan(), "proj").expect("create_run");
    let fetched = store.get_run(&run.id).expect("get_run");
    assert_eq!(fetched.id, run.id);
    assert_eq!(fetched.status, RunStatus::Queued);
}

#[test]
fn list_runs_respects_limit() {
    let store = MemoryStore::new();
    for _ in 0..3 {
        store.create_run(sample_plan(), "proj").expect("create_run");
    }
    assert_eq!(store.list_runs(2).expect("list_runs").len(), 2);
}

#[test]
fn unknown_run_id_is_not_found() {
    let store = MemoryStore::new();
    let bogus = control_core::RunId::new();
    assert!(matches!(store.get_run(&bogus), Err(StoreError::NotFound(_))));
}

#[test]
fn fake_clock_drives_event_timestamps() {
    let clock = FakeClock::new();
    let store = MemoryStore::with_clock(clock.clone());
    let run = store.create_run(sample_plan(), "proj").expect("create_run");

    clock.advance(std::time::Duration::from_millis(500));
    let event = store
        .record_event(&run.id, EventKind::RunRunning, None)
        .expect("record_event");
    assert_eq!(event.occurred_at_epoch_ms, 1_000_500);
}

#[test]
fn inbox_dedup_survives_across_store_calls() {
    let store = MemoryStore::new();
    assert!(store.inbox_mark_if_new("dup-key").expect("first"));
    assert!(!store.inbox_mark_if_new("dup-key").expect("second"));
}

#[test]
fn snapshot_and_rollback_round_trip_through_trait() {
    let store = MemoryStore::new();
    let run = store.create_run(sample_plan(), "proj").expect("create_run");
    for _ in 0..3 {
        store
            .record_event(&run.id, EventKind::RunRunning, None)
            .expect("record_event");
    }
    let snap = store.snapshot_at(&run.id, 2).expect("snapshot_at");
    assert_eq!(snap.events.len(), 2);

    let rolled = store.rollback(&run.id, 2).expect("rollback");
    assert_eq!(rolled.events.len(), 2);
    let next = store
        .record_event(&run.id, EventKind::RunRunning, None)
        .expect("record_event");
    assert_eq!(next.sequence, 3);
}

#[test]
fn prune_run_removes_it_from_the_store() {
    let store = MemoryStore::new();
    let run = store.create_run(sample_plan(), "proj").expect("create_run");
    store.prune_run(&run.id).expect("prune_run");
    assert!(matches!(store.get_run(&run.id), Err(StoreError::NotFound(_))));
}
