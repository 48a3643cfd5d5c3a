// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::coordinator::Coordinator;
use crate::tool::test_support::registry;
use crate::tool::{Tool, ToolContext, ToolError};
use async_trait::async_trait;
use control_core::test_support::{plan_with_steps, sample_plan};
use control_core::{EventKind, StepStatus};
use control_queue::MemoryQueue;
use control_store::MemoryStore;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

fn harness() -> (Arc<MemoryStore>, Arc<MemoryQueue>, Arc<Coordinator>) {
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(MemoryQueue::new());
    let coordinator = Arc::new(Coordinator::new(store.clone(), queue.clone()));
    (store, queue, coordinator)
}

async fn wait_until<F: Fn() -> bool>(pred: F, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    while !pred() {
        if tokio::time::Instant::now() >= deadline {
            panic!("condition was never satisfied within {timeout:?}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn happy_path_runs_echo_to_completion() {
    let (store, queue, coordinator) = harness();
    let worker = Arc::new(Worker::new(store.clone(), Arc::new(registry()), coordinator.clone()));
    let _sub = worker.subscribe(queue.as_ref(), 2).expect("subscribe");

    let run = coordinator.submit(sample_plan(), "proj").expect("submit");

    wait_until(
        || store.get_run(&run.id).map(|r| r.status.is_terminal()).unwrap_or(false),
        Duration::from_secs(2),
    )
    .await;

    let run = store.get_run(&run.id).expect("run");
    assert_eq!(run.status, control_core::RunStatus::Succeeded);

    let started = store
        .list_events(&run.id, None)
        .expect("events")
        .into_iter()
        .filter(|e| matches!(e.kind, EventKind::StepStarted { .. }))
        .count();
    assert_eq!(started, 1, "exactly one step.started event per step (at-most-once)");
}

#[tokio::test]
async fn duplicate_deliveries_of_the_same_step_yield_one_step_started() {
    let (store, queue, coordinator) = harness();
    let worker = Arc::new(Worker::new(store.clone(), Arc::new(registry()), coordinator.clone()));
    let _sub = worker.subscribe(queue.as_ref(), 4).expect("subscribe");

    let run = coordinator.submit(sample_plan(), "proj").expect("submit");
    let step = store.list_steps_by_run(&run.id).expect("steps").remove(0);

    // The coordinator already enqueued one `step.ready` delivery for this
    // step; fire 19 more concurrently to simulate duplicate redelivery.
    for _ in 0..19 {
        queue
            .enqueue(
                STEP_READY_TOPIC,
                json!({ "runId": run.id.to_string(), "stepId": step.id.to_string(), "attempt": 1 }),
                None,
            )
            .expect("enqueue duplicate");
    }

    wait_until(
        || store.get_run(&run.id).map(|r| r.status.is_terminal()).unwrap_or(false),
        Duration::from_secs(2),
    )
    .await;
    // Give any remaining duplicate deliveries a moment to drain through the
    // inbox guard (they ack immediately, but the consumer loop is async).
    tokio::time::sleep(Duration::from_millis(100)).await;

    let started = store
        .list_events(&run.id, None)
        .expect("events")
        .into_iter()
        .filter(|e| matches!(e.kind, EventKind::StepStarted { .. }))
        .count();
    assert_eq!(started, 1, "inbox dedup collapses all duplicate initial deliveries");
}

struct FlakyTool {
    remaining_failures: AtomicU32,
}

#[async_trait]
impl Tool for FlakyTool {
    async fn execute(&self, inputs: Value, _ctx: ToolContext) -> Result<Value, ToolError> {
        if self.remaining_failures.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
            if n == 0 {
                None
            } else {
                Some(n - 1)
            }
        }).is_ok()
        {
            return Err(ToolError::retryable("flaky: not yet"));
        }
        Ok(inputs)
    }
}

#[tokio::test]
async fn retries_then_succeeds_within_the_attempt_budget() {
    let (store, queue, coordinator) = harness();
    let tool: Arc<dyn Tool> = Arc::new(FlakyTool { remaining_failures: AtomicU32::new(2) });
    let registry = crate::tool::StaticToolRegistry::new().register("flaky:tool", tool);
    let worker = Arc::new(Worker::new(store.clone(), Arc::new(registry), coordinator.clone()));
    let _sub = worker.subscribe(queue.as_ref(), 1).expect("subscribe");

    let plan = plan_with_steps(&[("flaky", "flaky:tool", &[])]);
    let run = coordinator.submit(plan, "proj").expect("submit");

    wait_until(
        || store.get_run(&run.id).map(|r| r.status.is_terminal()).unwrap_or(false),
        Duration::from_secs(10),
    )
    .await;

    let run = store.get_run(&run.id).expect("run");
    assert_eq!(run.status, control_core::RunStatus::Succeeded);

    let failed = store
        .list_events(&run.id, None)
        .expect("events")
        .into_iter()
        .filter(|e| matches!(e.kind, EventKind::StepFailed { .. }))
        .count();
    assert_eq!(failed, 2, "two retryable step.failed events before the eventual success");
}

#[tokio::test]
async fn fatal_failure_terminalizes_the_step_and_reaches_the_dlq() {
    let (store, queue, coordinator) = harness();
    let worker = Arc::new(Worker::new(store.clone(), Arc::new(registry()), coordinator.clone()));
    let _sub = worker.subscribe(queue.as_ref(), 1).expect("subscribe");

    let plan = control_core::Plan::parse(
        r#"{"goal":"demo","steps":[{"name":"boom","tool":"test:fail","inputs":{"retryable":false}}]}"#,
    )
    .expect("valid plan");
    let run = coordinator.submit(plan, "proj").expect("submit");

    wait_until(
        || store.get_run(&run.id).map(|r| r.status.is_terminal()).unwrap_or(false),
        Duration::from_secs(2),
    )
    .await;

    let run = store.get_run(&run.id).expect("run");
    assert_eq!(run.status, control_core::RunStatus::Failed);

    let step = store.list_steps_by_run(&run.id).expect("steps").remove(0);
    assert_eq!(step.status, StepStatus::Failed);

    wait_until(|| queue.list_dlq(STEP_READY_TOPIC).map(|d| d.len()).unwrap_or(0) == 1, Duration::from_secs(2))
        .await;
    let dlq = queue.list_dlq(STEP_READY_TOPIC).expect("dlq");
    assert_eq!(dlq.len(), 1);
    assert_eq!(dlq[0]["stepId"], step.id.to_string());
}

#[tokio::test]
async fn unknown_tool_fails_the_step_without_retry() {
    let (store, queue, coordinator) = harness();
    let worker = Arc::new(Worker::new(
        store.clone(),
        Arc::new(crate::tool::StaticToolRegistry::new()),
        coordinator.clone(),
    ));
    let _sub = worker.subscribe(queue.as_ref(), 1).expect("subscribe");

    let plan = plan_with_steps(&[("ghost", "nonexistent:tool", &[])]);
    let run = coordinator.submit(plan, "proj").expect("submit");

    wait_until(
        || store.get_run(&run.id).map(|r| r.status.is_terminal()).unwrap_or(false),
        Duration::from_secs(2),
    )
    .await;

    let run = store.get_run(&run.id).expect("run");
    assert_eq!(run.status, control_core::RunStatus::Failed);

    let failed_events: Vec<_> = store
        .list_events(&run.id, None)
        .expect("events")
        .into_iter()
        .filter(|e| matches!(e.kind, EventKind::StepFailed { .. }))
        .collect();
    assert_eq!(failed_events.len(), 1, "unknown tool is classified fatal on its very first attempt");
}

#[yare::parameterized(
    fatal_first_attempt =        { false, 1, true },
    fatal_mid_budget =           { false, 2, true },
    retryable_under_budget =     { true,  1, false },
    retryable_still_under =      { true,  3, false },
    retryable_at_max_attempts =  { true,  4, true },
    retryable_past_max_attempts = { true, 5, true },
)]
fn exhausted_matches_retry_budget(retryable: bool, attempt: u32, expected: bool) {
    let (store, queue, coordinator) = harness();
    let worker = Worker::new(store, Arc::new(registry()), coordinator);
    let _ = queue;
    assert_eq!(worker.exhausted(retryable, attempt), expected);
}
