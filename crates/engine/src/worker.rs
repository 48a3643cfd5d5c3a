// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker: the consumer side of the `step.ready` topic. One
//! `Worker` is handed to `control_queue::Queue::subscribe` as its
//! [`control_queue::Handler`]; `concurrency` deliveries may be in flight
//! across the process at once, each independently idempotent via the
//! Inbox.

use crate::coordinator::{Coordinator, STEP_READY_TOPIC};
use crate::heartbeat::Heartbeat;
use crate::tool::{ToolContext, ToolRegistry};
use async_trait::async_trait;
use control_core::{hash::inbox_key, EventKind, RunId, StepId, StepPatch, StepStatus};
use control_queue::{Handler, HandlerError, Queue, SubscriptionHandle};
use control_store::Store;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Wall-clock budget for one tool execution. Exceeding it
/// surfaces as `EventKind::StepTimedOut` and is always retried, since a
/// timeout carries no information about whether the tool's side effect
/// landed.
pub const STEP_TIMEOUT_MS: u64 = 30_000;

/// Executes `step.ready` deliveries against a [`ToolRegistry`], writing
/// the step-terminal event and status, then re-running [`Coordinator::
/// reconcile`] so downstream steps become ready in the same tick.
pub struct Worker {
    store: Arc<dyn Store>,
    registry: Arc<dyn ToolRegistry>,
    coordinator: Arc<Coordinator>,
    timeout: Duration,
    heartbeat: Heartbeat,
}

impl Worker {
    pub fn new(
        store: Arc<dyn Store>,
        registry: Arc<dyn ToolRegistry>,
        coordinator: Arc<Coordinator>,
    ) -> Self {
        Self {
            store,
            registry,
            coordinator,
            timeout: Duration::from_millis(STEP_TIMEOUT_MS),
            heartbeat: Heartbeat::new(),
        }
    }

    /// Overrides the per-execution timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// A cloneable liveness marker consulted only by external health
    /// checks — never by scheduling logic. Cloning shares the
    /// counter, so a daemon-owned ticker can advance it independently of
    /// delivery traffic.
    pub fn heartbeat(&self) -> Heartbeat {
        self.heartbeat.clone()
    }

    /// Subscribes this worker onto [`STEP_READY_TOPIC`] with the given
    /// consumer concurrency.
    pub fn subscribe(
        self: &Arc<Self>,
        queue: &dyn Queue,
        concurrency: usize,
    ) -> Result<SubscriptionHandle, control_queue::QueueError> {
        queue.subscribe(STEP_READY_TOPIC, concurrency, self.clone() as Arc<dyn Handler>)
    }
}

#[async_trait]
impl Handler for Worker {
    async fn handle(&self, payload: Value, attempt: u32) -> Result<(), HandlerError> {
        self.heartbeat.mark();
        let run_id: RunId = parse_field(&payload, "runId")?;
        let step_id: StepId = parse_field(&payload, "stepId")?;

        let step = match self.store.get_step(&step_id) {
            Ok(step) => step,
            Err(err) => return Err(HandlerError::fatal(err.to_string())),
        };

        // Terminal already — a duplicate final delivery of a message whose
        // earlier attempt already resolved the step. Nothing to do.
        if step.status.is_terminal() {
            return Ok(());
        }

        // Retry redeliveries (attempt > 1) carry the same Inbox key as
        // attempt 1 and would be rejected by it; only the first attempt of
        // a given step consults the Inbox, to collapse duplicate *initial*
        // deliveries without also swallowing legitimate retries.
        if attempt == 1 {
            let inbox_key = payload
                .get("idempotencyKey")
                .and_then(Value::as_str)
                .map(str::to_string)
                .or(step.idempotency_key.clone())
                .unwrap_or_else(|| inbox_key(&run_id.to_string(), &step.name, &step.inputs));
            let is_new = self
                .store
                .inbox_mark_if_new(&inbox_key)
                .map_err(|e| HandlerError::fatal(e.to_string()))?;
            if !is_new {
                return Ok(());
            }
        }

        let tool = match self.registry.resolve(&step.tool) {
            Some(tool) => tool,
            None => {
                if step.status == StepStatus::Queued {
                    self.store
                        .update_step(
                            &step_id,
                            StepPatch { status: Some(StepStatus::Running), ..Default::default() },
                        )
                        .map_err(|e| HandlerError::fatal(e.to_string()))?;
                }
                self.store
                    .record_event(
                        &run_id,
                        EventKind::StepFailed {
                            step_name: step.name.clone(),
                            error: format!("unknown tool: {}", step.tool),
                            retryable: false,
                            attempt,
                        },
                        Some(step_id),
                    )
                    .map_err(|e| HandlerError::fatal(e.to_string()))?;
                self.store
                    .update_step(
                        &step_id,
                        StepPatch { status: Some(StepStatus::Failed), ..Default::default() },
                    )
                    .map_err(|e| HandlerError::fatal(e.to_string()))?;
                self.coordinator
                    .reconcile(&run_id)
                    .map_err(|e| HandlerError::fatal(e.to_string()))?;
                return Ok(());
            }
        };

        if step.status == StepStatus::Queued {
            self.store
                .update_step(
                    &step_id,
                    StepPatch { status: Some(StepStatus::Running), ..Default::default() },
                )
                .map_err(|e| HandlerError::fatal(e.to_string()))?;
            self.store
                .record_event(&run_id, EventKind::StepStarted { step_name: step.name.clone() }, Some(step_id))
                .map_err(|e| HandlerError::fatal(e.to_string()))?;
        }

        let cancellation = CancellationToken::new();
        let ctx = ToolContext {
            run_id,
            step_id,
            deadline: tokio::time::Instant::now() + self.timeout,
            cancellation: cancellation.clone(),
            logger: tracing::info_span!("step", run_id = %run_id, step = %step.name),
        };

        let outcome = tokio::time::timeout(self.timeout, tool.execute(step.inputs.clone(), ctx)).await;

        match outcome {
            Ok(Ok(outputs)) => {
                self.store
                    .update_step(
                        &step_id,
                        StepPatch { status: Some(StepStatus::Succeeded), outputs: Some(outputs.clone()), ..Default::default() },
                    )
                    .map_err(|e| HandlerError::fatal(e.to_string()))?;
                self.store
                    .record_event(
                        &run_id,
                        EventKind::StepSucceeded { step_name: step.name.clone(), outputs },
                        Some(step_id),
                    )
                    .map_err(|e| HandlerError::fatal(e.to_string()))?;
            }
            Ok(Err(tool_err)) => {
                self.store
                    .record_event(
                        &run_id,
                        EventKind::StepFailed {
                            step_name: step.name.clone(),
                            error: tool_err.message.clone(),
                            retryable: tool_err.retryable,
                            attempt,
                        },
                        Some(step_id),
                    )
                    .map_err(|e| HandlerError::fatal(e.to_string()))?;
                if self.exhausted(tool_err.retryable, attempt) {
                    self.store
                        .update_step(
                            &step_id,
                            StepPatch { status: Some(StepStatus::Failed), ..Default::default() },
                        )
                        .map_err(|e| HandlerError::fatal(e.to_string()))?;
                    // The step is terminal; reconcile now so the run's own
                    // status reflects it, then still hand the Queue an Err
                    // so it dead-letters this payload.
                    self.coordinator.reconcile(&run_id).map_err(|e| HandlerError::fatal(e.to_string()))?;
                    return Err(HandlerError::fatal(tool_err.message));
                }
                // Step stays `running` pending redelivery; nothing in the
                // ready-set changed, so no reconcile is needed here.
                return Err(HandlerError::retryable(tool_err.message));
            }
            Err(_) => {
                cancellation.cancel();
                self.store
                    .record_event(
                        &run_id,
                        EventKind::StepTimedOut { step_name: step.name.clone(), attempt },
                        Some(step_id),
                    )
                    .map_err(|e| HandlerError::fatal(e.to_string()))?;
                // A timeout carries no information about whether the tool's
                // side effect landed, but is always at least retried up to
                // the same attempt budget as any other failure.
                if self.exhausted(true, attempt) {
                    self.store
                        .update_step(
                            &step_id,
                            StepPatch { status: Some(StepStatus::TimedOut), ..Default::default() },
                        )
                        .map_err(|e| HandlerError::fatal(e.to_string()))?;
                    self.coordinator.reconcile(&run_id).map_err(|e| HandlerError::fatal(e.to_string()))?;
                    return Err(HandlerError::fatal(format!("step {step_id} timed out")));
                }
                return Err(HandlerError::retryable(format!("step {step_id} timed out")));
            }
        }

        self.coordinator
            .reconcile(&run_id)
            .map_err(|e| HandlerError::fatal(e.to_string()))?;
        Ok(())
    }
}

impl Worker {
    /// Whether a failure at this attempt should terminalize the step rather
    /// than let the queue redeliver: non-retryable errors never retry;
    /// retryable errors retry up to `control_queue::MAX_ATTEMPTS`.
    fn exhausted(&self, retryable: bool, attempt: u32) -> bool {
        !retryable || attempt >= control_queue::MAX_ATTEMPTS
    }
}

fn parse_field<T: for<'a> From<&'a str>>(payload: &Value, field: &str) -> Result<T, HandlerError> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .map(T::from)
        .ok_or_else(|| HandlerError::fatal(format!("missing {field}")))
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
