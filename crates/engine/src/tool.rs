// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tool Registry: the pluggable execution surface a step's
//! `tool` name resolves against. An `async_trait` adapter keyed by name
//! rather than one adapter type per concern, with `test-support`-gated
//! fakes for the integration suite.

use async_trait::async_trait;
use control_core::{RunId, StepId};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Per-execution context handed to a [`Tool`]. `deadline` is advisory —
/// the Worker itself enforces `STEP_TIMEOUT_MS` via `tokio::time::timeout`
/// around the whole `execute` call, so a tool does not need to race its own
/// clock, only watch `cancellation` if it wants to exit early.
#[derive(Clone)]
pub struct ToolContext {
    pub run_id: RunId,
    pub step_id: StepId,
    pub deadline: tokio::time::Instant,
    pub cancellation: CancellationToken,
    pub logger: tracing::Span,
}

/// A tool's verdict on one execution — the same retryable/fatal
/// classification reused at the tool boundary, same shape as
/// `control_queue::HandlerError`.
#[derive(Debug, Clone)]
pub struct ToolError {
    pub message: String,
    pub retryable: bool,
}

impl ToolError {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self { message: message.into(), retryable: true }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self { message: message.into(), retryable: false }
    }
}

impl std::fmt::Display for ToolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ToolError {}

/// One unit of executable work, resolved by name from a [`ToolRegistry`].
#[async_trait]
pub trait Tool: Send + Sync {
    async fn execute(&self, inputs: Value, ctx: ToolContext) -> Result<Value, ToolError>;
}

/// Resolves a step's `tool` name to an executor. Unknown names are the
/// Worker's responsibility to classify fatal — `resolve`
/// itself just returns `None`.
pub trait ToolRegistry: Send + Sync {
    fn resolve(&self, name: &str) -> Option<Arc<dyn Tool>>;
}

/// A fixed, in-process tool set. Sufficient for embedding `control-engine`
/// in a single binary; a registry backed by dynamic loading or an RPC
/// bridge to out-of-process tools is not shipped (see DESIGN.md).
#[derive(Default, Clone)]
pub struct StaticToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl StaticToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, name: impl Into<String>, tool: Arc<dyn Tool>) -> Self {
        self.tools.insert(name.into(), tool);
        self
    }
}

impl ToolRegistry for StaticToolRegistry {
    fn resolve(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    //! Reference tools for the integration suite.

    use super::*;

    /// Echoes `inputs` back as `outputs`.
    pub struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        async fn execute(&self, inputs: Value, _ctx: ToolContext) -> Result<Value, ToolError> {
            Ok(inputs)
        }
    }

    /// Sleeps for `inputs.millis` (default 0) then succeeds; used to exercise
    /// `STEP_TIMEOUT_MS` and cancellation.
    pub struct SleepTool;

    #[async_trait]
    impl Tool for SleepTool {
        async fn execute(&self, inputs: Value, ctx: ToolContext) -> Result<Value, ToolError> {
            let millis = inputs.get("millis").and_then(Value::as_u64).unwrap_or(0);
            tokio::select! {
                _ = tokio::time::sleep(std::time::Duration::from_millis(millis)) => Ok(inputs),
                _ = ctx.cancellation.cancelled() => Err(ToolError::fatal("cancelled")),
            }
        }
    }

    /// Always fails; `inputs.retryable` (default `true`) picks the
    /// classification, so tests can exercise both the retry path and the
    /// immediate-DLQ path.
    pub struct FailTool;

    #[async_trait]
    impl Tool for FailTool {
        async fn execute(&self, inputs: Value, _ctx: ToolContext) -> Result<Value, ToolError> {
            let retryable = inputs.get("retryable").and_then(Value::as_bool).unwrap_or(true);
            if retryable {
                Err(ToolError::retryable("test:fail retryable failure"))
            } else {
                Err(ToolError::fatal("test:fail fatal failure"))
            }
        }
    }

    pub fn registry() -> StaticToolRegistry {
        StaticToolRegistry::new()
            .register("test:echo", Arc::new(EchoTool))
            .register("test:sleep", Arc::new(SleepTool))
            .register("test:fail", Arc::new(FailTool))
    }
}
