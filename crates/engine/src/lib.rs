// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! control-engine: the Run Coordinator, Gate Engine, Worker and Tool
//! Registry — everything that turns a submitted
//! Plan into scheduled Queue deliveries and executes those deliveries
//! against a [`tool::ToolRegistry`].

mod coordinator;
mod error;
mod heartbeat;
mod tool;
mod worker;

pub use coordinator::{Coordinator, STEP_READY_TOPIC};
pub use error::EngineError;
pub use heartbeat::Heartbeat;
pub use tool::{Tool, ToolContext, ToolError, ToolRegistry, StaticToolRegistry};
pub use worker::{Worker, STEP_TIMEOUT_MS};

/// Reference tools (`test:echo`, `test:sleep`, `test:fail`) for embedding
/// and the integration suite, re-exported here since `tool` is
/// a private module.
#[cfg(any(test, feature = "test-support"))]
pub use tool::test_support;
