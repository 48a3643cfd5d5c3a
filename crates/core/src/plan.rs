// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Plan wire format and its parse-time validation.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A declared gate on a step, as carried on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GateDecl {
    pub gate_type: String,
}

/// One step as declared in a submitted plan, before a [`crate::step::Step`]
/// is materialized for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepSpec {
    pub name: String,
    pub tool: String,
    #[serde(default = "default_inputs")]
    pub inputs: Value,
    #[serde(default)]
    pub tools_allowed: Option<Vec<String>>,
    #[serde(default)]
    pub env_allowed: Option<Vec<String>>,
    #[serde(default)]
    pub secrets_scope: Option<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub gate: Option<GateDecl>,
}

fn default_inputs() -> Value {
    Value::Object(serde_json::Map::new())
}

/// A user-supplied run plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Plan {
    pub goal: String,
    pub steps: Vec<StepSpec>,
}

impl Plan {
    /// Parses and validates a plan from its wire JSON. An empty step list
    /// and duplicate step names are both `InvalidPlan`.
    pub fn parse(json: &str) -> Result<Plan, CoreError> {
        let plan: Plan = serde_json::from_str(json)
            .map_err(|err| CoreError::InvalidPlan(err.to_string()))?;
        plan.validate()?;
        Ok(plan)
    }

    fn validate(&self) -> Result<(), CoreError> {
        if self.steps.is_empty() {
            return Err(CoreError::InvalidPlan("plan has no steps".into()));
        }

        let mut seen = std::collections::HashSet::with_capacity(self.steps.len());
        for step in &self.steps {
            if step.name.is_empty() {
                return Err(CoreError::InvalidPlan("step name must not be empty".into()));
            }
            if step.tool.is_empty() {
                return Err(CoreError::InvalidPlan(format!(
                    "step {} has no tool",
                    step.name
                )));
            }
            if !seen.insert(step.name.as_str()) {
                return Err(CoreError::InvalidPlan(format!(
                    "duplicate step name: {}",
                    step.name
                )));
            }
        }

        for step in &self.steps {
            for dep in &step.depends_on {
                if !seen.contains(dep.as_str()) {
                    return Err(CoreError::InvalidPlan(format!(
                        "step {} depends on unknown step {}",
                        step.name, dep
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;
