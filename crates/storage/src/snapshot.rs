// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `snapshotAt` / `rollback` result type.

use control_core::{Event, Run};
use serde::{Deserialize, Serialize};

/// Run metadata plus every event with `sequence <= the requested bound`.
/// Pure: calling `snapshot_at` twice with the same arguments against an
/// unchanged store yields byte-identical (via `serde_json`) output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub run: Run,
    pub events: Vec<Event>,
}
