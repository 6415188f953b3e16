// SPDX-License-Identifier: MIT

//! Durable worker state
//!
//! This module provides:
//! - `StateCommitter` / `JsonStateCommitter` - crash-consistent load and commit of a state value
//! - `Diagnostics` - where load/commit problems are reported
//! - `LifecycleState` - the bundle state vocabulary and its terminal subset

mod committer;
mod diagnostics;
pub mod lifecycle;

pub use committer::{JsonStateCommitter, RecordInfo, StateCommitter};
pub use diagnostics::{Diagnostics, Level, LogDiagnostics, MemoryDiagnostics};
pub use lifecycle::{BundleStates, LifecycleState};
