// SPDX-License-Identifier: MIT

//! Bundle lifecycle vocabulary
//!
//! Only the set of tags and the terminal classification live here.
//! Which transitions are legal is up to the process that owns the bundle.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{precondition, StateError};

/// States a bundle can be in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    Created,
    Staged,
    Running,
    /// Finished successfully
    Ready,
    /// Finished with an error
    Failed,
}

impl LifecycleState {
    pub const ALL: [LifecycleState; 5] = [
        LifecycleState::Created,
        LifecycleState::Staged,
        LifecycleState::Running,
        LifecycleState::Ready,
        LifecycleState::Failed,
    ];

    pub const TERMINAL: [LifecycleState; 2] = [LifecycleState::Ready, LifecycleState::Failed];

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Created => "created",
            LifecycleState::Staged => "staged",
            LifecycleState::Running => "running",
            LifecycleState::Ready => "ready",
            LifecycleState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Ready | LifecycleState::Failed)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for LifecycleState {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LifecycleState::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| StateError::UnknownState(s.to_string()))
    }
}

/// True iff `tag` names a lifecycle state (case-insensitive)
pub fn validate(tag: &str) -> bool {
    tag.parse::<LifecycleState>().is_ok()
}

/// True iff `tag` names a terminal state. Unknown tags are not terminal.
pub fn is_terminal(tag: &str) -> bool {
    tag.parse::<LifecycleState>()
        .map(|state| state.is_terminal())
        .unwrap_or(false)
}

/// Reject moving an entity out of a terminal state.
pub fn ensure_not_reopened(
    previous: Option<LifecycleState>,
    next: LifecycleState,
) -> Result<(), StateError> {
    match previous {
        Some(prev) => precondition(
            !prev.is_terminal() || next.is_terminal(),
            format!("cannot move from terminal state '{}' to '{}'", prev, next),
        ),
        None => Ok(()),
    }
}

/// A worker's view of its bundles, keyed by bundle id.
///
/// Serializes as a plain JSON object so it can be committed directly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct BundleStates {
    bundles: BTreeMap<String, LifecycleState>,
}

impl BundleStates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the state of a bundle, refusing to reopen a finished one
    pub fn record(
        &mut self,
        bundle: impl Into<String>,
        state: LifecycleState,
    ) -> Result<(), StateError> {
        let bundle = bundle.into();
        ensure_not_reopened(self.bundles.get(&bundle).copied(), state)?;
        self.bundles.insert(bundle, state);
        Ok(())
    }

    pub fn get(&self, bundle: &str) -> Option<LifecycleState> {
        self.bundles.get(bundle).copied()
    }

    /// Bundles not yet in a terminal state
    pub fn active(&self) -> impl Iterator<Item = (&str, LifecycleState)> {
        self.bundles
            .iter()
            .filter(|(_, state)| !state.is_terminal())
            .map(|(id, state)| (id.as_str(), *state))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, LifecycleState)> {
        self.bundles.iter().map(|(id, state)| (id.as_str(), *state))
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }
}
