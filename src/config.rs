// SPDX-License-Identifier: MIT

//! Where the worker keeps its state, read from the environment

use std::path::PathBuf;

use crate::error::StateError;

pub const PATH_VAR: &str = "WORKER_STATE_PATH";
pub const PRETTY_VAR: &str = "WORKER_STATE_PRETTY";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateConfig {
    /// Location of the committed record
    pub path: PathBuf,
    /// Write indented JSON
    pub pretty: bool,
}

impl StateConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pretty: false,
        }
    }

    /// Build from `WORKER_STATE_PATH` and `WORKER_STATE_PRETTY`
    pub fn from_env() -> Result<Self, StateError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, StateError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = lookup(PATH_VAR)
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| StateError::config(format!("{} is not set", PATH_VAR)))?;

        let pretty = match lookup(PRETTY_VAR) {
            Some(value) => parse_flag(&value).ok_or_else(|| {
                StateError::config(format!("{} must be a boolean, got '{}'", PRETTY_VAR, value))
            })?,
            None => false,
        };

        Ok(Self {
            path: PathBuf::from(path),
            pretty,
        })
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
