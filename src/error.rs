// SPDX-License-Identifier: MIT

//! Typed error handling for worker-state
//!
//! Write and load failures get their own types so callers can tell a
//! failed commit (prior record intact) from an unrecoverable load.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for worker-state
#[derive(Debug, Error)]
pub enum StateError {
    /// A commit did not complete
    #[error(transparent)]
    Write(#[from] StateWriteError),

    /// A load failed and no fallback was supplied
    #[error(transparent)]
    Load(#[from] StateLoadError),

    /// Configuration errors (missing env vars, invalid values)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A value produced by one component broke a rule another depends on
    #[error("Precondition violated: {0}")]
    PreconditionViolation(String),

    /// Tag outside the lifecycle vocabulary
    #[error("Unknown lifecycle state: '{0}'")]
    UnknownState(String),
}

/// Failure while committing a state value.
///
/// Whatever the variant, the previously committed record is untouched.
#[derive(Debug, Error)]
pub enum StateWriteError {
    /// The value could not be encoded
    #[error("Failed to serialize state for {}: {source}", path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Staging, flushing or replacing the record failed
    #[error("Failed to write state to {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure while loading a state value with no fallback available
#[derive(Debug, Error)]
pub enum StateLoadError {
    /// The record is missing or unreadable
    #[error("Failed to read state from {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The record exists but does not decode
    #[error("Failed to parse state from {}: {source}", path.display())]
    Deserialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StateWriteError {
    /// Location the failed commit targeted
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::Serialize { path, .. } | Self::Io { path, .. } => path,
        }
    }
}

impl StateLoadError {
    /// Location the failed load read from
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::Io { path, .. } | Self::Deserialize { path, .. } => path,
        }
    }

    /// True when nothing has been committed yet
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

impl StateError {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a precondition error
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::PreconditionViolation(message.into())
    }
}

/// Fail with `PreconditionViolation` unless `condition` holds.
pub fn precondition(condition: bool, message: impl Into<String>) -> Result<(), StateError> {
    if condition {
        Ok(())
    } else {
        Err(StateError::precondition(message))
    }
}
