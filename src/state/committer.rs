// SPDX-License-Identifier: MIT

//! Crash-consistent persistence of a process's working state
//!
//! A commit never edits the record in place. The encoded value is written
//! to a sibling staging file, fsynced, and renamed over the record, so a
//! reader (or a restart after a crash) sees either the old record or the
//! new one in full.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;

use super::diagnostics::{Diagnostics, LogDiagnostics};
use crate::config::StateConfig;
use crate::error::{StateLoadError, StateWriteError};

/// Load/commit pair over one fixed storage location.
///
/// The committer does no locking. One owner per location is expected to
/// serialize its own commits; two processes committing to the same
/// location race at the rename and the last one wins.
pub trait StateCommitter<T> {
    /// Load the last committed value.
    ///
    /// With `Some(fallback)` a missing or unreadable record yields the
    /// fallback and a warning. With `None` the failure is returned.
    fn load(&self, fallback: Option<T>) -> Result<T, StateLoadError>;

    /// Durably replace the committed value with `state`.
    ///
    /// On error the previous record is left as it was.
    fn commit(&self, state: &T) -> Result<(), StateWriteError>;

    /// Load, falling back to `fallback` on any failure
    fn load_or(&self, fallback: T) -> T
    where
        T: Clone,
    {
        self.load(Some(fallback.clone())).unwrap_or(fallback)
    }
}

/// Size and mtime of the committed record, for diagnostics only
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordInfo {
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

impl fmt::Display for RecordInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.modified {
            Some(modified) => write!(f, "{} bytes, modified {}", self.size, modified.to_rfc3339()),
            None => write!(f, "{} bytes", self.size),
        }
    }
}

/// Stores the state as JSON text in a single file.
pub struct JsonStateCommitter<T> {
    path: PathBuf,
    pretty: bool,
    diagnostics: Arc<dyn Diagnostics>,
    _state: PhantomData<fn() -> T>,
}

impl<T> JsonStateCommitter<T> {
    /// Committer for `path` that reports through the `log` facade
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_diagnostics(path, Arc::new(LogDiagnostics))
    }

    pub fn with_diagnostics(path: impl Into<PathBuf>, diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self {
            path: path.into(),
            pretty: false,
            diagnostics,
            _state: PhantomData,
        }
    }

    pub fn from_config(config: &StateConfig, diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self::with_diagnostics(config.path.clone(), diagnostics).pretty(config.pretty)
    }

    /// Indent the stored JSON
    pub fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state_file_exists(&self) -> bool {
        self.path.is_file()
    }

    /// Metadata of the committed record, `None` if there is none
    pub fn record_info(&self) -> Option<RecordInfo> {
        let meta = fs::metadata(&self.path).ok().filter(|m| m.is_file())?;
        Some(RecordInfo {
            size: meta.len(),
            modified: meta.modified().ok().map(DateTime::<Utc>::from),
        })
    }

    fn context(&self) -> String {
        match self.record_info() {
            Some(info) => format!(" (record: {})", info),
            None => " (record: absent)".to_string(),
        }
    }

    /// Directory holding both the record and its staging files
    fn staging_dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    fn write_error(&self, source: std::io::Error) -> StateWriteError {
        StateWriteError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Write `bytes` to a new staging file and flush it to disk.
    ///
    /// The staging file is deleted when the returned handle is dropped
    /// without being published.
    fn stage(&self, bytes: &[u8]) -> Result<NamedTempFile, StateWriteError> {
        let dir = self.staging_dir();
        fs::create_dir_all(dir).map_err(|e| self.write_error(e))?;

        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "state".to_string());

        let prefix = format!(".{}.", file_name);
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix).suffix(".tmp");
        // Subject to the umask, like a plain create
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(fs::Permissions::from_mode(0o644));
        }
        let mut staged = builder.tempfile_in(dir).map_err(|e| self.write_error(e))?;

        self.keep_record_permissions(&staged).map_err(|e| self.write_error(e))?;
        staged.write_all(bytes).map_err(|e| self.write_error(e))?;
        staged.as_file().sync_all().map_err(|e| self.write_error(e))?;
        Ok(staged)
    }

    /// Give the staged file the mode of the record it will replace.
    #[cfg(unix)]
    fn keep_record_permissions(&self, staged: &NamedTempFile) -> std::io::Result<()> {
        match fs::metadata(&self.path) {
            Ok(meta) if meta.is_file() => staged.as_file().set_permissions(meta.permissions()),
            _ => Ok(()),
        }
    }

    #[cfg(not(unix))]
    fn keep_record_permissions(&self, _staged: &NamedTempFile) -> std::io::Result<()> {
        Ok(())
    }

    /// Atomically rename a staged file over the record.
    fn publish(&self, staged: NamedTempFile) -> Result<(), StateWriteError> {
        staged
            .persist(&self.path)
            .map_err(|e| self.write_error(e.error))?;
        self.sync_dir();
        Ok(())
    }

    /// Make the rename itself durable. The new record is already in place
    /// at this point, so a failure here is only reported.
    #[cfg(unix)]
    fn sync_dir(&self) {
        let result = fs::File::open(self.staging_dir()).and_then(|dir| dir.sync_all());
        self.report_dir_sync(result);
    }

    #[cfg(unix)]
    fn report_dir_sync(&self, result: std::io::Result<()>) {
        if let Err(e) = result {
            self.diagnostics.warn(&format!(
                "Committed state to {} but failed to sync its directory: {}",
                self.path.display(),
                e
            ));
        }
    }

    #[cfg(not(unix))]
    fn sync_dir(&self) {}
}

impl<T: DeserializeOwned> JsonStateCommitter<T> {
    /// Single read of the record. The raw bytes are returned alongside the
    /// result so a failed parse can be reported with the content.
    fn read(&self) -> (Option<Vec<u8>>, Result<T, StateLoadError>) {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(source) => {
                return (
                    None,
                    Err(StateLoadError::Io {
                        path: self.path.clone(),
                        source,
                    }),
                )
            }
        };

        let result = serde_json::from_slice(&bytes).map_err(|source| StateLoadError::Deserialize {
            path: self.path.clone(),
            source,
        });
        (Some(bytes), result)
    }
}

impl<T: Serialize> JsonStateCommitter<T> {
    fn encode(&self, state: &T) -> Result<Vec<u8>, StateWriteError> {
        let encoded = if self.pretty {
            serde_json::to_vec_pretty(state)
        } else {
            serde_json::to_vec(state)
        };
        encoded.map_err(|source| StateWriteError::Serialize {
            path: self.path.clone(),
            source,
        })
    }
}

impl<T: Serialize + DeserializeOwned> StateCommitter<T> for JsonStateCommitter<T> {
    fn load(&self, fallback: Option<T>) -> Result<T, StateLoadError> {
        let (raw, result) = self.read();
        let err = match result {
            Ok(state) => return Ok(state),
            Err(err) => err,
        };

        match fallback {
            Some(default) => {
                let content = match &raw {
                    Some(bytes) => String::from_utf8_lossy(bytes).into_owned(),
                    None if err.is_missing() => "<no record>".to_string(),
                    None => "<unreadable>".to_string(),
                };
                self.diagnostics.warn(&format!(
                    "Failed to load state due to {}. Returning default. Content:\n{}",
                    err, content
                ));
                Ok(default)
            }
            None => {
                self.diagnostics
                    .error(&format!("Failed to load state: {}{}", err, self.context()));
                Err(err)
            }
        }
    }

    fn commit(&self, state: &T) -> Result<(), StateWriteError> {
        let result = self
            .encode(state)
            .and_then(|bytes| self.stage(&bytes))
            .and_then(|staged| self.publish(staged));

        match &result {
            Ok(()) => log::debug!("Committed state to {}", self.path.display()),
            Err(err) => self
                .diagnostics
                .error(&format!("Failed to commit state: {}{}", err, self.context())),
        }
        result
    }
}
