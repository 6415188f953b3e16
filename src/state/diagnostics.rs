// SPDX-License-Identifier: MIT

//! Diagnostics sinks handed to a committer at construction

use std::sync::Mutex;

const LOG_TARGET: &str = "worker_state::state";

/// Receives warnings and errors raised while loading or committing state.
pub trait Diagnostics: Send + Sync {
    /// A recoverable problem, e.g. falling back to a default value
    fn warn(&self, message: &str);

    /// A failure that is about to be surfaced to the caller
    fn error(&self, message: &str);
}

/// Forwards to the `log` facade
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn warn(&self, message: &str) {
        log::warn!(target: LOG_TARGET, "{}", message);
    }

    fn error(&self, message: &str) {
        log::error!(target: LOG_TARGET, "{}", message);
    }
}

/// Severity of a recorded message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Warn,
    Error,
}

/// Keeps every message in memory, for tests and embedders that ship
/// diagnostics somewhere other than the process log.
#[derive(Debug, Default)]
pub struct MemoryDiagnostics {
    entries: Mutex<Vec<(Level, String)>>,
}

impl MemoryDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far
    pub fn entries(&self) -> Vec<(Level, String)> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Messages recorded at `level`
    pub fn messages(&self, level: Level) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    fn push(&self, level: Level, message: &str) {
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.push((level, message.to_string()));
    }
}

impl Diagnostics for MemoryDiagnostics {
    fn warn(&self, message: &str) {
        self.push(Level::Warn, message);
    }

    fn error(&self, message: &str) {
        self.push(Level::Error, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_diagnostics_records_in_order() {
        let diag = MemoryDiagnostics::new();
        assert!(diag.is_empty());

        diag.warn("first");
        diag.error("second");
        diag.warn("third");

        assert_eq!(
            diag.entries(),
            vec![
                (Level::Warn, "first".to_string()),
                (Level::Error, "second".to_string()),
                (Level::Warn, "third".to_string()),
            ]
        );
        assert_eq!(diag.messages(Level::Warn), vec!["first", "third"]);
        assert_eq!(diag.messages(Level::Error), vec!["second"]);
    }

    #[test]
    fn test_log_diagnostics_does_not_panic_without_logger() {
        let diag = LogDiagnostics;
        diag.warn("no logger installed");
        diag.error("still fine");
    }
}
