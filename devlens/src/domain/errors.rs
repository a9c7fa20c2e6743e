//! Structured error types for devlens
//!
//! Using thiserror for automatic Display implementation and error chaining.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("A trace session is already active on this thread")]
    AlreadyActive,

    #[error("Stack desync: no open frame for {function} in module {module}")]
    StackDesync { function: String, module: String },

    #[error("Failed to write profiling snapshot to {}: {source}", path.display())]
    PersistenceFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid profiling snapshot {}: {source}", path.display())]
    SnapshotFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unsupported snapshot version {found} (expected {expected})")]
    UnsupportedSnapshotVersion { found: u32, expected: u32 },

    #[error("{function} failed: {message}")]
    InstrumentedFailure { function: String, message: String },

    #[error("Hook callback failed: {0}")]
    CallbackFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_active_display() {
        let err = TraceError::AlreadyActive;
        assert_eq!(err.to_string(), "A trace session is already active on this thread");
    }

    #[test]
    fn test_persistence_failure_keeps_path_and_source() {
        let err = TraceError::PersistenceFailure {
            path: PathBuf::from("/nonexistent/profiling_results.prof"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such directory"),
        };
        assert!(err.to_string().contains("/nonexistent/profiling_results.prof"));
        assert!(err.to_string().contains("no such directory"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_stack_desync_display() {
        let err = TraceError::StackDesync { function: "g".to_string(), module: "app".to_string() };
        assert!(err.to_string().contains("g in module app"));
    }
}
