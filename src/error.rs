//! Error types for journaled operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by operations, the log codec and the operator.
#[derive(Debug, Error)]
pub enum JournalError {
    /// A pre-flight check failed. Advisory only.
    #[error("precondition failed for {path}: {reason}")]
    Precondition { path: PathBuf, reason: String },

    /// A filesystem call failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A rename would have replaced an existing file.
    #[error("destination already exists: {path}")]
    DestinationExists { path: PathBuf },

    /// The progress log does not match the plan log (or the supplied plan).
    #[error("journal corrupted at {path}, line {line}: {reason}")]
    Corruption {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// A log line could not be decoded.
    #[error("cannot parse log line {line:?}: {reason}")]
    Parse { line: String, reason: String },

    /// A field value cannot be written to the log format.
    #[error("field {field:?} cannot be journaled: {reason}")]
    Unencodable { field: String, reason: String },

    /// No plan log exists for this identifier.
    #[error("no plan log at {path}")]
    MissingPlan { path: PathBuf },

    /// Another operator holds the lock for this identifier.
    #[error("journal is locked by {holder} ({path})")]
    Locked { path: PathBuf, holder: String },

    /// API misuse.
    #[error("invalid operator state: {0}")]
    State(String),
}

impl JournalError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn precondition(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Precondition {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn parse(line: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Parse {
            line: line.into(),
            reason: reason.into(),
        }
    }

    pub fn state(message: impl Into<String>) -> Self {
        Self::State(message.into())
    }
}

pub type Result<T, E = JournalError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_keeps_source() {
        let err = JournalError::io(
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(err, JournalError::Io { .. }));
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("/test/path"));
    }

    #[test]
    fn precondition_names_path() {
        let err = JournalError::precondition("a.cue", "does not exist");
        assert_eq!(err.to_string(), "precondition failed for a.cue: does not exist");
    }
}
