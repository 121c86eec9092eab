//! Error types for traversal and assembly.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why an invocation was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelReason {
    /// The caller or user requested cancellation.
    Requested,
    /// The size-budget override prompt was declined.
    SizeOverrideDeclined,
    /// The file-count override prompt was declined.
    FileCountOverrideDeclined,
    /// The token-budget override prompt was declined.
    TokenOverrideDeclined,
}

/// Errors that can escape the traversal or assembly boundary.
///
/// Per-entry and per-file failures never surface here; they are folded into
/// warnings and the digest's error list. The only intentional non-I/O escape
/// is [`DigestError::Cancelled`], which callers must be able to distinguish
/// from ordinary failures.
#[derive(Debug, Error)]
pub enum DigestError {
    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Generic I/O error with path context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The invocation was cancelled.
    #[error("Cancelled: {reason:?}")]
    Cancelled { reason: CancelReason },

    /// Root path is not a directory.
    #[error("Root path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// A user-supplied glob pattern failed to compile.
    #[error("Invalid pattern `{pattern}`: {message}")]
    InvalidPattern { pattern: String, message: String },

    /// Output serialization failed.
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl DigestError {
    /// Create an I/O error with path context, classifying common kinds.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }

    /// Create a cancellation error.
    pub fn cancelled(reason: CancelReason) -> Self {
        Self::Cancelled { reason }
    }

    /// Check whether this error is a cancellation signal.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// One deduplicated per-file failure surfaced in the digest result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileError {
    /// Relative path of the failing file.
    pub path: String,
    /// Failure message.
    pub message: String,
    /// Optional detail (e.g. source chain).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl FileError {
    /// Create a new file error.
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            detail: None,
        }
    }

    /// Deduplication key.
    pub fn key(&self) -> (String, String) {
        (self.path.clone(), self.message.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_classification() {
        let err = DigestError::io(
            "/x",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, DigestError::PermissionDenied { .. }));

        let err = DigestError::io(
            "/x",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(err, DigestError::NotFound { .. }));
    }

    #[test]
    fn test_cancelled_is_distinguishable() {
        let err = DigestError::cancelled(CancelReason::Requested);
        assert!(err.is_cancelled());
        let err = DigestError::io("/x", std::io::Error::other("boom"));
        assert!(!err.is_cancelled());
    }
}
