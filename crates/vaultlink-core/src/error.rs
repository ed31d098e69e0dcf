//! Error types for the vaultlink engine.
//!
//! All errors in the system are represented by the [`Error`] enum.
//! This keeps error handling composable across crates.

use std::io;
use thiserror::Error as ThisError;

/// The core error type for all link-graph operations.
#[derive(ThisError, Debug)]
pub enum Error {
    /// File system error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Document not present in the corpus
    #[error("Document not found: {path}")]
    DocumentNotFound { path: String },

    /// Invalid document path (empty, absolute, wrong extension, ...)
    #[error("Invalid document path: {reason}")]
    InvalidPath { reason: String },

    /// Path escapes the vault root
    #[error("Path traversal detected: {path}")]
    PathTraversalAttempt { path: String },

    /// Rejected move request (missing source, occupied target, ...)
    #[error("Validation error: {reason}")]
    ValidationError { reason: String },

    /// A batch failed up-front validation; every violation is listed
    #[error("Batch validation failed: {}", errors.join("; "))]
    BatchValidation { errors: Vec<String> },

    /// Persisted index could not be read back
    #[error("Index corruption: {reason}")]
    IndexCorruption { reason: String },

    /// Checkpoint creation or rollback failed
    #[error("Checkpoint error: {reason}")]
    Checkpoint { reason: String },

    /// Invalid configuration
    #[error("Configuration error: {reason}")]
    ConfigError { reason: String },

    /// Serialization failure
    #[error("Serialization error: {reason}")]
    Serialization { reason: String },

    /// Operation stopped by a cancellation token
    #[error("Operation cancelled: {operation}")]
    Cancelled { operation: String },

    /// Generic unclassified error
    #[error("Error: {0}")]
    Other(String),
}

/// Convenient Result type alias
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an IO error
    pub fn io(err: io::Error) -> Self {
        Error::Io(err)
    }

    /// Create a document not found error
    pub fn document_not_found(path: impl Into<String>) -> Self {
        Error::DocumentNotFound { path: path.into() }
    }

    /// Create an invalid path error
    pub fn invalid_path(reason: impl Into<String>) -> Self {
        Error::InvalidPath {
            reason: reason.into(),
        }
    }

    /// Create a path traversal error
    pub fn path_traversal(path: impl Into<String>) -> Self {
        Error::PathTraversalAttempt { path: path.into() }
    }

    /// Create a validation error
    pub fn validation_error(reason: impl Into<String>) -> Self {
        Error::ValidationError {
            reason: reason.into(),
        }
    }

    /// Create an aggregated batch validation error
    pub fn batch_validation(errors: Vec<String>) -> Self {
        Error::BatchValidation { errors }
    }

    /// Create an index corruption error
    pub fn index_corruption(reason: impl Into<String>) -> Self {
        Error::IndexCorruption {
            reason: reason.into(),
        }
    }

    /// Create a checkpoint error
    pub fn checkpoint(reason: impl Into<String>) -> Self {
        Error::Checkpoint {
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config_error(reason: impl Into<String>) -> Self {
        Error::ConfigError {
            reason: reason.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(reason: impl Into<String>) -> Self {
        Error::Serialization {
            reason: reason.into(),
        }
    }

    /// Create a cancellation error
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Error::Cancelled {
            operation: operation.into(),
        }
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Whether this error rejected a request before anything was mutated
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::ValidationError { .. }
                | Error::BatchValidation { .. }
                | Error::InvalidPath { .. }
                | Error::PathTraversalAttempt { .. }
        )
    }

    /// Machine-readable error code for structured results
    pub fn code(&self) -> &'static str {
        match self {
            Error::Io(_) => "io_error",
            Error::DocumentNotFound { .. } => "document_not_found",
            Error::InvalidPath { .. } => "invalid_path",
            Error::PathTraversalAttempt { .. } => "path_traversal",
            Error::ValidationError { .. } => "validation_error",
            Error::BatchValidation { .. } => "batch_validation_error",
            Error::IndexCorruption { .. } => "index_corruption",
            Error::Checkpoint { .. } => "checkpoint_error",
            Error::ConfigError { .. } => "config_error",
            Error::Serialization { .. } => "serialization_error",
            Error::Cancelled { .. } => "cancelled",
            Error::Other(_) => "error",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::document_not_found("notes/a.md");
        assert!(err.to_string().contains("Document not found"));

        let err = Error::invalid_path("contains .. traversal");
        assert!(err.to_string().contains("Invalid document path"));
    }

    #[test]
    fn test_batch_validation_lists_every_error() {
        let err = Error::batch_validation(vec![
            "source missing: a.md".to_string(),
            "duplicate target: b.md".to_string(),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("source missing: a.md"));
        assert!(msg.contains("duplicate target: b.md"));
        assert!(err.is_validation());
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::cancelled("build").code(), "cancelled");
        assert_eq!(Error::io(io::Error::other("disk")).code(), "io_error");
        assert!(!Error::checkpoint("no space").is_validation());
    }
}
