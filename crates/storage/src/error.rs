//! Storage error types.

use std::path::PathBuf;
use thiserror::Error;

/// Storage operation errors.
///
/// `LimitExceeded` is the conflict kind: the caller maps it to a protocol
/// conflict and destroys the upload. Everything else is a runtime failure
/// surfaced as a server error.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("parent directory missing: {0}")]
    ParentMissing(PathBuf),

    #[error("write limit of {limit} bytes exceeded")]
    LimitExceeded { limit: u64 },

    #[error("spool copy wrote {actual} bytes, expected {expected}")]
    SpoolMismatch { expected: u64, actual: u64 },

    #[error("body stream error: {0}")]
    Body(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
