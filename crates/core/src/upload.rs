//! Upload identifiers and the per-upload record.

use crate::metadata::UploadMetadata;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Unique identifier for an upload resource.
///
/// The canonical encoding is the UUIDv4's 32-hex-digit simple form (no
/// dashes); it names the upload in URLs and keys the metadata store.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UploadId(Uuid);

impl UploadId {
    /// Generate a new random upload id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse from a string. Accepts the simple form (and, as uuid's
    /// parser does, the hyphenated form).
    pub fn parse(s: &str) -> crate::Result<Self> {
        Uuid::try_parse(s)
            .map(Self)
            .map_err(|e| crate::Error::InvalidUploadId(format!("{s}: {e}")))
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UploadId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UploadId({})", self.0.as_simple())
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.as_simple())
    }
}

/// The canonical per-upload record persisted in the metadata store.
///
/// The record is the source of truth for `length`, `defer`, `complete`,
/// and `metadata`; the file on disk is the source of truth for the
/// current write offset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UploadRecord {
    /// Whether the declared length has been fully received.
    pub complete: bool,
    /// Final size in bytes. Zero while the length is deferred.
    pub length: u64,
    /// If true, the final length is unknown until a later append supplies it.
    pub defer: bool,
    /// Parsed `Upload-Metadata`; immutable after creation.
    pub metadata: UploadMetadata,
    /// Absolute target path on the local filesystem.
    pub file: PathBuf,
}

impl UploadRecord {
    /// Create a record for an upload with a declared length.
    pub fn sized(length: u64, metadata: UploadMetadata, file: impl Into<PathBuf>) -> Self {
        Self {
            complete: false,
            length,
            defer: false,
            metadata,
            file: file.into(),
        }
    }

    /// Create a record for an upload whose length will be supplied later.
    pub fn deferred(metadata: UploadMetadata, file: impl Into<PathBuf>) -> Self {
        Self {
            complete: false,
            length: 0,
            defer: true,
            metadata,
            file: file.into(),
        }
    }

    /// Fix the final length of a deferred upload. One-shot: clears `defer`.
    pub fn fix_length(&mut self, length: u64) {
        self.length = length;
        self.defer = false;
    }

    /// Mark the declared length as fully received.
    pub fn mark_complete(&mut self) {
        self.complete = true;
    }
}
