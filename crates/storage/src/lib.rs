//! Filesystem operations for the hoist upload server.
//!
//! This crate provides:
//! - Target file handles with offset-addressed, append-oriented writes
//! - Streaming copy from a request body with an optional write limit
//! - Spool (intermediate chunk) files for two-phase staging

pub mod error;
pub mod file;
pub mod spool;

pub use error::{StorageError, StorageResult};
pub use file::{ByteStream, TargetFile, TargetWriter};
pub use spool::SpoolFile;
