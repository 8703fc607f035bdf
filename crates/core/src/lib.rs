//! Core domain types and shared logic for the hoist upload server.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Upload identifiers and their wire encoding
//! - The per-upload record and its lifecycle
//! - `Upload-Metadata` header parsing
//! - Record retention (TTL) policy
//! - Configuration types

pub mod config;
pub mod error;
pub mod metadata;
pub mod retention;
pub mod upload;

pub use config::AppConfig;
pub use error::{Error, Result};
pub use metadata::UploadMetadata;
pub use retention::RecordTtl;
pub use upload::{UploadId, UploadRecord};

/// Default ceiling on a single upload's declared length: 1 GiB.
pub const DEFAULT_MAX_SIZE: u64 = 1024 * 1024 * 1024;

/// Protocol version this server speaks.
pub const PROTOCOL_VERSION: &str = "1.0.0";
