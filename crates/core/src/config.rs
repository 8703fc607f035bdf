//! Configuration types shared across crates.

use crate::retention::RecordTtl;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub upload: UploadConfig,
    #[serde(default)]
    pub download: DownloadConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
}

impl AppConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if self.upload.directory.as_os_str().is_empty() {
            return Err(crate::Error::InvalidConfig(
                "upload.directory must not be empty".into(),
            ));
        }

        let base = &self.upload.base_path;
        if !base.starts_with('/') || base.len() < 2 || base.ends_with('/') {
            return Err(crate::Error::InvalidConfig(format!(
                "upload.base_path must be a non-root absolute path without a trailing slash, got {base:?}"
            )));
        }

        if self.upload.max_size == 0 {
            return Err(crate::Error::InvalidConfig(
                "upload.max_size must be positive".into(),
            ));
        }

        Ok(())
    }

    /// Create a test configuration rooted at the given upload directory.
    ///
    /// **For testing only.** Uses the in-memory metadata store and enables
    /// downloads so handlers can be exercised end to end.
    pub fn for_testing(directory: impl Into<PathBuf>) -> Self {
        Self {
            server: ServerConfig::default(),
            upload: UploadConfig {
                directory: directory.into(),
                base_path: default_base_path(),
                max_size: crate::DEFAULT_MAX_SIZE,
                use_intermediate_chunk: false,
                chunk_directory: None,
                completion_retention: RecordTtl::default(),
            },
            download: DownloadConfig::default(),
            metadata: MetadataConfig::default(),
        }
    }
}

/// HTTP server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Enable the /metrics endpoint for Prometheus scraping.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

/// Upload handling configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Directory where target files are created by the default path factory.
    pub directory: PathBuf,
    /// URL path under which upload resources live.
    #[serde(default = "default_base_path")]
    pub base_path: String,
    /// Ceiling on a single upload's declared or deferred length, in bytes.
    #[serde(default = "default_max_size")]
    pub max_size: u64,
    /// Stage request bodies in a spool file before appending to the target.
    #[serde(default)]
    pub use_intermediate_chunk: bool,
    /// Directory for spool files. Defaults to the OS temp directory.
    #[serde(default)]
    pub chunk_directory: Option<PathBuf>,
    /// TTL applied to the record when an upload completes, bounding how
    /// long a completed upload remains downloadable.
    #[serde(default)]
    pub completion_retention: RecordTtl,
}

impl UploadConfig {
    /// The directory spool files are created in.
    pub fn chunk_dir(&self) -> PathBuf {
        self.chunk_directory
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

/// Download (GET) facility configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Serve completed uploads over GET.
    #[serde(default)]
    pub enabled: bool,
    /// When enabled, also serve uploads that have not completed.
    #[serde(default)]
    pub allow_partial: bool,
}

/// Metadata store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite-backed store.
    Sqlite {
        path: PathBuf,
        /// Store-level default TTL, applied when a write does not name one.
        #[serde(default)]
        default_ttl_secs: Option<u64>,
    },
    /// In-memory store. Records do not survive a restart.
    Memory {
        #[serde(default)]
        default_ttl_secs: Option<u64>,
    },
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Memory {
            default_ttl_secs: None,
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_base_path() -> String {
    "/files".to_string()
}

fn default_max_size() -> u64 {
    crate::DEFAULT_MAX_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_testing_validates() {
        let config = AppConfig::for_testing("/tmp/uploads");
        config.validate().unwrap();
        assert_eq!(config.upload.base_path, "/files");
        assert_eq!(config.upload.max_size, crate::DEFAULT_MAX_SIZE);
        assert!(!config.download.enabled);
        assert!(!config.upload.use_intermediate_chunk);
    }

    #[test]
    fn validate_rejects_bad_base_path() {
        for bad in ["", "/", "files", "/files/"] {
            let mut config = AppConfig::for_testing("/tmp/uploads");
            config.upload.base_path = bad.to_string();
            assert!(config.validate().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn validate_rejects_zero_max_size() {
        let mut config = AppConfig::for_testing("/tmp/uploads");
        config.upload.max_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn chunk_dir_falls_back_to_os_temp() {
        let config = AppConfig::for_testing("/tmp/uploads");
        assert_eq!(config.upload.chunk_dir(), std::env::temp_dir());

        let mut config = config;
        config.upload.chunk_directory = Some(PathBuf::from("/var/spool/hoist"));
        assert_eq!(config.upload.chunk_dir(), PathBuf::from("/var/spool/hoist"));
    }

    #[test]
    fn metadata_config_deserializes_tagged() {
        let parsed: MetadataConfig =
            serde_json::from_str(r#"{"type":"sqlite","path":"/var/lib/hoist/meta.db"}"#).unwrap();
        match parsed {
            MetadataConfig::Sqlite {
                path,
                default_ttl_secs,
            } => {
                assert_eq!(path, PathBuf::from("/var/lib/hoist/meta.db"));
                assert_eq!(default_ttl_secs, None);
            }
            other => panic!("unexpected config: {other:?}"),
        }
    }
}
