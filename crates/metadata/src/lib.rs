//! Metadata store for the hoist upload server.
//!
//! A TTL-capable key/value mapping from upload identifiers to their
//! records. Two backends:
//! - SQLite (sqlx) for deployments that need records to survive restarts
//! - in-memory for tests and single-process setups
//!
//! Expiry is lazy: a read that finds an expired row deletes it and
//! reports absence.

pub mod error;
pub mod memory;
pub mod store;

pub use error::{MetadataError, MetadataResult};
pub use memory::MemoryStore;
pub use store::{MetadataStore, SqliteStore};

use hoist_core::config::MetadataConfig;
use std::sync::Arc;
use std::time::Duration;

/// Create a metadata store from configuration.
pub async fn from_config(config: &MetadataConfig) -> MetadataResult<Arc<dyn MetadataStore>> {
    match config {
        MetadataConfig::Sqlite {
            path,
            default_ttl_secs,
        } => {
            let store = SqliteStore::new(path, default_ttl_secs.map(Duration::from_secs)).await?;
            Ok(Arc::new(store))
        }
        MetadataConfig::Memory { default_ttl_secs } => Ok(Arc::new(MemoryStore::new(
            default_ttl_secs.map(Duration::from_secs),
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoist_core::{UploadId, UploadMetadata, UploadRecord};
    use tempfile::tempdir;

    #[tokio::test]
    async fn from_config_memory_ok() {
        let store = from_config(&MetadataConfig::Memory {
            default_ttl_secs: None,
        })
        .await
        .unwrap();

        let id = UploadId::new();
        let record = UploadRecord::sized(4, UploadMetadata::default(), "/tmp/f");
        store
            .put(id, &record, hoist_core::RecordTtl::StoreDefault)
            .await
            .unwrap();
        assert!(store.get(id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn from_config_sqlite_ok() {
        let temp = tempdir().unwrap();
        let store = from_config(&MetadataConfig::Sqlite {
            path: temp.path().join("meta.db"),
            default_ttl_secs: None,
        })
        .await
        .unwrap();
        store.health_check().await.unwrap();
    }
}
