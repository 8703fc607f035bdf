//! Metadata store trait and the SQLite implementation.

use crate::error::MetadataResult;
use async_trait::async_trait;
use hoist_core::{RecordTtl, UploadId, UploadRecord};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use time::OffsetDateTime;

/// TTL key/value mapping from upload identifiers to their records.
///
/// Keys are the identifier's 32-hex simple form. The record is the source
/// of truth for everything but the current write offset.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Fetch a record, reporting absence for expired rows.
    async fn get(&self, id: UploadId) -> MetadataResult<Option<UploadRecord>>;

    /// Insert or replace a record. `ttl` resolves against the store's
    /// default; a resolved `None` means the record never expires.
    async fn put(&self, id: UploadId, record: &UploadRecord, ttl: RecordTtl) -> MetadataResult<()>;

    /// Delete a record. Idempotent if absent.
    async fn delete(&self, id: UploadId) -> MetadataResult<()>;

    /// Check store connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;
}

/// SQLite-backed metadata store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    default_ttl: Option<Duration>,
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS uploads (
    upload_id  TEXT PRIMARY KEY,
    record     TEXT NOT NULL,
    expires_at INTEGER
);
"#;

impl SqliteStore {
    /// Open (creating if missing) a store at `path`.
    pub async fn new(path: impl AsRef<Path>, default_ttl: Option<Duration>) -> MetadataResult<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let opts = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            // Prevent transient "database is locked" errors under concurrent access.
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            // SQLite permits limited write concurrency; a single connection
            // avoids persistent "database is locked" failures under load.
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool, default_ttl };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    fn expires_at(&self, ttl: RecordTtl) -> Option<i64> {
        ttl.resolve(self.default_ttl).map(|d| {
            OffsetDateTime::now_utc()
                .unix_timestamp()
                .saturating_add(d.as_secs().min(i64::MAX as u64) as i64)
        })
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn get(&self, id: UploadId) -> MetadataResult<Option<UploadRecord>> {
        let row: Option<(String, Option<i64>)> =
            sqlx::query_as("SELECT record, expires_at FROM uploads WHERE upload_id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        let Some((record, expires_at)) = row else {
            return Ok(None);
        };

        if let Some(expires_at) = expires_at {
            if expires_at <= OffsetDateTime::now_utc().unix_timestamp() {
                self.delete(id).await?;
                return Ok(None);
            }
        }

        Ok(Some(serde_json::from_str(&record)?))
    }

    async fn put(&self, id: UploadId, record: &UploadRecord, ttl: RecordTtl) -> MetadataResult<()> {
        let body = serde_json::to_string(record)?;
        sqlx::query(
            "INSERT INTO uploads (upload_id, record, expires_at) VALUES (?, ?, ?) \
             ON CONFLICT(upload_id) DO UPDATE SET record = excluded.record, \
             expires_at = excluded.expires_at",
        )
        .bind(id.to_string())
        .bind(body)
        .bind(self.expires_at(ttl))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, id: UploadId) -> MetadataResult<()> {
        sqlx::query("DELETE FROM uploads WHERE upload_id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoist_core::UploadMetadata;
    use tempfile::tempdir;

    fn sample_record() -> UploadRecord {
        UploadRecord::sized(11, UploadMetadata::default(), "/data/uploads/abc")
    }

    #[tokio::test]
    async fn put_get_delete_roundtrip() {
        let temp = tempdir().unwrap();
        let store = SqliteStore::new(temp.path().join("meta.db"), None)
            .await
            .unwrap();

        let id = UploadId::new();
        assert!(store.get(id).await.unwrap().is_none());

        let record = sample_record();
        store.put(id, &record, RecordTtl::StoreDefault).await.unwrap();
        assert_eq!(store.get(id).await.unwrap(), Some(record.clone()));

        store.delete(id).await.unwrap();
        assert!(store.get(id).await.unwrap().is_none());

        // delete is idempotent
        store.delete(id).await.unwrap();
    }

    #[tokio::test]
    async fn put_replaces_existing_record() {
        let temp = tempdir().unwrap();
        let store = SqliteStore::new(temp.path().join("meta.db"), None)
            .await
            .unwrap();

        let id = UploadId::new();
        let mut record = sample_record();
        store.put(id, &record, RecordTtl::StoreDefault).await.unwrap();

        record.mark_complete();
        store.put(id, &record, RecordTtl::StoreDefault).await.unwrap();

        let fetched = store.get(id).await.unwrap().unwrap();
        assert!(fetched.complete);
    }

    #[tokio::test]
    async fn zero_second_ttl_expires_immediately() {
        let temp = tempdir().unwrap();
        let store = SqliteStore::new(temp.path().join("meta.db"), None)
            .await
            .unwrap();

        let id = UploadId::new();
        store
            .put(id, &sample_record(), RecordTtl::Expire { seconds: 0 })
            .await
            .unwrap();
        assert!(store.get(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unbounded_overrides_store_default() {
        let temp = tempdir().unwrap();
        let store = SqliteStore::new(temp.path().join("meta.db"), Some(Duration::ZERO))
            .await
            .unwrap();

        let id = UploadId::new();
        store
            .put(id, &sample_record(), RecordTtl::Unbounded)
            .await
            .unwrap();
        assert!(store.get(id).await.unwrap().is_some());

        // StoreDefault picks up the zero-duration default and expires at once.
        let other = UploadId::new();
        store
            .put(other, &sample_record(), RecordTtl::StoreDefault)
            .await
            .unwrap();
        assert!(store.get(other).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("meta.db");
        let id = UploadId::new();

        {
            let store = SqliteStore::new(&path, None).await.unwrap();
            store
                .put(id, &sample_record(), RecordTtl::StoreDefault)
                .await
                .unwrap();
        }

        let store = SqliteStore::new(&path, None).await.unwrap();
        assert!(store.get(id).await.unwrap().is_some());
    }
}
