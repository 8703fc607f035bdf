//! In-memory metadata store.

use crate::error::MetadataResult;
use crate::store::MetadataStore;
use async_trait::async_trait;
use hoist_core::{RecordTtl, UploadId, UploadRecord};
use std::collections::HashMap;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::RwLock;

struct Entry {
    record: UploadRecord,
    expires_at: Option<OffsetDateTime>,
}

impl Entry {
    fn expired(&self, now: OffsetDateTime) -> bool {
        matches!(self.expires_at, Some(at) if at <= now)
    }
}

/// Process-local metadata store. Records do not survive a restart.
pub struct MemoryStore {
    entries: RwLock<HashMap<UploadId, Entry>>,
    default_ttl: Option<Duration>,
}

impl MemoryStore {
    pub fn new(default_ttl: Option<Duration>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn get(&self, id: UploadId) -> MetadataResult<Option<UploadRecord>> {
        let now = OffsetDateTime::now_utc();

        {
            let entries = self.entries.read().await;
            match entries.get(&id) {
                None => return Ok(None),
                Some(entry) if !entry.expired(now) => return Ok(Some(entry.record.clone())),
                Some(_) => {}
            }
        }

        // Expired: drop the lazily-kept row.
        let mut entries = self.entries.write().await;
        if entries.get(&id).is_some_and(|e| e.expired(now)) {
            entries.remove(&id);
        }
        Ok(None)
    }

    async fn put(&self, id: UploadId, record: &UploadRecord, ttl: RecordTtl) -> MetadataResult<()> {
        let expires_at = ttl
            .resolve(self.default_ttl)
            .map(|d| OffsetDateTime::now_utc() + d);

        self.entries.write().await.insert(
            id,
            Entry {
                record: record.clone(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn delete(&self, id: UploadId) -> MetadataResult<()> {
        self.entries.write().await.remove(&id);
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        Ok(())
    }
}
