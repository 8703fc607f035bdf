//! Per-upload append serialization.

use hoist_core::UploadId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Hands out one async mutex per upload identifier.
///
/// The append critical section (record read, offset check, write,
/// completion) runs under this lock, so concurrent appends to the same
/// upload serialize instead of racing between the offset read and the
/// seek. The post-write size check stays authoritative regardless.
#[derive(Clone, Default)]
pub struct AppendLockRegistry {
    locks: Arc<Mutex<HashMap<UploadId, Arc<Mutex<()>>>>>,
}

impl AppendLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `id`, creating it on first use. Entries whose
    /// lock is uncontended are pruned on the way in.
    pub async fn acquire(&self, id: UploadId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(id).or_default())
        };
        lock.lock_owned().await
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.locks.lock().await.len()
    }
}
