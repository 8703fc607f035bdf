//! Upload lifecycle events.

use async_trait::async_trait;
use hoist_core::{UploadId, UploadMetadata};
use std::path::PathBuf;
use std::sync::Arc;

/// Payload for upload lifecycle notifications.
#[derive(Clone, Debug)]
pub struct UploadEvent {
    pub id: UploadId,
    pub file: PathBuf,
    pub metadata: UploadMetadata,
}

/// Subscriber to upload lifecycle events.
///
/// Dispatch is fire-and-forget: nothing a listener does affects the
/// handler's response.
#[async_trait]
pub trait UploadListener: Send + Sync {
    /// An upload resource was created by a pure-create POST.
    async fn on_upload_started(&self, event: &UploadEvent);

    /// An upload's declared length was fully received.
    async fn on_upload_complete(&self, event: &UploadEvent);
}

/// Dispatches events to subscribers in registration order.
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<Arc<dyn UploadListener>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: Arc<dyn UploadListener>) {
        self.listeners.push(listener);
    }

    pub async fn upload_started(&self, event: &UploadEvent) {
        for listener in &self.listeners {
            listener.on_upload_started(event).await;
        }
    }

    pub async fn upload_complete(&self, event: &UploadEvent) {
        for listener in &self.listeners {
            listener.on_upload_complete(event).await;
        }
    }
}

/// Default subscriber: a structured log line per transition.
pub struct LogListener;

#[async_trait]
impl UploadListener for LogListener {
    async fn on_upload_started(&self, event: &UploadEvent) {
        tracing::info!(
            upload_id = %event.id,
            file = %event.file.display(),
            "upload started"
        );
    }

    async fn on_upload_complete(&self, event: &UploadEvent) {
        tracing::info!(
            upload_id = %event.id,
            file = %event.file.display(),
            "upload complete"
        );
    }
}
