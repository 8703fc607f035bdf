//! Server test utilities.

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use hoist_core::AppConfig;
use hoist_metadata::{MemoryStore, MetadataStore};
use hoist_server::events::{EventBus, UploadEvent, UploadListener};
use hoist_server::{AppState, create_router};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tower::ServiceExt;

/// An upload lifecycle transition observed during a test.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecordedEvent {
    Started(String),
    Completed(String),
}

/// Listener that captures every dispatched event.
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<RecordedEvent>>,
}

#[allow(dead_code)]
impl RecordingListener {
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn started_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, RecordedEvent::Started(_)))
            .count()
    }

    pub fn completed_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, RecordedEvent::Completed(_)))
            .count()
    }
}

#[async_trait]
impl UploadListener for RecordingListener {
    async fn on_upload_started(&self, event: &UploadEvent) {
        self.events
            .lock()
            .unwrap()
            .push(RecordedEvent::Started(event.id.to_string()));
    }

    async fn on_upload_complete(&self, event: &UploadEvent) {
        self.events
            .lock()
            .unwrap()
            .push(RecordedEvent::Completed(event.id.to_string()));
    }
}

/// A ready-to-drive router with its in-memory store, recording event
/// listener, and temp upload directory. Marked #[allow(dead_code)] since
/// every test file compiles its own copy of common/ and uses a different
/// subset of the helpers.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    pub listener: Arc<RecordingListener>,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a test server with temporary storage and default config.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("failed to create temp directory");

        let upload_dir = temp_dir.path().join("uploads");
        std::fs::create_dir_all(&upload_dir).expect("failed to create upload directory");

        let mut config = AppConfig::for_testing(&upload_dir);
        modifier(&mut config);

        let metadata: Arc<dyn MetadataStore> = Arc::new(MemoryStore::default());
        let listener = Arc::new(RecordingListener::default());
        let mut events = EventBus::new();
        events.subscribe(listener.clone());

        let state =
            AppState::with_defaults(config, metadata, events).expect("invalid test configuration");
        let router = create_router(state.clone());

        Self {
            router,
            state,
            listener,
            _temp_dir: temp_dir,
        }
    }

    /// Directory target files are written to.
    pub fn upload_dir(&self) -> PathBuf {
        self.state.config.upload.directory.clone()
    }

    /// Access to the underlying metadata store.
    pub fn metadata(&self) -> Arc<dyn MetadataStore> {
        self.state.metadata.clone()
    }
}

/// Drive one request through the router and collect the response.
#[allow(dead_code)]
pub async fn send(router: &axum::Router, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, body)
}

/// Read a response header as a string, panicking if absent.
#[allow(dead_code)]
pub fn header_str<'h>(headers: &'h HeaderMap, name: &str) -> &'h str {
    headers
        .get(name)
        .unwrap_or_else(|| panic!("missing header {name}"))
        .to_str()
        .unwrap()
}
