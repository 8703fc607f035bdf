//! Application state shared across handlers.

use crate::events::EventBus;
use crate::location::{LocationProvider, PathLocationProvider};
use crate::lock::AppendLockRegistry;
use crate::target::{DirectoryTargetFactory, TargetPathFactory};
use hoist_core::AppConfig;
use hoist_metadata::MetadataStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Metadata store.
    pub metadata: Arc<dyn MetadataStore>,
    /// Request <-> upload identifier mapping.
    pub locations: Arc<dyn LocationProvider>,
    /// Target path selection.
    pub targets: Arc<dyn TargetPathFactory>,
    /// Lifecycle event dispatch.
    pub events: Arc<EventBus>,
    /// Per-upload append serialization.
    pub append_locks: AppendLockRegistry,
}

impl AppState {
    /// Create state with explicit collaborators. Validates configuration.
    pub fn new(
        config: AppConfig,
        metadata: Arc<dyn MetadataStore>,
        locations: Arc<dyn LocationProvider>,
        targets: Arc<dyn TargetPathFactory>,
        events: EventBus,
    ) -> hoist_core::Result<Self> {
        config.validate()?;

        Ok(Self {
            config: Arc::new(config),
            metadata,
            locations,
            targets,
            events: Arc::new(events),
            append_locks: AppendLockRegistry::new(),
        })
    }

    /// Create state with the default providers derived from configuration:
    /// path-segment locations and a flat target directory.
    pub fn with_defaults(
        config: AppConfig,
        metadata: Arc<dyn MetadataStore>,
        events: EventBus,
    ) -> hoist_core::Result<Self> {
        let locations = Arc::new(PathLocationProvider::new(config.upload.base_path.clone()));
        let targets = Arc::new(DirectoryTargetFactory::new(config.upload.directory.clone()));
        Self::new(config, metadata, locations, targets, events)
    }
}
