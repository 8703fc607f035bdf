//! Target path selection.

use hoist_core::{UploadId, UploadMetadata};
use std::path::{Path, PathBuf};

/// Chooses the absolute path an upload's bytes will be written to.
///
/// Pluggable so deployments can shard by metadata (tenant, content type);
/// the default keeps one flat directory. The factory never creates
/// directories: creation fails hard when the parent is missing.
pub trait TargetPathFactory: Send + Sync {
    fn target_path(&self, id: UploadId, metadata: &UploadMetadata) -> PathBuf;
}

/// Default factory: files named by identifier under one directory.
pub struct DirectoryTargetFactory {
    directory: PathBuf,
}

impl DirectoryTargetFactory {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

impl TargetPathFactory for DirectoryTargetFactory {
    fn target_path(&self, id: UploadId, _metadata: &UploadMetadata) -> PathBuf {
        self.directory.join(id.to_string())
    }
}
