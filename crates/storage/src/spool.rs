//! Spool files for two-phase append staging.
//!
//! When intermediate-chunk mode is on, a request body is first written to a
//! uniquely named spool file and only then copied into the target at the
//! append offset. The staging hop is a seam for content inspection of a
//! request's bytes before they reach the target; with nothing hooked in it
//! is a straight copy.

use crate::error::{StorageError, StorageResult};
use crate::file::{TargetFile, TargetWriter, file_byte_stream};
use bytes::Bytes;
use futures::Stream;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use uuid::Uuid;

/// A per-request staging file.
///
/// Removed explicitly in every outcome; the `Drop` impl is a backstop for
/// early returns.
pub struct SpoolFile {
    path: PathBuf,
    cleaned: bool,
}

impl SpoolFile {
    /// Create a uniquely named spool file in `dir`.
    pub async fn create(dir: &Path) -> StorageResult<Self> {
        let path = dir.join(format!("hoist-{}.spool", Uuid::new_v4().as_simple()));
        OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        Ok(Self {
            path,
            cleaned: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stream the request body into the spool, honoring the write limit.
    /// Returns bytes transferred.
    pub async fn fill<S, E>(&self, stream: S, limit: Option<u64>) -> StorageResult<u64>
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
        E: std::error::Error + Send + Sync + 'static,
    {
        let file = OpenOptions::new().write(true).open(&self.path).await?;
        let mut writer = TargetWriter::from_file(file);
        writer.copy_from(stream, limit).await
    }

    /// Copy the spooled bytes into the target at `offset`. Returns bytes
    /// written, which must equal the spool size; a shortfall is a hard
    /// `SpoolMismatch` error.
    pub async fn drain_into(&self, target: &TargetFile, offset: u64) -> StorageResult<u64> {
        let expected = fs::metadata(&self.path).await?.len();

        let reader = fs::File::open(&self.path).await?;
        let mut writer = target.open_at(offset).await?;
        let written = writer.copy_from(file_byte_stream(reader), None).await?;

        if written != expected {
            return Err(StorageError::SpoolMismatch {
                expected,
                actual: written,
            });
        }
        Ok(written)
    }

    /// Remove the spool file. Idempotent if already absent.
    pub async fn remove(&mut self) -> StorageResult<()> {
        self.cleaned = true;
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

impl Drop for SpoolFile {
    fn drop(&mut self) {
        if !self.cleaned {
            if let Err(e) = std::fs::remove_file(&self.path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(
                        path = %self.path.display(),
                        error = %e,
                        "failed to clean up spool file"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::convert::Infallible;
    use tempfile::tempdir;

    fn body(chunks: &[&[u8]]) -> impl Stream<Item = Result<Bytes, Infallible>> + Unpin {
        stream::iter(
            chunks
                .iter()
                .map(|c| Ok(Bytes::copy_from_slice(c)))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn fill_then_drain_reaches_target() {
        let dir = tempdir().unwrap();
        let target = TargetFile::new(dir.path().join("upload"));
        target.create().await.unwrap();

        let mut spool = SpoolFile::create(dir.path()).await.unwrap();
        let transferred = spool.fill(body(&[b"hello ", b"world"]), None).await.unwrap();
        assert_eq!(transferred, 11);

        let written = spool.drain_into(&target, 0).await.unwrap();
        assert_eq!(written, 11);
        spool.remove().await.unwrap();

        let data = tokio::fs::read(target.path()).await.unwrap();
        assert_eq!(data, b"hello world");
    }

    #[tokio::test]
    async fn drain_respects_offset() {
        let dir = tempdir().unwrap();
        let target = TargetFile::new(dir.path().join("upload"));
        target.create().await.unwrap();
        let mut writer = target.open_at(0).await.unwrap();
        writer.copy_from(body(&[b"hello "]), None).await.unwrap();

        let mut spool = SpoolFile::create(dir.path()).await.unwrap();
        spool.fill(body(&[b"world"]), None).await.unwrap();
        spool.drain_into(&target, 6).await.unwrap();
        spool.remove().await.unwrap();

        let data = tokio::fs::read(target.path()).await.unwrap();
        assert_eq!(data, b"hello world");
    }

    #[tokio::test]
    async fn fill_enforces_limit() {
        let dir = tempdir().unwrap();
        let mut spool = SpoolFile::create(dir.path()).await.unwrap();

        let err = spool
            .fill(body(&[b"aaaa", b"bbbb"]), Some(6))
            .await
            .unwrap_err();
        match err {
            StorageError::LimitExceeded { limit } => assert_eq!(limit, 6),
            other => panic!("expected LimitExceeded, got {other:?}"),
        }
        spool.remove().await.unwrap();
    }

    #[tokio::test]
    async fn spool_names_are_unique() {
        let dir = tempdir().unwrap();
        let mut a = SpoolFile::create(dir.path()).await.unwrap();
        let mut b = SpoolFile::create(dir.path()).await.unwrap();
        assert_ne!(a.path(), b.path());
        a.remove().await.unwrap();
        b.remove().await.unwrap();
    }

    #[tokio::test]
    async fn drop_cleans_up_unremoved_spool() {
        let dir = tempdir().unwrap();
        let path;
        {
            let spool = SpoolFile::create(dir.path()).await.unwrap();
            path = spool.path().to_path_buf();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }
}
