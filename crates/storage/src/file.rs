//! Target file handles and streaming writes.

use crate::error::{StorageError, StorageResult};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

/// Chunk size for streaming reads and spool copies (64 KiB).
pub(crate) const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// A boxed stream of bytes for streaming reads.
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// Handle on an upload's target file.
///
/// Pure wrapper around a path; every operation goes to the filesystem, so
/// sizes always reflect the latest flushed write. Nothing here is memoized.
#[derive(Clone, Debug)]
pub struct TargetFile {
    path: PathBuf,
}

impl TargetFile {
    /// Wrap a path. Performs no I/O.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the file empty. Fails if it already exists, and fails hard
    /// if the containing directory does not exist.
    pub async fn create(&self) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            if !fs::try_exists(parent).await? {
                return Err(StorageError::ParentMissing(parent.to_path_buf()));
            }
        }

        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(StorageError::AlreadyExists(self.path.clone()))
            }
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    /// Check existence with a fresh stat.
    pub async fn exists(&self) -> StorageResult<bool> {
        fs::try_exists(&self.path).await.map_err(StorageError::Io)
    }

    /// Current size with a fresh stat; 0 for nonexistent or unreadable.
    pub async fn size(&self) -> u64 {
        match fs::metadata(&self.path).await {
            Ok(meta) => meta.len(),
            Err(_) => 0,
        }
    }

    /// Open read+write preserving content and position the writer at
    /// `offset`.
    pub async fn open_at(&self, offset: u64) -> StorageResult<TargetWriter> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .await?;
        file.seek(SeekFrom::Start(offset)).await?;
        Ok(TargetWriter { file })
    }

    /// Stream the file's contents.
    pub async fn read_stream(&self) -> StorageResult<ByteStream> {
        let file = fs::File::open(&self.path).await?;
        Ok(file_byte_stream(file))
    }

    /// Remove the file. Idempotent if already absent.
    pub async fn delete(&self) -> StorageResult<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

/// A positioned writer on a target (or spool) file.
pub struct TargetWriter {
    file: fs::File,
}

impl TargetWriter {
    pub(crate) fn from_file(file: fs::File) -> Self {
        Self { file }
    }

    /// Consume a byte stream, writing and flushing each chunk at the
    /// current position. Returns the number of bytes transferred.
    ///
    /// If `limit` is set, fails mid-stream with `LimitExceeded` as soon as
    /// the transferred count would pass it; the chunk that crosses the
    /// limit is not written. Memory footprint is one chunk regardless of
    /// body size.
    pub async fn copy_from<S, E>(&mut self, mut stream: S, limit: Option<u64>) -> StorageResult<u64>
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
        E: std::error::Error + Send + Sync + 'static,
    {
        let mut transferred: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| StorageError::Body(Box::new(e)))?;
            if chunk.is_empty() {
                continue;
            }

            transferred += chunk.len() as u64;
            if let Some(limit) = limit {
                if transferred > limit {
                    return Err(StorageError::LimitExceeded { limit });
                }
            }

            self.file.write_all(&chunk).await?;
            self.file.flush().await?;
        }

        Ok(transferred)
    }
}

/// Stream a file in fixed-size chunks.
pub(crate) fn file_byte_stream(file: fs::File) -> ByteStream {
    let stream = async_stream::try_stream! {
        let mut file = file;
        let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            yield Bytes::copy_from_slice(&buf[..n]);
        }
    };
    Box::pin(stream)
}
