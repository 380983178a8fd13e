//! Blob storage for object and part content.
//!
//! Content is held in a [`Blob`]: small payloads stay in memory as [`Bytes`],
//! larger ones are spilled to a temporary file. Blobs are immutable and shared
//! through [`BlobRef`] (`Arc<Blob>`), so the metadata layer publishes an object
//! by inserting a reference to a fully written blob. A blob is freed, and its
//! spill file removed, when the last reference is dropped.
//!
//! Spill writes are retried through [`RetryPolicy`]. A write that fails
//! partway removes its temp file before the error is returned.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace, warn};

use crate::checksums;
use crate::error::S3ServiceError;
use crate::retry::RetryPolicy;

/// Default maximum blob size (in bytes) kept in memory: 512 KiB.
const DEFAULT_MAX_MEMORY_SIZE: usize = 524_288;

/// Shared handle to stored content.
pub type BlobRef = Arc<Blob>;

// ---------------------------------------------------------------------------
// StoredData
// ---------------------------------------------------------------------------

/// Where a blob's bytes live.
enum StoredData {
    /// Small payloads kept entirely in memory.
    InMemory {
        /// The raw bytes.
        data: Bytes,
    },
    /// Large payloads spilled to a temp file.
    OnDisk {
        /// Path to the temporary file.
        path: PathBuf,
    },
}

impl std::fmt::Debug for StoredData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InMemory { data } => f
                .debug_struct("InMemory")
                .field("size", &data.len())
                .finish(),
            Self::OnDisk { path } => f.debug_struct("OnDisk").field("path", path).finish(),
        }
    }
}

impl Drop for StoredData {
    fn drop(&mut self) {
        if let Self::OnDisk { path } = self {
            if let Err(e) = std::fs::remove_file(path.as_path()) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "failed to remove spill file");
                }
            } else {
                trace!(path = %path.display(), "removed spill file");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Blob
// ---------------------------------------------------------------------------

/// Immutable stored content with its content hash.
#[derive(Debug)]
pub struct Blob {
    data: StoredData,
    size: u64,
    etag: String,
}

impl Blob {
    /// Size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Quoted ETag of the content.
    #[must_use]
    pub fn etag(&self) -> &str {
        &self.etag
    }

    /// Whether the content was spilled to disk.
    #[must_use]
    pub fn is_on_disk(&self) -> bool {
        matches!(self.data, StoredData::OnDisk { .. })
    }

    /// Read the full content.
    pub async fn read_all(&self) -> Result<Bytes, S3ServiceError> {
        match &self.data {
            StoredData::InMemory { data } => Ok(data.clone()),
            StoredData::OnDisk { path } => {
                let data = tokio::fs::read(path).await.map_err(|e| {
                    S3ServiceError::Internal(anyhow::anyhow!(
                        "failed to read spill file {}: {e}",
                        path.display()
                    ))
                })?;
                Ok(Bytes::from(data))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// BlobStorage
// ---------------------------------------------------------------------------

/// Blob writer with automatic spillover to temp files for large payloads.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use s3lite_core::storage::BlobStorage;
///
/// # tokio_test::block_on(async {
/// let storage = BlobStorage::new(1024);
/// let blob = storage.store(Bytes::from("hello")).await.unwrap();
/// assert_eq!(blob.size(), 5);
/// assert_eq!(blob.read_all().await.unwrap().as_ref(), b"hello");
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct BlobStorage {
    max_memory_size: usize,
    spill_dir: Option<PathBuf>,
    retry: RetryPolicy,
}

impl Default for BlobStorage {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MEMORY_SIZE)
    }
}

impl BlobStorage {
    /// Create a storage backend with the given in-memory threshold.
    #[must_use]
    pub fn new(max_memory_size: usize) -> Self {
        debug!(max_memory_size, "creating BlobStorage");
        Self {
            max_memory_size,
            spill_dir: None,
            retry: RetryPolicy::default(),
        }
    }

    /// Use `policy` for spill writes.
    #[must_use]
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Spill into `dir` instead of the OS temp directory.
    #[must_use]
    pub fn with_spill_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spill_dir = Some(dir.into());
        self
    }

    /// The in-memory threshold in bytes.
    #[must_use]
    pub fn max_memory_size(&self) -> usize {
        self.max_memory_size
    }

    /// Store `data` and return a handle to it. The ETag is the content MD5.
    pub async fn store(&self, data: Bytes) -> Result<BlobRef, S3ServiceError> {
        let etag = checksums::compute_etag(&data);
        self.store_with_etag(data, etag).await
    }

    /// Concatenate `parts` in the given order into a new blob carrying the
    /// composite multipart ETag.
    pub async fn assemble(&self, parts: &[BlobRef]) -> Result<BlobRef, S3ServiceError> {
        let total = parts.iter().map(|p| p.size()).sum::<u64>();
        let mut combined = BytesMut::with_capacity(usize::try_from(total).unwrap_or(0));
        let mut part_etags = Vec::with_capacity(parts.len());
        for part in parts {
            combined.extend_from_slice(&part.read_all().await?);
            part_etags.push(part.etag().to_owned());
        }
        let etag = checksums::compute_multipart_etag(&part_etags);
        debug!(parts = parts.len(), size = total, "assembled multipart blob");
        self.store_with_etag(combined.freeze(), etag).await
    }

    async fn store_with_etag(&self, data: Bytes, etag: String) -> Result<BlobRef, S3ServiceError> {
        let size = data.len() as u64;
        let stored = if data.len() > self.max_memory_size {
            self.retry
                .run("spill_to_disk", || self.spill_to_disk(&data))
                .await?
        } else {
            StoredData::InMemory { data }
        };
        trace!(size, etag = %etag, "stored blob");
        Ok(Arc::new(Blob {
            data: stored,
            size,
            etag,
        }))
    }

    /// Write `data` to a fresh temp file. The file is deleted if any step fails.
    async fn spill_to_disk(&self, data: &[u8]) -> Result<StoredData, S3ServiceError> {
        let temp = match &self.spill_dir {
            Some(dir) => tempfile::NamedTempFile::new_in(dir),
            None => tempfile::NamedTempFile::new(),
        }
        .map_err(io_fault)?;

        tokio::fs::write(temp.path(), data).await.map_err(io_fault)?;

        let path = temp.into_temp_path().keep().map_err(|e| {
            S3ServiceError::Internal(anyhow::anyhow!("failed to keep spill file: {e}"))
        })?;
        trace!(path = %path.display(), size = data.len(), "spilled blob to disk");
        Ok(StoredData::OnDisk { path })
    }
}

/// Classify an I/O error: interruptions and timeouts are retryable.
fn io_fault(err: std::io::Error) -> S3ServiceError {
    use std::io::ErrorKind;
    match err.kind() {
        ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut => {
            S3ServiceError::TransientStorage(err)
        }
        _ => S3ServiceError::Internal(anyhow::anyhow!("storage I/O error: {err}")),
    }
}
