//! Multipart upload state management.
//!
//! A [`MultipartUpload`] moves through
//! `Open -> Completing -> Completed` or `Open -> Aborted`.
//!
//! - Parts are stored independently in a `DashMap`, so uploads of different
//!   part numbers never contend.
//! - A part record is only inserted while the state read guard shows `Open`.
//! - Completion takes the write guard to swap `Open` for `Completing`, which
//!   also waits out any part insert in flight. Only one caller can win that
//!   swap.
//!
//! The winner holds a [`CompletionGuard`]. Dropping it without calling
//! [`CompletionGuard::commit`] puts the upload back to `Open`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::checksums::normalize_etag;
use crate::error::S3ServiceError;
use crate::storage::BlobRef;

use super::object::Principal;

/// Lifecycle state of an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadState {
    /// Accepting parts.
    Open,
    /// A completion is assembling the object.
    Completing,
    /// Finished; the resulting object is published.
    Completed {
        /// ETag of the assembled object.
        etag: String,
        /// Version id of the published object.
        version_id: String,
        /// When the completion committed.
        completed_at: DateTime<Utc>,
    },
    /// Abandoned; parts freed.
    Aborted,
}

/// A single stored part.
#[derive(Debug, Clone)]
pub struct UploadPart {
    /// The part number (1-based, up to 10 000).
    pub part_number: u32,
    /// The entity tag for this part (quoted hex MD5).
    pub etag: String,
    /// Size of this part in bytes.
    pub size: u64,
    /// When this part was uploaded.
    pub last_modified: DateTime<Utc>,
    /// Part content.
    pub blob: BlobRef,
}

/// One entry of a completion manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    /// Part number.
    pub part_number: u32,
    /// ETag the caller received for the part.
    pub etag: String,
}

/// What a completion attempt found.
#[derive(Debug)]
pub enum CompletionStart<'a> {
    /// This caller won the swap and must assemble the object.
    Proceed(CompletionGuard<'a>),
    /// An earlier completion already finished.
    AlreadyCompleted {
        /// The published ETag.
        etag: String,
        /// The published version id.
        version_id: String,
    },
}

/// An in-progress multipart upload.
#[derive(Debug)]
pub struct MultipartUpload {
    /// Unique identifier for this upload.
    pub upload_id: String,
    /// Target bucket.
    pub bucket: String,
    /// The object key that this upload will create.
    pub key: String,
    /// Content type for the final object.
    pub content_type: String,
    /// The caller who initiated the upload.
    pub owner: Principal,
    /// When the upload was initiated.
    pub initiated: DateTime<Utc>,
    state: RwLock<UploadState>,
    parts: DashMap<u32, UploadPart>,
}

impl MultipartUpload {
    /// Create a new open upload.
    #[must_use]
    pub fn new(
        upload_id: String,
        bucket: String,
        key: String,
        content_type: String,
        owner: Principal,
    ) -> Self {
        Self {
            upload_id,
            bucket,
            key,
            content_type,
            owner,
            initiated: Utc::now(),
            state: RwLock::new(UploadState::Open),
            parts: DashMap::new(),
        }
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> UploadState {
        self.state.read().clone()
    }

    /// Whether the upload still blocks its bucket from deletion.
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(
            *self.state.read(),
            UploadState::Open | UploadState::Completing
        )
    }

    /// Whether the upload accepts parts.
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(*self.state.read(), UploadState::Open)
    }

    fn no_such_upload(&self) -> S3ServiceError {
        S3ServiceError::NoSuchUpload {
            upload_id: self.upload_id.clone(),
        }
    }

    /// Record a stored part, replacing any earlier part with the same number.
    ///
    /// # Errors
    ///
    /// [`S3ServiceError::NoSuchUpload`] unless the upload is open.
    pub fn put_part(&self, part: UploadPart) -> Result<(), S3ServiceError> {
        let state = self.state.read();
        if *state != UploadState::Open {
            return Err(self.no_such_upload());
        }
        debug!(upload_id = %self.upload_id, part_number = part.part_number, size = part.size, "part recorded");
        self.parts.insert(part.part_number, part);
        Ok(())
    }

    /// Look up a part.
    #[must_use]
    pub fn get_part(&self, part_number: u32) -> Option<UploadPart> {
        self.parts.get(&part_number).map(|p| p.value().clone())
    }

    /// All parts in part-number order.
    #[must_use]
    pub fn sorted_parts(&self) -> Vec<UploadPart> {
        let mut parts: Vec<UploadPart> = self.parts.iter().map(|p| p.value().clone()).collect();
        parts.sort_by_key(|p| p.part_number);
        parts
    }

    /// Number of parts uploaded so far.
    #[must_use]
    pub fn parts_count(&self) -> usize {
        self.parts.len()
    }

    /// Try to move `Open -> Completing`.
    ///
    /// # Errors
    ///
    /// [`S3ServiceError::NoSuchUpload`] if the upload is aborted or another
    /// completion is in progress.
    pub fn begin_complete(&self) -> Result<CompletionStart<'_>, S3ServiceError> {
        let mut state = self.state.write();
        if *state == UploadState::Open {
            *state = UploadState::Completing;
            return Ok(CompletionStart::Proceed(CompletionGuard {
                upload: self,
                committed: false,
            }));
        }
        match &*state {
            UploadState::Completed {
                etag, version_id, ..
            } => Ok(CompletionStart::AlreadyCompleted {
                etag: etag.clone(),
                version_id: version_id.clone(),
            }),
            UploadState::Open | UploadState::Completing | UploadState::Aborted => {
                Err(self.no_such_upload())
            }
        }
    }

    /// Move `Open -> Aborted` and free the parts.
    ///
    /// # Errors
    ///
    /// [`S3ServiceError::NoSuchUpload`] unless the upload is open.
    pub fn abort(&self) -> Result<(), S3ServiceError> {
        let mut state = self.state.write();
        if *state != UploadState::Open {
            return Err(self.no_such_upload());
        }
        *state = UploadState::Aborted;
        self.parts.clear();
        Ok(())
    }

    /// Whether the reaper should reclaim this upload at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        match &*self.state.read() {
            UploadState::Open => self.initiated + ttl < now,
            UploadState::Completed { completed_at, .. } => *completed_at + ttl < now,
            UploadState::Aborted => true,
            UploadState::Completing => false,
        }
    }
}

/// Exclusive right to finish an upload. Reverts to `Open` on drop unless
/// committed.
#[derive(Debug)]
pub struct CompletionGuard<'a> {
    upload: &'a MultipartUpload,
    committed: bool,
}

impl CompletionGuard<'_> {
    /// Validate `manifest` against the stored parts and return their blobs in
    /// manifest order.
    ///
    /// # Errors
    ///
    /// - [`S3ServiceError::InvalidPart`] for an empty manifest, a repeated
    ///   part number, a missing part or an ETag mismatch.
    /// - [`S3ServiceError::EntityTooSmall`] if any part but the last is under
    ///   `min_part_size`.
    pub fn select_parts(
        &self,
        manifest: &[CompletedPart],
        min_part_size: u64,
    ) -> Result<Vec<BlobRef>, S3ServiceError> {
        if manifest.is_empty() {
            return Err(S3ServiceError::InvalidPart {
                message: "the part list is empty".to_owned(),
            });
        }

        let mut seen = std::collections::HashSet::with_capacity(manifest.len());
        let mut blobs = Vec::with_capacity(manifest.len());
        let last = manifest.len() - 1;

        for (idx, wanted) in manifest.iter().enumerate() {
            if !seen.insert(wanted.part_number) {
                return Err(S3ServiceError::InvalidPart {
                    message: format!("part {} is listed more than once", wanted.part_number),
                });
            }
            let part = self.upload.parts.get(&wanted.part_number).ok_or_else(|| {
                S3ServiceError::InvalidPart {
                    message: format!("part {} was not uploaded", wanted.part_number),
                }
            })?;
            if normalize_etag(&part.etag) != normalize_etag(&wanted.etag) {
                return Err(S3ServiceError::InvalidPart {
                    message: format!("part {} has a different ETag", wanted.part_number),
                });
            }
            if idx != last && part.size < min_part_size {
                return Err(S3ServiceError::EntityTooSmall {
                    part_number: part.part_number,
                    size: part.size,
                    min_size: min_part_size,
                });
            }
            blobs.push(Arc::clone(&part.blob));
        }
        Ok(blobs)
    }

    /// Mark the upload completed and free its parts.
    pub fn commit(mut self, etag: String, version_id: String) {
        *self.upload.state.write() = UploadState::Completed {
            etag,
            version_id,
            completed_at: Utc::now(),
        };
        self.upload.parts.clear();
        self.committed = true;
    }
}

impl Drop for CompletionGuard<'_> {
    fn drop(&mut self) {
        if !self.committed {
            debug!(upload_id = %self.upload.upload_id, "completion rolled back");
            *self.upload.state.write() = UploadState::Open;
        }
    }
}
