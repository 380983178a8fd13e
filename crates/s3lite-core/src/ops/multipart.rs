//! Multipart upload operations.
//!
//! Implements `create_multipart_upload`, `upload_part`,
//! `complete_multipart_upload`, `abort_multipart_upload`, `list_parts`,
//! `list_multipart_uploads` and the expiry sweep `reap_expired_uploads`.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::content_type;
use crate::error::S3ServiceError;
use crate::provider::ObjectGateway;
use crate::state::{
    CompletedPart, CompletionStart, MultipartUpload, NewObject, Principal, S3Bucket, UploadPart,
    UploadState,
};
use crate::utils::generate_upload_id;
use crate::validation::{validate_object_key, validate_part_number};

/// Longest TTL honoured, about a century.
const MAX_TTL_SECS: i64 = 100 * 365 * 24 * 3600;

/// Result of a completed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompleteMultipartUploadOutput {
    /// Target bucket.
    pub bucket: String,
    /// Target key.
    pub key: String,
    /// Composite ETag of the assembled object.
    pub etag: String,
    /// Version id, when the bucket has been versioned.
    pub version_id: Option<String>,
}

/// A stored part as reported by `list_parts`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartSummary {
    /// Part number.
    pub part_number: u32,
    /// Quoted MD5 of the part.
    pub etag: String,
    /// Size in bytes.
    pub size: u64,
    /// Upload time.
    pub last_modified: DateTime<Utc>,
}

impl From<&UploadPart> for PartSummary {
    fn from(part: &UploadPart) -> Self {
        Self {
            part_number: part.part_number,
            etag: part.etag.clone(),
            size: part.size,
            last_modified: part.last_modified,
        }
    }
}

/// An open upload as reported by `list_multipart_uploads`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSummary {
    /// Upload id.
    pub upload_id: String,
    /// Target key.
    pub key: String,
    /// Who started it.
    pub owner: Principal,
    /// When it started.
    pub initiated: DateTime<Utc>,
}

impl ObjectGateway {
    /// Start a multipart upload for `key` and return its id.
    pub fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
        principal: &Principal,
    ) -> Result<String, S3ServiceError> {
        validate_object_key(key)?;
        let target = self.bucket(bucket)?;
        let content_type = content_type::resolve(content_type, key)?;

        let upload_id = generate_upload_id();
        let upload = MultipartUpload::new(
            upload_id.clone(),
            bucket.to_owned(),
            key.to_owned(),
            content_type,
            principal.clone(),
        );
        target.add_upload(Arc::new(upload))?;

        debug!(bucket = %bucket, key = %key, upload_id = %upload_id, "create_multipart_upload completed");
        Ok(upload_id)
    }

    /// Store one part and return its ETag.
    ///
    /// Parts for the same upload may arrive concurrently and in any order;
    /// re-uploading a part number replaces the earlier part.
    ///
    /// # Errors
    ///
    /// - [`S3ServiceError::NoSuchUpload`] unless the upload is open.
    /// - [`S3ServiceError::InvalidArgument`] for a part number outside
    ///   1-10000 or a length mismatch.
    pub async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: u32,
        body: Bytes,
        declared_len: Option<u64>,
    ) -> Result<String, S3ServiceError> {
        validate_part_number(part_number)?;
        if let Some(declared) = declared_len {
            if declared != body.len() as u64 {
                return Err(S3ServiceError::InvalidArgument {
                    message: format!(
                        "Content-Length {declared} does not match the {} bytes received",
                        body.len()
                    ),
                });
            }
        }
        let (_, upload) = self.lookup_upload(bucket, key, upload_id)?;
        if !upload.is_open() {
            return Err(S3ServiceError::NoSuchUpload {
                upload_id: upload_id.to_owned(),
            });
        }

        let blob = self.storage.store(body).await?;
        let etag = blob.etag().to_owned();
        upload.put_part(UploadPart {
            part_number,
            etag: etag.clone(),
            size: blob.size(),
            last_modified: Utc::now(),
            blob,
        })?;
        Ok(etag)
    }

    /// Assemble the listed parts, in the given order, into the final object.
    ///
    /// Only one caller can finish an upload. A concurrent call fails with
    /// [`S3ServiceError::NoSuchUpload`]; a call after completion returns the
    /// same result again. A failed attempt publishes nothing and leaves the
    /// upload open.
    ///
    /// # Errors
    ///
    /// - [`S3ServiceError::InvalidPart`] for a missing, repeated or
    ///   mismatched part.
    /// - [`S3ServiceError::EntityTooSmall`] for an undersized non-final part.
    pub async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<CompleteMultipartUploadOutput, S3ServiceError> {
        let (target, upload) = self.lookup_upload(bucket, key, upload_id)?;

        let guard = match upload.begin_complete()? {
            CompletionStart::Proceed(guard) => guard,
            CompletionStart::AlreadyCompleted { etag, version_id } => {
                debug!(upload_id = %upload_id, "upload already completed");
                return Ok(CompleteMultipartUploadOutput {
                    bucket: bucket.to_owned(),
                    key: key.to_owned(),
                    etag,
                    version_id: target.is_versioned().then_some(version_id),
                });
            }
        };

        let blobs = guard.select_parts(parts, self.config.min_part_size)?;
        let assembled = self.storage.assemble(&blobs).await?;
        let object = target.publish(
            key,
            NewObject {
                blob: assembled,
                content_type: upload.content_type.clone(),
                parts_count: Some(u32::try_from(parts.len()).unwrap_or(u32::MAX)),
            },
        )?;
        guard.commit(object.etag.clone(), object.version_id.clone());

        info!(
            bucket = %bucket,
            key = %key,
            upload_id = %upload_id,
            parts = parts.len(),
            size = object.size,
            etag = %object.etag,
            "multipart upload completed"
        );

        Ok(CompleteMultipartUploadOutput {
            bucket: bucket.to_owned(),
            key: key.to_owned(),
            etag: object.etag,
            version_id: target.is_versioned().then_some(object.version_id),
        })
    }

    /// Abandon an open upload and free its parts.
    ///
    /// # Errors
    ///
    /// [`S3ServiceError::NoSuchUpload`] unless the upload is open.
    pub fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<(), S3ServiceError> {
        let (target, upload) = self.lookup_upload(bucket, key, upload_id)?;
        upload.abort()?;
        target.uploads.remove(upload_id);
        debug!(bucket = %bucket, key = %key, upload_id = %upload_id, "abort_multipart_upload completed");
        Ok(())
    }

    /// Parts of an open upload in part-number order.
    pub fn list_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<Vec<PartSummary>, S3ServiceError> {
        let (_, upload) = self.lookup_upload(bucket, key, upload_id)?;
        if !upload.is_open() {
            return Err(S3ServiceError::NoSuchUpload {
                upload_id: upload_id.to_owned(),
            });
        }
        Ok(upload.sorted_parts().iter().map(PartSummary::from).collect())
    }

    /// Open uploads in `bucket`, ordered by key then start time.
    pub fn list_multipart_uploads(
        &self,
        bucket: &str,
    ) -> Result<Vec<UploadSummary>, S3ServiceError> {
        let target = self.bucket(bucket)?;
        Ok(target
            .open_uploads()
            .iter()
            .map(|u| UploadSummary {
                upload_id: u.upload_id.clone(),
                key: u.key.clone(),
                owner: u.owner.clone(),
                initiated: u.initiated,
            })
            .collect())
    }

    /// Reclaim uploads older than the configured TTL as of `now`.
    ///
    /// Open uploads are aborted and their parts freed; completed tombstones
    /// are dropped. Uploads mid-completion are left alone. Returns the number
    /// of uploads removed.
    pub fn reap_expired_uploads(&self, now: DateTime<Utc>) -> usize {
        let ceiling = chrono::Duration::seconds(MAX_TTL_SECS);
        let ttl = chrono::Duration::from_std(self.config.multipart_ttl())
            .map_or(ceiling, |ttl| ttl.min(ceiling));

        let mut reaped = 0;
        for bucket in self.state.all_buckets() {
            reaped += reap_bucket(&bucket, now, ttl);
        }
        if reaped > 0 {
            info!(reaped, "expired multipart uploads reclaimed");
        }
        reaped
    }

    /// Find an upload by id and check it targets `key`.
    fn lookup_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<(Arc<S3Bucket>, Arc<MultipartUpload>), S3ServiceError> {
        let target = self.bucket(bucket)?;
        let upload = target
            .uploads
            .get(upload_id)
            .map(|u| Arc::clone(u.value()))
            .filter(|u| u.key == key)
            .ok_or_else(|| S3ServiceError::NoSuchUpload {
                upload_id: upload_id.to_owned(),
            })?;
        Ok((target, upload))
    }
}

fn reap_bucket(bucket: &S3Bucket, now: DateTime<Utc>, ttl: chrono::Duration) -> usize {
    let expired: Vec<Arc<MultipartUpload>> = bucket
        .uploads
        .iter()
        .filter(|u| u.is_expired(now, ttl))
        .map(|u| Arc::clone(u.value()))
        .collect();

    let mut reaped = 0;
    for upload in expired {
        if upload.state() == UploadState::Open {
            if let Err(e) = upload.abort() {
                // A completion won the race; the next sweep sees its tombstone.
                warn!(upload_id = %upload.upload_id, error = %e, "skipping upload that changed state");
                continue;
            }
            debug!(bucket = %bucket.name, key = %upload.key, upload_id = %upload.upload_id, "expired upload aborted");
        }
        bucket.uploads.remove(&upload.upload_id);
        reaped += 1;
    }
    reaped
}
