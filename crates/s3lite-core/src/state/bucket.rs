//! Bucket state: objects, uploads, versioning, policy and limits.
//!
//! Lock order is `versioning` then `objects`. Every object write happens under
//! the `objects` write lock with fully stored content. A reader therefore
//! sees either the previous entry or the new one, never a partial write.

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::GatewayConfig;
use crate::error::S3ServiceError;
use crate::policy::PolicyDocument;
use crate::storage::BlobRef;
use crate::utils::generate_version_id;

use super::keystore::{ListResult, ObjectStore, StoreUsage};
use super::multipart::MultipartUpload;
use super::object::{DeleteOutcome, NULL_VERSION_ID, Principal, S3DeleteMarker, S3Object};

// ---------------------------------------------------------------------------
// Versioning
// ---------------------------------------------------------------------------

/// Bucket versioning status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersioningStatus {
    /// Versioning has never been enabled on this bucket.
    #[default]
    Unversioned,
    /// Every write creates a new version.
    Enabled,
    /// Writes replace the `null` version; history is kept.
    Suspended,
}

impl VersioningStatus {
    /// Wire value, `None` for a never-versioned bucket.
    #[must_use]
    pub fn as_str(&self) -> Option<&'static str> {
        match self {
            Self::Unversioned => None,
            Self::Enabled => Some("Enabled"),
            Self::Suspended => Some("Suspended"),
        }
    }
}

impl FromStr for VersioningStatus {
    type Err = S3ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Enabled" => Ok(Self::Enabled),
            "Suspended" => Ok(Self::Suspended),
            other => Err(S3ServiceError::InvalidArgument {
                message: format!("Invalid versioning status: {other}"),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Per-bucket quota.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BucketLimits {
    /// Maximum stored object versions.
    pub max_objects: Option<u64>,
    /// Maximum stored bytes.
    pub max_bytes: Option<u64>,
}

impl BucketLimits {
    /// Limits taken from configuration.
    #[must_use]
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            max_objects: config.object_limit(),
            max_bytes: config.byte_limit(),
        }
    }

    fn check(&self, bucket: &str, after: StoreUsage) -> Result<(), S3ServiceError> {
        if let Some(max) = self.max_objects.filter(|max| after.objects > *max) {
            return Err(S3ServiceError::QuotaExceeded {
                bucket: bucket.to_owned(),
                message: format!("object count limit {max} reached"),
            });
        }
        if let Some(max) = self.max_bytes.filter(|max| after.bytes > *max) {
            return Err(S3ServiceError::QuotaExceeded {
                bucket: bucket.to_owned(),
                message: format!("size limit of {max} bytes reached"),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// S3Bucket
// ---------------------------------------------------------------------------

/// Content and metadata for a write.
#[derive(Debug, Clone)]
pub struct NewObject {
    /// Fully stored content.
    pub blob: BlobRef,
    /// MIME type.
    pub content_type: String,
    /// Part count for multipart results.
    pub parts_count: Option<u32>,
}

/// A bucket with all its state.
pub struct S3Bucket {
    /// Bucket name.
    pub name: String,
    /// When the bucket was created.
    pub creation_date: DateTime<Utc>,
    /// The bucket owner.
    pub owner: Principal,
    /// Multipart uploads keyed by upload id, including completed tombstones.
    pub uploads: DashMap<String, Arc<MultipartUpload>>,
    objects: RwLock<ObjectStore>,
    versioning: RwLock<VersioningStatus>,
    policy: RwLock<Option<Arc<PolicyDocument>>>,
    limits: BucketLimits,
    version_seq: AtomicU64,
    deleted: AtomicBool,
}

impl std::fmt::Debug for S3Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Bucket")
            .field("name", &self.name)
            .field("creation_date", &self.creation_date)
            .field("owner", &self.owner)
            .field("versioning", &*self.versioning.read())
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl S3Bucket {
    /// Create an empty bucket.
    #[must_use]
    pub fn new(name: String, owner: Principal, limits: BucketLimits) -> Self {
        Self {
            name,
            creation_date: Utc::now(),
            owner,
            uploads: DashMap::new(),
            objects: RwLock::new(ObjectStore::default()),
            versioning: RwLock::new(VersioningStatus::default()),
            policy: RwLock::new(None),
            limits,
            version_seq: AtomicU64::new(0),
            deleted: AtomicBool::new(false),
        }
    }

    fn no_such_key(key: &str) -> S3ServiceError {
        S3ServiceError::NoSuchKey {
            key: key.to_owned(),
        }
    }

    /// Whether the bucket holds no objects and no active uploads.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty() && !self.uploads.iter().any(|u| u.is_active())
    }

    /// Mark the bucket deleted if it is empty. Later writes fail with
    /// `NoSuchBucket`.
    pub(crate) fn retire(&self) -> Result<(), S3ServiceError> {
        let objects = self.objects.write();
        if !objects.is_empty() || self.uploads.iter().any(|u| u.is_active()) {
            return Err(S3ServiceError::BucketNotEmpty {
                bucket: self.name.clone(),
            });
        }
        self.deleted.store(true, Ordering::SeqCst);
        self.uploads.clear();
        Ok(())
    }

    /// Whether the bucket has been deleted.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::SeqCst)
    }

    fn ensure_live(&self) -> Result<(), S3ServiceError> {
        if self.is_deleted() {
            return Err(S3ServiceError::NoSuchBucket {
                bucket: self.name.clone(),
            });
        }
        Ok(())
    }

    // -- versioning --

    /// Current versioning status.
    #[must_use]
    pub fn versioning(&self) -> VersioningStatus {
        *self.versioning.read()
    }

    /// Change the versioning status.
    ///
    /// Enabling converts the object store to versioned storage. Suspending a
    /// bucket that was never versioned leaves it unversioned.
    pub fn set_versioning(&self, requested: VersioningStatus) {
        let mut status = self.versioning.write();
        match requested {
            VersioningStatus::Enabled if *status != VersioningStatus::Enabled => {
                debug!(bucket = %self.name, "enabling versioning");
                self.objects.write().transition_to_versioned();
                *status = VersioningStatus::Enabled;
            }
            VersioningStatus::Suspended if *status == VersioningStatus::Enabled => {
                debug!(bucket = %self.name, "suspending versioning");
                *status = VersioningStatus::Suspended;
            }
            _ => {}
        }
    }

    /// Whether object versions are exposed to callers.
    #[must_use]
    pub fn is_versioned(&self) -> bool {
        self.objects.read().is_versioned()
    }

    fn next_version_id(&self, status: VersioningStatus) -> String {
        match status {
            VersioningStatus::Enabled => {
                generate_version_id(self.version_seq.fetch_add(1, Ordering::SeqCst) + 1)
            }
            VersioningStatus::Unversioned | VersioningStatus::Suspended => {
                NULL_VERSION_ID.to_owned()
            }
        }
    }

    // -- policy --

    /// The current policy snapshot.
    #[must_use]
    pub fn policy(&self) -> Option<Arc<PolicyDocument>> {
        self.policy.read().clone()
    }

    /// Replace the policy. Takes effect for every later authorization.
    pub fn set_policy(&self, policy: PolicyDocument) {
        *self.policy.write() = Some(Arc::new(policy));
    }

    /// Remove the policy, returning whether one was set.
    pub fn delete_policy(&self) -> bool {
        self.policy.write().take().is_some()
    }

    // -- objects --

    /// Publish a fully stored object under `key`.
    ///
    /// # Errors
    ///
    /// - [`S3ServiceError::QuotaExceeded`] if a limit would be passed; nothing
    ///   is published.
    /// - [`S3ServiceError::NoSuchBucket`] if the bucket was deleted meanwhile.
    pub fn publish(&self, key: &str, new: NewObject) -> Result<S3Object, S3ServiceError> {
        let status = self.versioning.read();
        let mut store = self.objects.write();
        self.ensure_live()?;

        let version_id = self.next_version_id(*status);
        let size = new.blob.size();
        let displaced = store.displaced(key, &version_id);
        let current = store.usage();
        self.limits.check(
            &self.name,
            StoreUsage {
                objects: current.objects - displaced.objects + 1,
                bytes: current.bytes - displaced.bytes + size,
            },
        )?;

        let object = S3Object {
            key: key.to_owned(),
            version_id,
            etag: new.blob.etag().to_owned(),
            size,
            content_type: new.content_type,
            last_modified: Utc::now(),
            parts_count: new.parts_count,
            blob: new.blob,
        };
        store.put(object.clone());
        Ok(object)
    }

    /// The current object, or a specific version.
    ///
    /// # Errors
    ///
    /// - [`S3ServiceError::NoSuchKey`] if absent or hidden by a delete marker.
    /// - [`S3ServiceError::NoSuchVersion`] for an unknown version id.
    /// - [`S3ServiceError::MethodNotAllowed`] if the version is a delete marker.
    pub fn get_object(&self, key: &str, version_id: Option<&str>) -> Result<S3Object, S3ServiceError> {
        let store = self.objects.read();
        match version_id {
            None => store.get(key).cloned().ok_or_else(|| Self::no_such_key(key)),
            Some(vid) => {
                if store.is_delete_marker(key, vid) {
                    return Err(S3ServiceError::MethodNotAllowed);
                }
                store
                    .get_version(key, vid)
                    .cloned()
                    .ok_or_else(|| S3ServiceError::NoSuchVersion {
                        key: key.to_owned(),
                        version_id: vid.to_owned(),
                    })
            }
        }
    }

    /// Whether `key` currently resolves to an object.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.objects.read().get(key).is_some()
    }

    /// Delete `key`, or one version of it.
    ///
    /// Without a version id: an unversioned bucket drops the object (absent
    /// keys are not an error); a versioned bucket records a delete marker.
    ///
    /// # Errors
    ///
    /// [`S3ServiceError::NoSuchVersion`] if `version_id` does not exist.
    pub fn delete_object(
        &self,
        key: &str,
        version_id: Option<&str>,
    ) -> Result<DeleteOutcome, S3ServiceError> {
        let status = self.versioning.read();
        let mut store = self.objects.write();

        if let Some(vid) = version_id {
            let removed = store
                .delete_version(key, vid)
                .ok_or_else(|| S3ServiceError::NoSuchVersion {
                    key: key.to_owned(),
                    version_id: vid.to_owned(),
                })?;
            return Ok(DeleteOutcome {
                version_id: Some(vid.to_owned()),
                delete_marker: removed.is_delete_marker(),
            });
        }

        if *status == VersioningStatus::Unversioned {
            store.remove(key);
            return Ok(DeleteOutcome::default());
        }

        let marker_id = self.next_version_id(*status);
        store.put_delete_marker(S3DeleteMarker {
            key: key.to_owned(),
            version_id: marker_id.clone(),
            last_modified: Utc::now(),
        });
        Ok(DeleteOutcome {
            version_id: Some(marker_id),
            delete_marker: true,
        })
    }

    /// Current objects under `prefix`, strictly after `after`.
    #[must_use]
    pub fn list_objects(&self, prefix: &str, after: Option<&str>, max_keys: usize) -> ListResult {
        self.objects.read().list_objects(prefix, after, max_keys)
    }

    /// Stored object count and bytes.
    #[must_use]
    pub fn usage(&self) -> StoreUsage {
        self.objects.read().usage()
    }

    /// Open uploads, ordered by key then initiation time.
    #[must_use]
    pub fn open_uploads(&self) -> Vec<Arc<MultipartUpload>> {
        let mut uploads: Vec<Arc<MultipartUpload>> = self
            .uploads
            .iter()
            .filter(|u| u.is_open())
            .map(|u| Arc::clone(u.value()))
            .collect();
        uploads.sort_by(|a, b| a.key.cmp(&b.key).then(a.initiated.cmp(&b.initiated)));
        uploads
    }

    /// Register a new upload.
    ///
    /// # Errors
    ///
    /// [`S3ServiceError::NoSuchBucket`] if the bucket was deleted meanwhile.
    pub fn add_upload(&self, upload: Arc<MultipartUpload>) -> Result<(), S3ServiceError> {
        let _objects = self.objects.read();
        self.ensure_live()?;
        self.uploads.insert(upload.upload_id.clone(), upload);
        Ok(())
    }
}
