//! Top-level gateway state.
//!
//! [`S3ServiceState`] owns the bucket table. Bucket names are unique across
//! all callers; the table entry records the owner.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, info};

use crate::error::S3ServiceError;

use super::bucket::{BucketLimits, S3Bucket};
use super::object::Principal;

/// Top-level state holding all buckets.
pub struct S3ServiceState {
    buckets: DashMap<String, Arc<S3Bucket>>,
}

impl std::fmt::Debug for S3ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3ServiceState")
            .field("bucket_count", &self.buckets.len())
            .finish_non_exhaustive()
    }
}

impl Default for S3ServiceState {
    fn default() -> Self {
        Self::new()
    }
}

impl S3ServiceState {
    /// Create a new, empty service state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buckets: DashMap::new(),
        }
    }

    /// Create a bucket owned by `owner`.
    ///
    /// Returns the bucket and whether it was newly created. Repeating the call
    /// as the same owner returns the existing bucket.
    ///
    /// # Errors
    ///
    /// [`S3ServiceError::BucketAlreadyExists`] if another caller owns the name.
    pub fn create_bucket(
        &self,
        name: &str,
        owner: &Principal,
        limits: BucketLimits,
    ) -> Result<(Arc<S3Bucket>, bool), S3ServiceError> {
        match self.buckets.entry(name.to_owned()) {
            Entry::Occupied(mut existing) => {
                if existing.get().is_deleted() {
                    let bucket = Arc::new(S3Bucket::new(name.to_owned(), owner.clone(), limits));
                    existing.insert(Arc::clone(&bucket));
                    info!(bucket = %name, owner = %owner, "bucket recreated over retired entry");
                    return Ok((bucket, true));
                }
                if existing.get().owner == *owner {
                    debug!(bucket = %name, owner = %owner, "bucket already owned by caller");
                    Ok((Arc::clone(existing.get()), false))
                } else {
                    Err(S3ServiceError::BucketAlreadyExists {
                        bucket: name.to_owned(),
                    })
                }
            }
            Entry::Vacant(slot) => {
                let bucket = Arc::new(S3Bucket::new(name.to_owned(), owner.clone(), limits));
                slot.insert(Arc::clone(&bucket));
                info!(bucket = %name, owner = %owner, "bucket created");
                Ok((bucket, true))
            }
        }
    }

    /// Delete an empty bucket.
    ///
    /// # Errors
    ///
    /// - [`S3ServiceError::NoSuchBucket`] if the bucket does not exist.
    /// - [`S3ServiceError::BucketNotEmpty`] if it still holds objects or
    ///   active uploads.
    pub fn delete_bucket(&self, name: &str) -> Result<(), S3ServiceError> {
        let bucket = self.get_bucket(name)?;
        bucket.retire()?;
        self.remove_retired(name, &bucket);
        info!(bucket = %name, "bucket deleted");
        Ok(())
    }

    /// Drop the table entry for `name` only if it still holds `bucket`; a
    /// bucket created over the retired entry stays.
    fn remove_retired(&self, name: &str, bucket: &Arc<S3Bucket>) {
        self.buckets.remove_if(name, |_, current| Arc::ptr_eq(current, bucket));
    }

    /// Look up a bucket.
    ///
    /// # Errors
    ///
    /// Returns [`S3ServiceError::NoSuchBucket`] if the bucket does not exist.
    pub fn get_bucket(&self, name: &str) -> Result<Arc<S3Bucket>, S3ServiceError> {
        self.buckets
            .get(name)
            .map(|b| Arc::clone(b.value()))
            .ok_or_else(|| S3ServiceError::NoSuchBucket {
                bucket: name.to_owned(),
            })
    }

    /// Buckets owned by `owner`, sorted by name.
    #[must_use]
    pub fn list_buckets(&self, owner: &Principal) -> Vec<Arc<S3Bucket>> {
        let mut buckets: Vec<Arc<S3Bucket>> = self
            .buckets
            .iter()
            .filter(|b| b.owner == *owner)
            .map(|b| Arc::clone(b.value()))
            .collect();
        buckets.sort_by(|a, b| a.name.cmp(&b.name));
        buckets
    }

    /// Every bucket, in no particular order.
    #[must_use]
    pub fn all_buckets(&self) -> Vec<Arc<S3Bucket>> {
        self.buckets.iter().map(|b| Arc::clone(b.value())).collect()
    }

    /// Check whether a bucket exists.
    #[must_use]
    pub fn bucket_exists(&self, name: &str) -> bool {
        self.buckets.contains_key(name)
    }

    /// Number of buckets.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Principal {
        Principal::AccessKey("alice".to_owned())
    }

    fn bob() -> Principal {
        Principal::AccessKey("bob".to_owned())
    }

    #[test]
    fn test_should_create_bucket_idempotently_for_owner() {
        let state = S3ServiceState::new();
        let (_, created) = state
            .create_bucket("photos", &alice(), BucketLimits::default())
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(created);
        let (bucket, created) = state
            .create_bucket("photos", &alice(), BucketLimits::default())
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(!created);
        assert_eq!(bucket.owner, alice());
        assert_eq!(state.bucket_count(), 1);
    }

    #[test]
    fn test_should_reject_bucket_owned_by_someone_else() {
        let state = S3ServiceState::new();
        state
            .create_bucket("photos", &alice(), BucketLimits::default())
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(matches!(
            state.create_bucket("photos", &bob(), BucketLimits::default()),
            Err(S3ServiceError::BucketAlreadyExists { .. })
        ));
    }

    #[test]
    fn test_should_list_only_callers_buckets_sorted() {
        let state = S3ServiceState::new();
        for (name, owner) in [("zeta", alice()), ("alpha", alice()), ("mine", bob())] {
            state
                .create_bucket(name, &owner, BucketLimits::default())
                .unwrap_or_else(|e| panic!("{e}"));
        }
        let names: Vec<String> = state
            .list_buckets(&alice())
            .iter()
            .map(|b| b.name.clone())
            .collect();
        assert_eq!(names, ["alpha", "zeta"]);
    }

    #[test]
    fn test_should_recreate_bucket_retired_mid_delete() {
        let state = S3ServiceState::new();
        let (retired, _) = state
            .create_bucket("photos", &alice(), BucketLimits::default())
            .unwrap_or_else(|e| panic!("{e}"));
        retired.retire().unwrap_or_else(|e| panic!("{e}"));

        let (fresh, created) = state
            .create_bucket("photos", &alice(), BucketLimits::default())
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(created);
        assert!(!fresh.is_deleted());

        state.remove_retired("photos", &retired);
        let current = state.get_bucket("photos").unwrap_or_else(|e| panic!("{e}"));
        assert!(Arc::ptr_eq(&current, &fresh));
    }

    #[test]
    fn test_should_let_anyone_claim_retired_name() {
        let state = S3ServiceState::new();
        let (retired, _) = state
            .create_bucket("photos", &alice(), BucketLimits::default())
            .unwrap_or_else(|e| panic!("{e}"));
        retired.retire().unwrap_or_else(|e| panic!("{e}"));
        let (bucket, created) = state
            .create_bucket("photos", &bob(), BucketLimits::default())
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(created);
        assert_eq!(bucket.owner, bob());
    }

    #[test]
    fn test_should_delete_empty_bucket() {
        let state = S3ServiceState::new();
        state
            .create_bucket("temp", &alice(), BucketLimits::default())
            .unwrap_or_else(|e| panic!("{e}"));
        state.delete_bucket("temp").unwrap_or_else(|e| panic!("{e}"));
        assert!(!state.bucket_exists("temp"));
        assert!(matches!(
            state.delete_bucket("temp"),
            Err(S3ServiceError::NoSuchBucket { .. })
        ));
    }
}
