//! Bucket operations: create, head, delete, list.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::S3ServiceError;
use crate::provider::ObjectGateway;
use crate::state::{BucketLimits, Principal, S3Bucket, VersioningStatus};
use crate::validation::validate_bucket_name;

/// Bucket metadata returned to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketSummary {
    /// Bucket name.
    pub name: String,
    /// Creation time.
    pub creation_date: DateTime<Utc>,
    /// Owner.
    pub owner: Principal,
    /// Versioning status.
    pub versioning: VersioningStatus,
}

impl From<&S3Bucket> for BucketSummary {
    fn from(bucket: &S3Bucket) -> Self {
        Self {
            name: bucket.name.clone(),
            creation_date: bucket.creation_date,
            owner: bucket.owner.clone(),
            versioning: bucket.versioning(),
        }
    }
}

impl ObjectGateway {
    /// Create a bucket owned by `principal`.
    ///
    /// Creating a bucket the caller already owns returns the existing bucket.
    ///
    /// # Errors
    ///
    /// - [`S3ServiceError::AccessDenied`] for an anonymous caller; a bucket
    ///   needs an identifiable owner.
    /// - [`S3ServiceError::InvalidBucketName`] for a name that is not DNS-safe.
    /// - [`S3ServiceError::BucketAlreadyExists`] if someone else owns it.
    pub fn create_bucket(
        &self,
        name: &str,
        principal: &Principal,
    ) -> Result<BucketSummary, S3ServiceError> {
        if principal.access_key().is_none() {
            debug!(bucket = %name, "anonymous create_bucket refused");
            return Err(S3ServiceError::AccessDenied);
        }
        validate_bucket_name(name)?;
        let (bucket, _created) = self.state.create_bucket(
            name,
            principal,
            BucketLimits::from_config(&self.config),
        )?;
        Ok(BucketSummary::from(bucket.as_ref()))
    }

    /// Metadata for an existing bucket.
    pub fn head_bucket(&self, name: &str) -> Result<BucketSummary, S3ServiceError> {
        let bucket = self.bucket(name)?;
        Ok(BucketSummary::from(bucket.as_ref()))
    }

    /// Delete an empty bucket.
    ///
    /// # Errors
    ///
    /// [`S3ServiceError::BucketNotEmpty`] while any object or open upload
    /// remains.
    pub fn delete_bucket(&self, name: &str) -> Result<(), S3ServiceError> {
        self.state.delete_bucket(name)?;
        debug!(bucket = %name, "delete_bucket completed");
        Ok(())
    }

    /// Buckets owned by `principal`, sorted by name.
    #[must_use]
    pub fn list_buckets(&self, principal: &Principal) -> Vec<BucketSummary> {
        self.state
            .list_buckets(principal)
            .iter()
            .map(|b| BucketSummary::from(b.as_ref()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::config::GatewayConfig;

    fn owner() -> Principal {
        Principal::AccessKey("owner".to_owned())
    }

    #[test]
    fn test_should_validate_bucket_name_on_create() {
        let gateway = ObjectGateway::new(GatewayConfig::default());
        assert!(matches!(
            gateway.create_bucket("Bad_Name", &owner()),
            Err(S3ServiceError::InvalidBucketName { .. })
        ));
    }

    #[test]
    fn test_should_refuse_anonymous_bucket_creation() {
        let gateway = ObjectGateway::new(GatewayConfig::default());
        assert!(matches!(
            gateway.create_bucket("open", &Principal::Anonymous),
            Err(S3ServiceError::AccessDenied)
        ));
        assert!(matches!(
            gateway.head_bucket("open"),
            Err(S3ServiceError::NoSuchBucket { .. })
        ));
    }

    #[test]
    fn test_should_head_and_list_buckets() {
        let gateway = ObjectGateway::new(GatewayConfig::default());
        gateway
            .create_bucket("b-two", &owner())
            .unwrap_or_else(|e| panic!("{e}"));
        gateway
            .create_bucket("b-one", &owner())
            .unwrap_or_else(|e| panic!("{e}"));

        let head = gateway.head_bucket("b-one").unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(head.owner, owner());
        assert_eq!(head.versioning, VersioningStatus::Unversioned);

        let names: Vec<String> = gateway
            .list_buckets(&owner())
            .into_iter()
            .map(|b| b.name)
            .collect();
        assert_eq!(names, ["b-one", "b-two"]);
        assert!(gateway.list_buckets(&Principal::Anonymous).is_empty());
    }

    #[tokio::test]
    async fn test_should_refuse_to_delete_non_empty_bucket() {
        let gateway = ObjectGateway::new(GatewayConfig::default());
        gateway
            .create_bucket("full", &owner())
            .unwrap_or_else(|e| panic!("{e}"));
        gateway
            .put_object("full", "k", Bytes::from_static(b"x"), None, None)
            .await
            .unwrap_or_else(|e| panic!("{e}"));

        assert!(matches!(
            gateway.delete_bucket("full"),
            Err(S3ServiceError::BucketNotEmpty { .. })
        ));
        gateway
            .delete_object("full", "k", None)
            .unwrap_or_else(|e| panic!("{e}"));
        gateway
            .delete_bucket("full")
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(matches!(
            gateway.head_bucket("full"),
            Err(S3ServiceError::NoSuchBucket { .. })
        ));
    }

    #[test]
    fn test_should_block_delete_while_upload_open() {
        let gateway = ObjectGateway::new(GatewayConfig::default());
        gateway
            .create_bucket("uploads", &owner())
            .unwrap_or_else(|e| panic!("{e}"));
        let upload_id = gateway
            .create_multipart_upload("uploads", "big", None, &owner())
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(matches!(
            gateway.delete_bucket("uploads"),
            Err(S3ServiceError::BucketNotEmpty { .. })
        ));
        gateway
            .abort_multipart_upload("uploads", "big", &upload_id)
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(gateway.delete_bucket("uploads").is_ok());
    }
}
