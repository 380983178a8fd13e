//! Bucket configuration: policy and versioning.

use std::sync::Arc;

use tracing::info;

use crate::error::S3ServiceError;
use crate::policy::PolicyDocument;
use crate::provider::ObjectGateway;
use crate::state::VersioningStatus;

impl ObjectGateway {
    /// Attach a policy, replacing any existing one.
    ///
    /// The document is parsed before anything changes. Requests authorized
    /// after this returns see the new policy.
    ///
    /// # Errors
    ///
    /// [`S3ServiceError::MalformedPolicy`] if `json` is not a valid policy.
    pub fn put_bucket_policy(&self, bucket: &str, json: &str) -> Result<(), S3ServiceError> {
        let target = self.bucket(bucket)?;
        let policy = PolicyDocument::parse(json)?;
        let statements = policy.statements.len();
        target.set_policy(policy);
        info!(bucket = %bucket, statements, "bucket policy updated");
        Ok(())
    }

    /// The attached policy.
    ///
    /// # Errors
    ///
    /// [`S3ServiceError::NoSuchBucketPolicy`] if none is attached.
    pub fn get_bucket_policy(&self, bucket: &str) -> Result<Arc<PolicyDocument>, S3ServiceError> {
        self.bucket(bucket)?
            .policy()
            .ok_or_else(|| S3ServiceError::NoSuchBucketPolicy {
                bucket: bucket.to_owned(),
            })
    }

    /// Detach the policy.
    ///
    /// # Errors
    ///
    /// [`S3ServiceError::NoSuchBucketPolicy`] if none is attached.
    pub fn delete_bucket_policy(&self, bucket: &str) -> Result<(), S3ServiceError> {
        if !self.bucket(bucket)?.delete_policy() {
            return Err(S3ServiceError::NoSuchBucketPolicy {
                bucket: bucket.to_owned(),
            });
        }
        info!(bucket = %bucket, "bucket policy deleted");
        Ok(())
    }

    /// Current versioning status.
    pub fn get_bucket_versioning(&self, bucket: &str) -> Result<VersioningStatus, S3ServiceError> {
        Ok(self.bucket(bucket)?.versioning())
    }

    /// Enable or suspend versioning.
    ///
    /// # Errors
    ///
    /// [`S3ServiceError::InvalidArgument`] for `Unversioned`: once enabled,
    /// versioning can only be suspended.
    pub fn put_bucket_versioning(
        &self,
        bucket: &str,
        status: VersioningStatus,
    ) -> Result<(), S3ServiceError> {
        if status == VersioningStatus::Unversioned {
            return Err(S3ServiceError::InvalidArgument {
                message: "Versioning status must be Enabled or Suspended".to_owned(),
            });
        }
        let target = self.bucket(bucket)?;
        target.set_versioning(status);
        info!(bucket = %bucket, status = ?target.versioning(), "bucket versioning updated");
        Ok(())
    }
}
