//! The gateway client handle.
//!
//! [`ObjectGateway`] owns all gateway state (buckets, objects, multipart
//! uploads), the blob storage backend and the configuration. It is built
//! explicitly and passed to whoever needs it; cloning it is cheap and every
//! clone sees the same state.
//!
//! Operations are implemented in the [`crate::ops`] submodules.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::config::GatewayConfig;
use crate::error::S3ServiceError;
use crate::policy::{AccessDecision, Action, PolicyDecision, resource_arn};
use crate::retry::RetryPolicy;
use crate::state::{Principal, S3Bucket, S3ServiceState};
use crate::storage::BlobStorage;

/// Counts reported by [`ObjectGateway::check_connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    /// Buckets currently defined.
    pub buckets: usize,
    /// Multipart uploads still open.
    pub open_uploads: usize,
}

/// Handle to an object-storage gateway.
///
/// # Examples
///
/// ```
/// use s3lite_core::ObjectGateway;
/// use s3lite_core::config::GatewayConfig;
///
/// let gateway = ObjectGateway::new(GatewayConfig::default());
/// assert_eq!(gateway.check_connection().buckets, 0);
/// ```
#[derive(Debug, Clone)]
pub struct ObjectGateway {
    /// Bucket and object metadata state.
    pub(crate) state: Arc<S3ServiceState>,
    /// Content storage (in-memory with disk spillover).
    pub(crate) storage: Arc<BlobStorage>,
    /// Gateway configuration.
    pub(crate) config: Arc<GatewayConfig>,
}

impl ObjectGateway {
    /// Create a gateway with empty state.
    #[must_use]
    pub fn new(config: GatewayConfig) -> Self {
        let storage = BlobStorage::new(config.max_memory_object_size)
            .with_retry(RetryPolicy::from_config(&config));
        Self {
            state: Arc::new(S3ServiceState::new()),
            storage: Arc::new(storage),
            config: Arc::new(config),
        }
    }

    /// Returns a reference to the service state.
    #[must_use]
    pub fn state(&self) -> &S3ServiceState {
        &self.state
    }

    /// Returns a reference to the storage backend.
    #[must_use]
    pub fn storage(&self) -> &BlobStorage {
        &self.storage
    }

    /// Returns a reference to the configuration.
    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Liveness probe: bucket and open upload counts.
    #[must_use]
    pub fn check_connection(&self) -> ConnectionStatus {
        let buckets = self.state.all_buckets();
        let open_uploads = buckets
            .iter()
            .map(|b| b.uploads.iter().filter(|u| u.is_open()).count())
            .sum();
        ConnectionStatus {
            buckets: buckets.len(),
            open_uploads,
        }
    }

    pub(crate) fn bucket(&self, name: &str) -> Result<Arc<S3Bucket>, S3ServiceError> {
        self.state.get_bucket(name)
    }

    /// Decide whether `principal` may perform `action` on `resource` in
    /// `bucket`.
    ///
    /// The bucket owner is allowed unless a statement explicitly denies them.
    /// Anyone else needs a matching `Allow` and no matching `Deny`. The policy
    /// snapshot is read once.
    ///
    /// # Errors
    ///
    /// [`S3ServiceError::NoSuchBucket`] if the bucket does not exist.
    pub fn authorize(
        &self,
        bucket: &str,
        principal: &Principal,
        action: Action,
        resource: &str,
    ) -> Result<AccessDecision, S3ServiceError> {
        let bucket = self.bucket(bucket)?;
        let policy = bucket.policy();
        let decision = policy.as_deref().map_or(PolicyDecision::ImplicitDeny, |p| {
            p.evaluate(principal, action, resource)
        });
        let outcome = match decision {
            PolicyDecision::ExplicitDeny => AccessDecision::Deny,
            PolicyDecision::Allow => AccessDecision::Allow,
            PolicyDecision::ImplicitDeny
                if principal.access_key().is_some() && bucket.owner == *principal =>
            {
                AccessDecision::Allow
            }
            PolicyDecision::ImplicitDeny => AccessDecision::Deny,
        };
        debug!(
            bucket = %bucket.name,
            principal = %principal,
            action = %action,
            resource,
            decision = ?decision,
            allowed = outcome == AccessDecision::Allow,
            "authorization evaluated"
        );
        Ok(outcome)
    }

    /// [`authorize`](Self::authorize) for a bucket or object, failing with
    /// [`S3ServiceError::AccessDenied`] on deny.
    pub fn require(
        &self,
        bucket: &str,
        key: Option<&str>,
        principal: &Principal,
        action: Action,
    ) -> Result<(), S3ServiceError> {
        let resource = resource_arn(bucket, key);
        match self.authorize(bucket, principal, action, &resource)? {
            AccessDecision::Allow => Ok(()),
            AccessDecision::Deny => Err(S3ServiceError::AccessDenied),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicyDocument;
    use crate::state::BucketLimits;

    fn alice() -> Principal {
        Principal::AccessKey("alice".to_owned())
    }

    fn gateway_with_bucket() -> ObjectGateway {
        let gateway = ObjectGateway::new(GatewayConfig::default());
        gateway
            .create_bucket("photos", &alice())
            .unwrap_or_else(|e| panic!("create failed: {e}"));
        gateway
    }

    #[test]
    fn test_should_allow_owner_without_policy() {
        let gateway = gateway_with_bucket();
        assert!(gateway
            .require("photos", Some("a.jpg"), &alice(), Action::PutObject)
            .is_ok());
        assert!(matches!(
            gateway.require("photos", Some("a.jpg"), &Principal::Anonymous, Action::GetObject),
            Err(S3ServiceError::AccessDenied)
        ));
    }

    #[test]
    fn test_should_not_treat_anonymous_callers_as_owner() {
        let gateway = ObjectGateway::new(GatewayConfig::default());
        gateway
            .state
            .create_bucket("legacy", &Principal::Anonymous, BucketLimits::default())
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(matches!(
            gateway.require("legacy", Some("a.jpg"), &Principal::Anonymous, Action::PutObject),
            Err(S3ServiceError::AccessDenied)
        ));
    }

    #[test]
    fn test_should_deny_owner_on_explicit_deny() {
        let gateway = gateway_with_bucket();
        let policy = PolicyDocument::parse(
            r#"{"Statement": [{"Effect": "Deny", "Principal": {"AWS": "alice"},
                "Action": "s3:DeleteObject", "Resource": "arn:aws:s3:::photos/*"}]}"#,
        )
        .unwrap_or_else(|e| panic!("{e}"));
        gateway
            .bucket("photos")
            .unwrap_or_else(|e| panic!("{e}"))
            .set_policy(policy);

        assert_eq!(
            gateway
                .authorize("photos", &alice(), Action::DeleteObject, "arn:aws:s3:::photos/x")
                .ok(),
            Some(AccessDecision::Deny)
        );
        assert_eq!(
            gateway
                .authorize("photos", &alice(), Action::GetObject, "arn:aws:s3:::photos/x")
                .ok(),
            Some(AccessDecision::Allow)
        );
    }

    #[test]
    fn test_should_share_state_between_clones() {
        let gateway = gateway_with_bucket();
        let clone = gateway.clone();
        assert!(clone.state().bucket_exists("photos"));
        assert_eq!(clone.check_connection().buckets, 1);
    }

    #[test]
    fn test_should_fail_authorization_for_missing_bucket() {
        let gateway = ObjectGateway::new(GatewayConfig::default());
        assert!(matches!(
            gateway.authorize("nope", &alice(), Action::ListBucket, "arn:aws:s3:::nope"),
            Err(S3ServiceError::NoSuchBucket { .. })
        ));
    }
}
