//! Object operations.
//!
//! Implements `put_object`, `get_object`, `head_object`, `object_exists` and
//! `delete_object`.

use bytes::Bytes;
use tracing::debug;

use crate::content_type;
use crate::error::S3ServiceError;
use crate::provider::ObjectGateway;
use crate::state::{DeleteOutcome, NewObject, ObjectInfo};
use crate::validation::validate_object_key;

/// Result of a successful put.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutObjectOutput {
    /// Quoted MD5 of the stored content.
    pub etag: String,
    /// Version id, when the bucket has been versioned.
    pub version_id: Option<String>,
}

/// An object's metadata and content.
#[derive(Debug, Clone)]
pub struct GetObjectOutput {
    /// Object metadata.
    pub info: ObjectInfo,
    /// Full object content.
    pub body: Bytes,
}

impl ObjectGateway {
    /// Store `body` under `key`.
    ///
    /// `declared_len` is the length the caller announced; a mismatch with the
    /// bytes actually received rejects the write before anything is stored.
    ///
    /// # Errors
    ///
    /// - [`S3ServiceError::InvalidArgument`] on a length mismatch or a bad
    ///   content type.
    /// - [`S3ServiceError::QuotaExceeded`] if the bucket limit would be passed.
    pub async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        declared_len: Option<u64>,
        content_type: Option<&str>,
    ) -> Result<PutObjectOutput, S3ServiceError> {
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
        validate_object_key(key)?;
        let target = self.bucket(bucket)?;
        let content_type = content_type::resolve(content_type, key)?;

        let blob = self.storage.store(body).await?;
        let object = target.publish(
            key,
            NewObject {
                blob,
                content_type,
                parts_count: None,
            },
        )?;

        debug!(
            bucket = %bucket,
            key = %key,
            size = object.size,
            etag = %object.etag,
            version_id = %object.version_id,
            "put_object completed"
        );

        Ok(PutObjectOutput {
            etag: object.etag,
            version_id: target.is_versioned().then_some(object.version_id),
        })
    }

    /// Fetch an object, or one version of it.
    ///
    /// # Errors
    ///
    /// - [`S3ServiceError::NoSuchKey`] if the key is absent.
    /// - [`S3ServiceError::NoSuchVersion`] for an unknown version id.
    pub async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> Result<GetObjectOutput, S3ServiceError> {
        let target = self.bucket(bucket)?;
        let object = target.get_object(key, version_id)?;
        let info = ObjectInfo::from_object(&object, target.is_versioned());
        // The blob stays alive through our Arc even if the key is replaced.
        let body = object.blob.read_all().await?;
        debug!(bucket = %bucket, key = %key, size = info.size, "get_object completed");
        Ok(GetObjectOutput { info, body })
    }

    /// Object metadata without the content.
    pub fn head_object(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> Result<ObjectInfo, S3ServiceError> {
        let target = self.bucket(bucket)?;
        let object = target.get_object(key, version_id)?;
        Ok(ObjectInfo::from_object(&object, target.is_versioned()))
    }

    /// Whether `key` currently resolves to an object.
    ///
    /// # Errors
    ///
    /// [`S3ServiceError::NoSuchBucket`] if the bucket does not exist.
    pub fn object_exists(&self, bucket: &str, key: &str) -> Result<bool, S3ServiceError> {
        Ok(self.bucket(bucket)?.contains(key))
    }

    /// Delete `key`, or one version of it.
    ///
    /// Deleting an absent key from an unversioned bucket succeeds.
    pub fn delete_object(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> Result<DeleteOutcome, S3ServiceError> {
        let target = self.bucket(bucket)?;
        let outcome = target.delete_object(key, version_id)?;
        debug!(
            bucket = %bucket,
            key = %key,
            version_id = ?outcome.version_id,
            delete_marker = outcome.delete_marker,
            "delete_object completed"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::checksums::compute_etag;
    use crate::config::GatewayConfig;
    use crate::state::{Principal, VersioningStatus};

    fn gateway(config: GatewayConfig) -> ObjectGateway {
        let gateway = ObjectGateway::new(config);
        gateway
            .create_bucket("data", &Principal::AccessKey("owner".to_owned()))
            .unwrap_or_else(|e| panic!("create failed: {e}"));
        gateway
    }

    #[tokio::test]
    async fn test_should_round_trip_object() {
        let gateway = gateway(GatewayConfig::default());
        let body = Bytes::from_static(b"hello world");
        let put = gateway
            .put_object("data", "docs/readme.txt", body.clone(), Some(11), None)
            .await
            .unwrap_or_else(|e| panic!("put failed: {e}"));
        assert_eq!(put.etag, compute_etag(&body));
        assert!(put.version_id.is_none());

        let got = gateway
            .get_object("data", "docs/readme.txt", None)
            .await
            .unwrap_or_else(|e| panic!("get failed: {e}"));
        assert_eq!(got.body, body);
        assert_eq!(got.info.content_type, "text/plain");
        assert_eq!(got.info.etag, put.etag);
        assert!(gateway.object_exists("data", "docs/readme.txt").unwrap_or(false));
    }

    #[tokio::test]
    async fn test_should_round_trip_spilled_object() {
        let gateway = gateway(GatewayConfig::builder().max_memory_object_size(4).build());
        let body = Bytes::from(vec![7u8; 4096]);
        gateway
            .put_object("data", "blob.bin", body.clone(), None, None)
            .await
            .unwrap_or_else(|e| panic!("put failed: {e}"));
        let got = gateway
            .get_object("data", "blob.bin", None)
            .await
            .unwrap_or_else(|e| panic!("get failed: {e}"));
        assert_eq!(got.body, body);
    }

    #[tokio::test]
    async fn test_should_reject_length_mismatch() {
        let gateway = gateway(GatewayConfig::default());
        let err = gateway
            .put_object("data", "k", Bytes::from_static(b"abc"), Some(10), None)
            .await;
        assert!(matches!(err, Err(S3ServiceError::InvalidArgument { .. })));
        assert!(!gateway.object_exists("data", "k").unwrap_or(true));
    }

    #[tokio::test]
    async fn test_should_keep_supplied_content_type() {
        let gateway = gateway(GatewayConfig::default());
        gateway
            .put_object(
                "data",
                "report.txt",
                Bytes::from_static(b"{}"),
                None,
                Some("application/json"),
            )
            .await
            .unwrap_or_else(|e| panic!("put failed: {e}"));
        let head = gateway
            .head_object("data", "report.txt", None)
            .unwrap_or_else(|e| panic!("head failed: {e}"));
        assert_eq!(head.content_type, "application/json");
        assert_eq!(head.size, 2);
    }

    #[tokio::test]
    async fn test_should_report_missing_key_and_bucket() {
        let gateway = gateway(GatewayConfig::default());
        assert!(matches!(
            gateway.get_object("data", "nope", None).await,
            Err(S3ServiceError::NoSuchKey { .. })
        ));
        assert!(matches!(
            gateway.get_object("other", "nope", None).await,
            Err(S3ServiceError::NoSuchBucket { .. })
        ));
        assert!(matches!(
            gateway.put_object("data", "", Bytes::new(), None, None).await,
            Err(S3ServiceError::InvalidArgument { .. })
        ));
    }

    #[tokio::test]
    async fn test_should_keep_versions_when_enabled() {
        let gateway = gateway(GatewayConfig::default());
        gateway
            .put_bucket_versioning("data", VersioningStatus::Enabled)
            .unwrap_or_else(|e| panic!("{e}"));
        let v1 = gateway
            .put_object("data", "k", Bytes::from_static(b"one"), None, None)
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        gateway
            .put_object("data", "k", Bytes::from_static(b"two"), None, None)
            .await
            .unwrap_or_else(|e| panic!("{e}"));

        let v1_id = v1.version_id.unwrap_or_else(|| panic!("missing version id"));
        let old = gateway
            .get_object("data", "k", Some(&v1_id))
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(old.body.as_ref(), b"one");

        let outcome = gateway
            .delete_object("data", "k", None)
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(outcome.delete_marker);
        assert!(!gateway.object_exists("data", "k").unwrap_or(true));
        assert!(gateway.get_object("data", "k", Some(&v1_id)).await.is_ok());
    }

    #[tokio::test]
    async fn test_should_never_observe_partial_object() {
        let gateway = gateway(GatewayConfig::default());
        let a = Bytes::from(vec![b'a'; 64 * 1024]);
        let b = Bytes::from(vec![b'b'; 64 * 1024]);
        gateway
            .put_object("data", "hot", a.clone(), None, None)
            .await
            .unwrap_or_else(|e| panic!("{e}"));

        let gateway = Arc::new(gateway);
        let writer = {
            let gateway = Arc::clone(&gateway);
            let (a, b) = (a.clone(), b.clone());
            tokio::spawn(async move {
                for i in 0..50 {
                    let body = if i % 2 == 0 { b.clone() } else { a.clone() };
                    gateway
                        .put_object("data", "hot", body, None, None)
                        .await
                        .unwrap_or_else(|e| panic!("{e}"));
                }
            })
        };
        for _ in 0..50 {
            let got = gateway
                .get_object("data", "hot", None)
                .await
                .unwrap_or_else(|e| panic!("{e}"));
            assert!(got.body == a || got.body == b, "observed a torn object");
            assert_eq!(got.info.etag, compute_etag(&got.body));
        }
        writer.await.unwrap_or_else(|e| panic!("{e}"));
    }

    #[tokio::test]
    async fn test_should_enforce_quota_from_config() {
        let gateway = gateway(GatewayConfig::builder().bucket_max_objects(1).build());
        gateway
            .put_object("data", "a", Bytes::from_static(b"1"), None, None)
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(matches!(
            gateway
                .put_object("data", "b", Bytes::from_static(b"2"), None, None)
                .await,
            Err(S3ServiceError::QuotaExceeded { .. })
        ));
    }
}
