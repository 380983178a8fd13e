//! Versioning integration tests.

#[cfg(test)]
mod tests {
    use aws_sdk_s3::primitives::ByteStream;
    use aws_sdk_s3::types::{BucketVersioningStatus, VersioningConfiguration};

    use crate::{cleanup_bucket, create_test_bucket, s3_client};

    async fn enable_versioning(client: &aws_sdk_s3::Client, bucket: &str) {
        client
            .put_bucket_versioning()
            .bucket(bucket)
            .versioning_configuration(
                VersioningConfiguration::builder()
                    .status(BucketVersioningStatus::Enabled)
                    .build(),
            )
            .send()
            .await
            .expect("enable versioning");
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_enable_and_check_versioning() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "ver").await;

        let before = client
            .get_bucket_versioning()
            .bucket(&bucket)
            .send()
            .await
            .expect("get versioning");
        assert_eq!(before.status(), None);

        enable_versioning(&client, &bucket).await;

        let after = client
            .get_bucket_versioning()
            .bucket(&bucket)
            .send()
            .await
            .expect("get versioning");
        assert_eq!(after.status(), Some(&BucketVersioningStatus::Enabled));

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_keep_old_versions_readable() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "verput").await;
        enable_versioning(&client, &bucket).await;

        let v1 = client
            .put_object()
            .bucket(&bucket)
            .key("versioned.txt")
            .body(ByteStream::from_static(b"v1"))
            .send()
            .await
            .expect("put v1");
        let v1_id = v1.version_id().expect("v1 version id").to_owned();

        let v2 = client
            .put_object()
            .bucket(&bucket)
            .key("versioned.txt")
            .body(ByteStream::from_static(b"v2"))
            .send()
            .await
            .expect("put v2");
        assert_ne!(v2.version_id(), Some(v1_id.as_str()));

        let old = client
            .get_object()
            .bucket(&bucket)
            .key("versioned.txt")
            .version_id(&v1_id)
            .send()
            .await
            .expect("get v1");
        let body = old.body.collect().await.expect("read body").into_bytes();
        assert_eq!(body.as_ref(), b"v1");

        let deleted = client
            .delete_object()
            .bucket(&bucket)
            .key("versioned.txt")
            .send()
            .await
            .expect("delete");
        assert_eq!(deleted.delete_marker(), Some(true));

        let latest = client
            .get_object()
            .bucket(&bucket)
            .key("versioned.txt")
            .send()
            .await;
        assert!(latest.is_err(), "latest version is a delete marker");

        cleanup_bucket(&client, &bucket).await;
    }
}
