//! Bucket lifecycle integration tests.

#[cfg(test)]
mod tests {
    use aws_sdk_s3::primitives::ByteStream;

    use crate::{cleanup_bucket, create_test_bucket, s3_client, test_bucket_name};

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_create_head_and_list_bucket() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "create").await;

        client
            .head_bucket()
            .bucket(&bucket)
            .send()
            .await
            .expect("head_bucket");

        let listed = client.list_buckets().send().await.expect("list_buckets");
        assert!(
            listed.buckets().iter().any(|b| b.name() == Some(bucket.as_str())),
            "created bucket should be listed"
        );

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_reject_duplicate_bucket() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "dup").await;

        let err = client
            .create_bucket()
            .bucket(&bucket)
            .send()
            .await
            .expect_err("second create should fail");
        assert_eq!(err.into_service_error().meta().code(), Some("BucketAlreadyExists"));

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_reject_invalid_bucket_name() {
        let client = s3_client();
        let result = client.create_bucket().bucket("Invalid_Name").send().await;
        assert!(result.is_err(), "invalid bucket name should be rejected");
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_refuse_to_delete_non_empty_bucket() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "nonempty").await;
        client
            .put_object()
            .bucket(&bucket)
            .key("keep.txt")
            .body(ByteStream::from_static(b"data"))
            .send()
            .await
            .expect("put_object");

        let err = client
            .delete_bucket()
            .bucket(&bucket)
            .send()
            .await
            .expect_err("delete of non-empty bucket should fail");
        assert_eq!(err.into_service_error().meta().code(), Some("BucketNotEmpty"));

        cleanup_bucket(&client, &bucket).await;
        let gone = client.head_bucket().bucket(&bucket).send().await;
        assert!(gone.is_err(), "bucket should be gone after cleanup");
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_report_missing_bucket() {
        let client = s3_client();
        let err = client
            .list_objects_v2()
            .bucket(test_bucket_name("ghost"))
            .send()
            .await
            .expect_err("listing a missing bucket should fail");
        assert_eq!(err.into_service_error().meta().code(), Some("NoSuchBucket"));
    }
}
