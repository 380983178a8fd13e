//! Multipart upload integration tests.
//!
//! Non-final parts must meet the server's minimum part size (5 MiB by
//! default).

#[cfg(test)]
mod tests {
    use aws_sdk_s3::primitives::ByteStream;
    use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};

    use crate::{cleanup_bucket, create_test_bucket, s3_client};

    const PART_SIZE: usize = 5 * 1024 * 1024;

    async fn upload_part(
        client: &aws_sdk_s3::Client,
        bucket: &str,
        upload_id: &str,
        number: i32,
        data: Vec<u8>,
    ) -> CompletedPart {
        let output = client
            .upload_part()
            .bucket(bucket)
            .key("multipart.bin")
            .upload_id(upload_id)
            .part_number(number)
            .body(ByteStream::from(data))
            .send()
            .await
            .unwrap_or_else(|e| panic!("upload part {number}: {e}"));
        CompletedPart::builder()
            .part_number(number)
            .e_tag(output.e_tag().unwrap_or_default())
            .build()
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_complete_multipart_upload() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "mpu").await;

        let create = client
            .create_multipart_upload()
            .bucket(&bucket)
            .key("multipart.bin")
            .send()
            .await
            .expect("create_multipart_upload");
        let upload_id = create.upload_id().expect("upload_id");

        let part1 = upload_part(&client, &bucket, upload_id, 1, vec![0xAA; PART_SIZE]).await;
        let part2 = upload_part(&client, &bucket, upload_id, 2, vec![0xBB; 1024]).await;

        let parts = client
            .list_parts()
            .bucket(&bucket)
            .key("multipart.bin")
            .upload_id(upload_id)
            .send()
            .await
            .expect("list_parts");
        assert_eq!(parts.parts().len(), 2);

        let complete = client
            .complete_multipart_upload()
            .bucket(&bucket)
            .key("multipart.bin")
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .parts(part1)
                    .parts(part2)
                    .build(),
            )
            .send()
            .await
            .expect("complete_multipart_upload");
        assert!(complete.e_tag().is_some_and(|etag| etag.ends_with("-2\"")));

        let head = client
            .head_object()
            .bucket(&bucket)
            .key("multipart.bin")
            .send()
            .await
            .expect("head_object");
        assert_eq!(head.content_length(), Some(i64::try_from(PART_SIZE + 1024).unwrap_or(0)));

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_reject_small_non_final_part() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "mpusmall").await;

        let create = client
            .create_multipart_upload()
            .bucket(&bucket)
            .key("multipart.bin")
            .send()
            .await
            .expect("create_multipart_upload");
        let upload_id = create.upload_id().expect("upload_id");

        let part1 = upload_part(&client, &bucket, upload_id, 1, vec![0xAA; 16]).await;
        let part2 = upload_part(&client, &bucket, upload_id, 2, vec![0xBB; 16]).await;

        let err = client
            .complete_multipart_upload()
            .bucket(&bucket)
            .key("multipart.bin")
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .parts(part1)
                    .parts(part2)
                    .build(),
            )
            .send()
            .await
            .expect_err("undersized part should be rejected");
        assert_eq!(err.into_service_error().meta().code(), Some("EntityTooSmall"));

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_abort_multipart_upload() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "mpuabort").await;

        let create = client
            .create_multipart_upload()
            .bucket(&bucket)
            .key("multipart.bin")
            .send()
            .await
            .expect("create_multipart_upload");
        let upload_id = create.upload_id().expect("upload_id");

        let listed = client
            .list_multipart_uploads()
            .bucket(&bucket)
            .send()
            .await
            .expect("list_multipart_uploads");
        assert!(listed.uploads().iter().any(|u| u.upload_id() == Some(upload_id)));

        client
            .abort_multipart_upload()
            .bucket(&bucket)
            .key("multipart.bin")
            .upload_id(upload_id)
            .send()
            .await
            .expect("abort_multipart_upload");

        let err = client
            .list_parts()
            .bucket(&bucket)
            .key("multipart.bin")
            .upload_id(upload_id)
            .send()
            .await
            .expect_err("aborted upload should be gone");
        assert_eq!(err.into_service_error().meta().code(), Some("NoSuchUpload"));

        cleanup_bucket(&client, &bucket).await;
    }
}
