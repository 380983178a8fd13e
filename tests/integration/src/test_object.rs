//! Object and listing integration tests.

#[cfg(test)]
mod tests {
    use aws_sdk_s3::primitives::ByteStream;

    use crate::{cleanup_bucket, create_test_bucket, s3_client};

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_put_get_head_and_delete_object() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "obj").await;

        let put = client
            .put_object()
            .bucket(&bucket)
            .key("docs/readme.txt")
            .body(ByteStream::from_static(b"hello s3lite"))
            .send()
            .await
            .expect("put_object");
        assert!(put.e_tag().is_some());

        let get = client
            .get_object()
            .bucket(&bucket)
            .key("docs/readme.txt")
            .send()
            .await
            .expect("get_object");
        assert_eq!(get.content_type(), Some("text/plain"));
        assert_eq!(get.e_tag(), put.e_tag());
        let body = get.body.collect().await.expect("read body").into_bytes();
        assert_eq!(body.as_ref(), b"hello s3lite");

        let head = client
            .head_object()
            .bucket(&bucket)
            .key("docs/readme.txt")
            .send()
            .await
            .expect("head_object");
        assert_eq!(head.content_length(), Some(12));

        client
            .delete_object()
            .bucket(&bucket)
            .key("docs/readme.txt")
            .send()
            .await
            .expect("delete_object");

        let err = client
            .get_object()
            .bucket(&bucket)
            .key("docs/readme.txt")
            .send()
            .await
            .expect_err("deleted object should be gone");
        assert!(err.into_service_error().is_no_such_key());

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_keep_explicit_content_type() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "ctype").await;

        client
            .put_object()
            .bucket(&bucket)
            .key("data.bin")
            .content_type("application/x-custom")
            .body(ByteStream::from_static(b"\x00\x01"))
            .send()
            .await
            .expect("put_object");

        let head = client
            .head_object()
            .bucket(&bucket)
            .key("data.bin")
            .send()
            .await
            .expect("head_object");
        assert_eq!(head.content_type(), Some("application/x-custom"));

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_page_listing_in_key_order() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "list").await;

        for key in ["b/2", "a/1", "b/1", "c"] {
            client
                .put_object()
                .bucket(&bucket)
                .key(key)
                .body(ByteStream::from_static(b"x"))
                .send()
                .await
                .expect("put_object");
        }

        let first = client
            .list_objects_v2()
            .bucket(&bucket)
            .max_keys(2)
            .send()
            .await
            .expect("first page");
        let keys: Vec<_> = first.contents().iter().filter_map(|o| o.key()).collect();
        assert_eq!(keys, ["a/1", "b/1"]);
        assert_eq!(first.is_truncated(), Some(true));

        let second = client
            .list_objects_v2()
            .bucket(&bucket)
            .max_keys(2)
            .continuation_token(first.next_continuation_token().expect("token"))
            .send()
            .await
            .expect("second page");
        let keys: Vec<_> = second.contents().iter().filter_map(|o| o.key()).collect();
        assert_eq!(keys, ["b/2", "c"]);
        assert_eq!(second.is_truncated(), Some(false));

        let prefixed = client
            .list_objects_v2()
            .bucket(&bucket)
            .prefix("b/")
            .send()
            .await
            .expect("prefix listing");
        assert_eq!(prefixed.key_count(), Some(2));

        cleanup_bucket(&client, &bucket).await;
    }
}
