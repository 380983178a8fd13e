//! Bucket policy integration tests.

#[cfg(test)]
mod tests {
    use aws_sdk_s3::primitives::ByteStream;

    use crate::{authorization, cleanup_bucket, create_test_bucket, endpoint_url, s3_client};

    fn public_read(bucket: &str) -> String {
        serde_json::json!({
            "Version": "2012-10-17",
            "Statement": [
                {
                    "Sid": "PublicRead",
                    "Effect": "Allow",
                    "Principal": "*",
                    "Action": "s3:GetObject",
                    "Resource": format!("arn:aws:s3:::{bucket}/public/*"),
                },
                {
                    "Effect": "Deny",
                    "Principal": {"AWS": "mallory"},
                    "Action": "s3:*",
                    "Resource": format!("arn:aws:s3:::{bucket}/*"),
                }
            ]
        })
        .to_string()
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_gate_anonymous_reads_on_policy() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "policy").await;
        for key in ["public/cat.jpg", "private/plan.txt"] {
            client
                .put_object()
                .bucket(&bucket)
                .key(key)
                .body(ByteStream::from_static(b"data"))
                .send()
                .await
                .expect("put_object");
        }

        let http = reqwest::Client::new();
        let public_url = format!("{}/{bucket}/public/cat.jpg", endpoint_url());
        let private_url = format!("{}/{bucket}/private/plan.txt", endpoint_url());

        let before = http.get(&public_url).send().await.expect("anonymous get");
        assert_eq!(before.status(), reqwest::StatusCode::FORBIDDEN);

        client
            .put_bucket_policy()
            .bucket(&bucket)
            .policy(public_read(&bucket))
            .send()
            .await
            .expect("put_bucket_policy");

        let fetched = client
            .get_bucket_policy()
            .bucket(&bucket)
            .send()
            .await
            .expect("get_bucket_policy");
        assert!(fetched.policy().is_some_and(|p| p.contains("PublicRead")));

        let public = http.get(&public_url).send().await.expect("anonymous get");
        assert_eq!(public.status(), reqwest::StatusCode::OK);
        let private = http.get(&private_url).send().await.expect("anonymous get");
        assert_eq!(private.status(), reqwest::StatusCode::FORBIDDEN);

        let denied = http
            .get(&public_url)
            .header("Authorization", authorization("mallory"))
            .send()
            .await
            .expect("mallory get");
        assert_eq!(denied.status(), reqwest::StatusCode::FORBIDDEN);

        let write = http
            .put(format!("{}/{bucket}/public/new.jpg", endpoint_url()))
            .body("x")
            .send()
            .await
            .expect("anonymous put");
        assert_eq!(write.status(), reqwest::StatusCode::FORBIDDEN);

        client
            .delete_bucket_policy()
            .bucket(&bucket)
            .send()
            .await
            .expect("delete_bucket_policy");
        let after = http.get(&public_url).send().await.expect("anonymous get");
        assert_eq!(after.status(), reqwest::StatusCode::FORBIDDEN);

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_reject_malformed_policy() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "badpolicy").await;

        let err = client
            .put_bucket_policy()
            .bucket(&bucket)
            .policy("{not json")
            .send()
            .await
            .expect_err("malformed policy should be rejected");
        assert_eq!(err.into_service_error().meta().code(), Some("MalformedPolicy"));

        cleanup_bucket(&client, &bucket).await;
    }
}
