//! Presigned URL and health check integration tests.

#[cfg(test)]
mod tests {
    use aws_sdk_s3::primitives::ByteStream;

    use crate::{ACCESS_KEY, authorization, cleanup_bucket, create_test_bucket, endpoint_url, s3_client};

    /// Text of the first `<name>` element.
    fn tag(xml: &str, name: &str) -> Option<String> {
        let open = format!("<{name}>");
        let close = format!("</{name}>");
        let start = xml.find(&open)? + open.len();
        let end = xml[start..].find(&close)? + start;
        Some(xml[start..end].replace("&amp;", "&"))
    }

    async fn mint(http: &reqwest::Client, bucket: &str, key: &str, query: &str) -> String {
        let response = http
            .get(format!("{}/{bucket}/{key}?presign&{query}", endpoint_url()))
            .header("Authorization", authorization(ACCESS_KEY))
            .send()
            .await
            .expect("presign request");
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body = response.text().await.expect("presign body");
        tag(&body, "Url").unwrap_or_else(|| panic!("no Url in {body}"))
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_serve_presigned_get_to_anonymous_caller() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "presign").await;
        client
            .put_object()
            .bucket(&bucket)
            .key("report.pdf")
            .body(ByteStream::from_static(b"%PDF"))
            .send()
            .await
            .expect("put_object");

        let http = reqwest::Client::new();
        let url = mint(&http, &bucket, "report.pdf", "expires=300").await;

        let fetched = http.get(&url).send().await.expect("presigned get");
        assert_eq!(fetched.status(), reqwest::StatusCode::OK);
        assert_eq!(
            fetched.headers().get("content-type").and_then(|v| v.to_str().ok()),
            Some("application/pdf")
        );
        assert_eq!(fetched.bytes().await.expect("body").as_ref(), b"%PDF");

        let tampered = url.replace("report.pdf", "other.pdf");
        let forged = http.get(&tampered).send().await.expect("forged get");
        assert_eq!(forged.status(), reqwest::StatusCode::FORBIDDEN);

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_serve_presigned_put() {
        let client = s3_client();
        let bucket = create_test_bucket(&client, "presignput").await;

        let http = reqwest::Client::new();
        let url = mint(&http, &bucket, "upload.txt", "method=PUT").await;

        let put = http.put(&url).body("from a browser").send().await.expect("presigned put");
        assert_eq!(put.status(), reqwest::StatusCode::OK);

        let get = client
            .get_object()
            .bucket(&bucket)
            .key("upload.txt")
            .send()
            .await
            .expect("get_object");
        let body = get.body.collect().await.expect("read body").into_bytes();
        assert_eq!(body.as_ref(), b"from a browser");

        cleanup_bucket(&client, &bucket).await;
    }

    #[tokio::test]
    #[ignore = "requires running server"]
    async fn test_should_report_health() {
        let response = reqwest::get(format!("{}/health", endpoint_url()))
            .await
            .expect("health request");
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let json: serde_json::Value = response.json().await.expect("health json");
        assert_eq!(json["status"], "running");
        assert_eq!(json["service"], "s3lite");
    }
}
