//! Request routing: virtual hosting and operation identification.
//!
//! [`S3Router`] maps a request to an [`S3Operation`] by looking at:
//!
//! - the HTTP method,
//! - whether a bucket is present (from the `Host` header or the first path
//!   segment),
//! - whether a key is present,
//! - the sub-resource query parameters (`?policy`, `?uploads`, ...).
//!
//! Bucket and key are percent-decoded. With virtual hosting enabled, a `Host`
//! of `photos.s3.localhost:9000` selects bucket `photos` and the whole path
//! becomes the key.

use http::Method;
use http::request::Parts;
use percent_encoding::percent_decode_str;
use s3lite_core::error::S3ServiceError;

use crate::operation::S3Operation;

/// Routing settings.
#[derive(Debug, Clone)]
pub struct S3Router {
    /// Base domain for virtual-hosted requests, e.g. `s3.localhost`.
    pub domain: String,
    /// Whether the bucket may come from the `Host` header.
    pub virtual_hosting: bool,
}

/// A request resolved to an operation.
#[derive(Debug, Clone)]
pub struct RoutingContext {
    /// Bucket name, if any.
    pub bucket: Option<String>,
    /// Object key, if any.
    pub key: Option<String>,
    /// The identified operation.
    pub operation: S3Operation,
    /// Whether the bucket came from the `Host` header.
    pub virtual_hosted: bool,
    /// Decoded query parameters in request order.
    pub query_params: Vec<(String, String)>,
}

impl RoutingContext {
    /// First value of a query parameter.
    #[must_use]
    pub fn query(&self, name: &str) -> Option<&str> {
        query_value(&self.query_params, name)
    }

    /// Whether a query parameter is present, with or without a value.
    #[must_use]
    pub fn has_query(&self, name: &str) -> bool {
        query_has_key(&self.query_params, name)
    }

    /// The bucket, or `MethodNotAllowed` for a service-level request.
    pub fn require_bucket(&self) -> Result<&str, S3ServiceError> {
        self.bucket.as_deref().ok_or(S3ServiceError::MethodNotAllowed)
    }

    /// The object key, or `MethodNotAllowed` for a bucket-level request.
    pub fn require_key(&self) -> Result<&str, S3ServiceError> {
        self.key.as_deref().ok_or(S3ServiceError::MethodNotAllowed)
    }
}

impl S3Router {
    /// Router for `domain`.
    #[must_use]
    pub fn new(domain: impl Into<String>, virtual_hosting: bool) -> Self {
        Self {
            domain: domain.into(),
            virtual_hosting,
        }
    }

    /// Resolve request parts to a routing context.
    ///
    /// # Errors
    ///
    /// - [`S3ServiceError::MethodNotAllowed`] when no operation matches the
    ///   method and resource.
    /// - [`S3ServiceError::InvalidArgument`] for a path or query that is not
    ///   valid percent-encoded UTF-8, or a part upload missing `partNumber`
    ///   or `uploadId`.
    pub fn resolve(&self, parts: &Parts) -> Result<RoutingContext, S3ServiceError> {
        let query_params = parse_query_params(parts.uri.query().unwrap_or(""))?;

        let virtual_bucket = if self.virtual_hosting {
            extract_virtual_host_bucket(&parts.headers, &self.domain)
        } else {
            None
        };

        let path = parts.uri.path();
        let virtual_hosted = virtual_bucket.is_some();
        let (bucket, key) = match virtual_bucket {
            Some(vhost_bucket) => {
                let raw_key = path.strip_prefix('/').unwrap_or(path);
                let key = if raw_key.is_empty() {
                    None
                } else {
                    Some(decode_uri_component(raw_key)?)
                };
                (Some(vhost_bucket), key)
            }
            None => parse_path(path)?,
        };

        let operation =
            identify_operation(&parts.method, bucket.is_some(), key.is_some(), &query_params)?;

        Ok(RoutingContext {
            bucket,
            key,
            operation,
            virtual_hosted,
            query_params,
        })
    }
}

/// Bucket from a virtual-hosted `Host` header.
fn extract_virtual_host_bucket(headers: &http::HeaderMap, domain: &str) -> Option<String> {
    let host = headers
        .get(http::header::HOST)
        .and_then(|v| v.to_str().ok())?;
    let host = host.split(':').next().unwrap_or(host);

    let bucket = host.strip_suffix(domain)?.strip_suffix('.')?;
    (!bucket.is_empty()).then(|| bucket.to_owned())
}

type BucketAndKey = (Option<String>, Option<String>);

/// Path format: `/{bucket}` or `/{bucket}/{key...}`.
fn parse_path(path: &str) -> Result<BucketAndKey, S3ServiceError> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if trimmed.is_empty() {
        return Ok((None, None));
    }

    let (bucket, key) = match trimmed.split_once('/') {
        Some((bucket, "")) => (bucket, None),
        Some((bucket, key)) => (bucket, Some(decode_uri_component(key)?)),
        None => (trimmed, None),
    };
    Ok((Some(decode_uri_component(bucket)?), key))
}

/// Percent-decode `s`; the decoded bytes must be UTF-8.
fn decode_uri_component(s: &str) -> Result<String, S3ServiceError> {
    percent_decode_str(s)
        .decode_utf8()
        .map(std::borrow::Cow::into_owned)
        .map_err(|_| S3ServiceError::InvalidArgument {
            message: format!("{s} does not decode to valid UTF-8"),
        })
}

fn parse_query_params(query: &str) -> Result<Vec<(String, String)>, S3ServiceError> {
    query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => Ok((decode_uri_component(k)?, decode_uri_component(v)?)),
            None => Ok((decode_uri_component(pair)?, String::new())),
        })
        .collect()
}

fn query_has_key(params: &[(String, String)], key: &str) -> bool {
    params.iter().any(|(k, _)| k == key)
}

fn query_value<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

fn identify_operation(
    method: &Method,
    has_bucket: bool,
    has_key: bool,
    params: &[(String, String)],
) -> Result<S3Operation, S3ServiceError> {
    match (has_bucket, has_key) {
        (false, false) if *method == Method::GET => Ok(S3Operation::ListBuckets),
        (true, false) => identify_bucket_operation(method, params),
        (true, true) => identify_object_operation(method, params),
        _ => Err(S3ServiceError::MethodNotAllowed),
    }
}

fn identify_bucket_operation(
    method: &Method,
    params: &[(String, String)],
) -> Result<S3Operation, S3ServiceError> {
    let has = |name| query_has_key(params, name);
    let op = match *method {
        Method::GET if has("policy") => S3Operation::GetBucketPolicy,
        Method::GET if has("versioning") => S3Operation::GetBucketVersioning,
        Method::GET if has("uploads") => S3Operation::ListMultipartUploads,
        Method::GET => S3Operation::ListObjectsV2,
        Method::PUT if has("policy") => S3Operation::PutBucketPolicy,
        Method::PUT if has("versioning") => S3Operation::PutBucketVersioning,
        Method::PUT => S3Operation::CreateBucket,
        Method::DELETE if has("policy") => S3Operation::DeleteBucketPolicy,
        Method::DELETE => S3Operation::DeleteBucket,
        Method::HEAD => S3Operation::HeadBucket,
        _ => return Err(S3ServiceError::MethodNotAllowed),
    };
    Ok(op)
}

fn identify_object_operation(
    method: &Method,
    params: &[(String, String)],
) -> Result<S3Operation, S3ServiceError> {
    let has = |name| query_has_key(params, name);
    let op = match *method {
        Method::GET if has("presign") => S3Operation::PresignObject,
        Method::GET if has("uploadId") => S3Operation::ListParts,
        Method::GET => S3Operation::GetObject,
        Method::PUT if has("partNumber") && has("uploadId") => S3Operation::UploadPart,
        Method::PUT if has("partNumber") || has("uploadId") => {
            return Err(S3ServiceError::InvalidArgument {
                message: "a part upload needs both partNumber and uploadId".to_owned(),
            });
        }
        Method::PUT => S3Operation::PutObject,
        Method::DELETE if has("uploadId") => S3Operation::AbortMultipartUpload,
        Method::DELETE => S3Operation::DeleteObject,
        Method::HEAD => S3Operation::HeadObject,
        Method::POST if has("uploads") => S3Operation::CreateMultipartUpload,
        Method::POST if has("uploadId") => S3Operation::CompleteMultipartUpload,
        _ => return Err(S3ServiceError::MethodNotAllowed),
    };
    Ok(op)
}

#[cfg(test)]
mod tests {
    use http::Request;

    use super::*;

    fn router() -> S3Router {
        S3Router::new("s3.localhost", true)
    }

    fn path_style_router() -> S3Router {
        S3Router::new("s3.localhost", false)
    }

    fn parts(method: &Method, host: &str, uri: &str) -> Parts {
        Request::builder()
            .method(method.clone())
            .uri(uri)
            .header("Host", host)
            .body(())
            .unwrap_or_else(|e| panic!("invalid request: {e}"))
            .into_parts()
            .0
    }

    fn route(method: &Method, uri: &str) -> RoutingContext {
        path_style_router()
            .resolve(&parts(method, "s3.localhost:9000", uri))
            .unwrap_or_else(|e| panic!("{method} {uri} did not route: {e}"))
    }

    #[test]
    fn test_should_extract_bucket_and_key_from_virtual_host() {
        let ctx = router()
            .resolve(&parts(&Method::GET, "photos.s3.localhost:9000", "/2024/cat%20one.jpg"))
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(ctx.bucket.as_deref(), Some("photos"));
        assert_eq!(ctx.key.as_deref(), Some("2024/cat one.jpg"));
        assert_eq!(ctx.operation, S3Operation::GetObject);
        assert!(ctx.virtual_hosted);

        let ctx = router()
            .resolve(&parts(&Method::GET, "photos.s3.localhost", "/"))
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(ctx.bucket.as_deref(), Some("photos"));
        assert!(ctx.key.is_none());
        assert_eq!(ctx.operation, S3Operation::ListObjectsV2);
    }

    #[test]
    fn test_should_ignore_virtual_host_when_disabled() {
        let ctx = path_style_router()
            .resolve(&parts(&Method::GET, "photos.s3.localhost:9000", "/"))
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(ctx.bucket.is_none());
        assert_eq!(ctx.operation, S3Operation::ListBuckets);
    }

    #[test]
    fn test_should_not_treat_bare_domain_as_bucket() {
        let ctx = router()
            .resolve(&parts(&Method::GET, "s3.localhost:9000", "/photos"))
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(ctx.bucket.as_deref(), Some("photos"));
        assert_eq!(ctx.operation, S3Operation::ListObjectsV2);
        assert!(!ctx.virtual_hosted);
    }

    #[test]
    fn test_should_percent_decode_path_style_key() {
        let ctx = route(&Method::PUT, "/photos/a%2Fb/c%C3%A9.txt");
        assert_eq!(ctx.bucket.as_deref(), Some("photos"));
        assert_eq!(ctx.key.as_deref(), Some("a/b/cé.txt"));
        assert_eq!(ctx.operation, S3Operation::PutObject);
    }

    #[test]
    fn test_should_route_every_bucket_operation() {
        let cases = [
            (Method::GET, "/", S3Operation::ListBuckets),
            (Method::PUT, "/b", S3Operation::CreateBucket),
            (Method::HEAD, "/b", S3Operation::HeadBucket),
            (Method::DELETE, "/b", S3Operation::DeleteBucket),
            (Method::GET, "/b", S3Operation::ListObjectsV2),
            (Method::GET, "/b?list-type=2&prefix=a%2F", S3Operation::ListObjectsV2),
            (Method::GET, "/b?policy", S3Operation::GetBucketPolicy),
            (Method::PUT, "/b?policy", S3Operation::PutBucketPolicy),
            (Method::DELETE, "/b?policy", S3Operation::DeleteBucketPolicy),
            (Method::GET, "/b?versioning", S3Operation::GetBucketVersioning),
            (Method::PUT, "/b?versioning", S3Operation::PutBucketVersioning),
            (Method::GET, "/b?uploads", S3Operation::ListMultipartUploads),
        ];
        for (method, uri, expected) in cases {
            assert_eq!(route(&method, uri).operation, expected, "{method} {uri}");
        }
    }

    #[test]
    fn test_should_route_every_object_operation() {
        let cases = [
            (Method::PUT, "/b/k", S3Operation::PutObject),
            (Method::GET, "/b/k", S3Operation::GetObject),
            (Method::GET, "/b/k?versionId=7", S3Operation::GetObject),
            (Method::HEAD, "/b/k", S3Operation::HeadObject),
            (Method::DELETE, "/b/k", S3Operation::DeleteObject),
            (Method::POST, "/b/k?uploads", S3Operation::CreateMultipartUpload),
            (Method::PUT, "/b/k?partNumber=1&uploadId=u", S3Operation::UploadPart),
            (Method::POST, "/b/k?uploadId=u", S3Operation::CompleteMultipartUpload),
            (Method::DELETE, "/b/k?uploadId=u", S3Operation::AbortMultipartUpload),
            (Method::GET, "/b/k?uploadId=u", S3Operation::ListParts),
            (Method::GET, "/b/k?presign&expires=60", S3Operation::PresignObject),
        ];
        for (method, uri, expected) in cases {
            assert_eq!(route(&method, uri).operation, expected, "{method} {uri}");
        }
    }

    #[test]
    fn test_should_reject_half_specified_part_upload() {
        let router = path_style_router();
        for uri in ["/b/k?partNumber=1", "/b/k?uploadId=u", "/b/k?uploadId"] {
            let result = router.resolve(&parts(&Method::PUT, "s3.localhost", uri));
            assert!(
                matches!(result, Err(S3ServiceError::InvalidArgument { .. })),
                "{uri}"
            );
        }
    }

    #[test]
    fn test_should_reject_keys_that_are_not_utf8() {
        let router = path_style_router();
        for uri in ["/b/%FF", "/b/ok%C3", "/b%FE/k", "/b?prefix=%FF"] {
            let result = router.resolve(&parts(&Method::GET, "s3.localhost", uri));
            assert!(
                matches!(result, Err(S3ServiceError::InvalidArgument { .. })),
                "{uri}"
            );
        }
        let vhost = self::router().resolve(&parts(&Method::GET, "photos.s3.localhost", "/%FF%FE"));
        assert!(matches!(vhost, Err(S3ServiceError::InvalidArgument { .. })));
    }

    #[test]
    fn test_should_reject_unroutable_requests() {
        let router = path_style_router();
        for (method, uri) in [
            (Method::PUT, "/"),
            (Method::POST, "/b"),
            (Method::POST, "/b/k"),
            (Method::PATCH, "/b/k"),
        ] {
            let result = router.resolve(&parts(&method, "s3.localhost", uri));
            assert!(
                matches!(result, Err(S3ServiceError::MethodNotAllowed)),
                "{method} {uri}"
            );
        }
    }

    #[test]
    fn test_should_expose_decoded_query_values() {
        let ctx = route(&Method::GET, "/b?prefix=a%2Fb&max-keys=2&start-after");
        assert_eq!(ctx.query("prefix"), Some("a/b"));
        assert_eq!(ctx.query("max-keys"), Some("2"));
        assert_eq!(ctx.query("start-after"), Some(""));
        assert!(ctx.has_query("start-after"));
        assert!(!ctx.has_query("continuation-token"));
    }

    #[test]
    fn test_should_treat_trailing_slash_as_bucket_request() {
        let ctx = route(&Method::GET, "/b/");
        assert_eq!(ctx.bucket.as_deref(), Some("b"));
        assert!(ctx.key.is_none());
        assert!(matches!(ctx.require_key(), Err(S3ServiceError::MethodNotAllowed)));
    }
}
