//! Building HTTP responses from gateway results.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::StatusCode;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, ETAG, HeaderValue, LAST_MODIFIED};
use s3lite_core::error::{ErrorKind, S3ServiceError};
use s3lite_core::state::ObjectInfo;
use tracing::error;

use crate::body::S3ResponseBody;
use crate::xml::{S3Serialize, error_to_xml, to_xml};

/// Response header carrying an object's version id.
pub const VERSION_ID_HEADER: &str = "x-amz-version-id";

/// Response header set when a delete created or removed a delete marker.
pub const DELETE_MARKER_HEADER: &str = "x-amz-delete-marker";

const XML_CONTENT_TYPE: &str = "application/xml";

/// Convert an error into an S3 `<Error>` response.
///
/// Internal faults are reported with a generic message; their detail only
/// goes to the log.
pub fn error_to_response(
    err: &S3ServiceError,
    resource: Option<&str>,
    request_id: &str,
) -> http::Response<S3ResponseBody> {
    let message = if err.kind() == ErrorKind::Internal && !matches!(err, S3ServiceError::RequestTimeout) {
        error!(error = %err, request_id, "internal error");
        "We encountered an internal error. Please try again.".to_owned()
    } else {
        err.to_string()
    };
    let xml = error_to_xml(err.code(), &message, resource, request_id);

    http::Response::builder()
        .status(err.status_code())
        .header(CONTENT_TYPE, XML_CONTENT_TYPE)
        .body(S3ResponseBody::buffered(xml))
        .unwrap_or_else(|_| {
            let mut response = http::Response::new(S3ResponseBody::empty());
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        })
}

/// `200` with an XML document under `root`.
pub fn xml_response<T: S3Serialize>(
    root: &str,
    value: &T,
) -> Result<http::Response<S3ResponseBody>, S3ServiceError> {
    let xml = to_xml(root, value).map_err(|e| S3ServiceError::Internal(anyhow::anyhow!(e)))?;
    build_response(
        http::Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, XML_CONTENT_TYPE),
        S3ResponseBody::buffered(xml),
    )
}

/// A bodiless response with `status`.
pub fn empty_response(status: StatusCode) -> Result<http::Response<S3ResponseBody>, S3ServiceError> {
    build_response(
        http::Response::builder().status(status),
        S3ResponseBody::empty(),
    )
}

/// `200` with a JSON document, used for bucket policies and the health check.
pub fn json_response(json: String) -> Result<http::Response<S3ResponseBody>, S3ServiceError> {
    build_response(
        http::Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, "application/json"),
        S3ResponseBody::buffered(json),
    )
}

/// Response for `GET`/`HEAD` on an object. A `HEAD` passes `body = None` and
/// still reports the object's length.
pub fn object_response(
    info: &ObjectInfo,
    body: Option<Bytes>,
) -> Result<http::Response<S3ResponseBody>, S3ServiceError> {
    let mut builder = http::Response::builder()
        .status(StatusCode::OK)
        .header(ETAG, header_value(&info.etag)?)
        .header(CONTENT_TYPE, header_value(&info.content_type)?)
        .header(CONTENT_LENGTH, info.size)
        .header(LAST_MODIFIED, http_date(&info.last_modified));
    if let Some(version_id) = &info.version_id {
        builder = builder.header(VERSION_ID_HEADER, header_value(version_id)?);
    }
    let body = body.map_or_else(S3ResponseBody::empty, S3ResponseBody::buffered);
    build_response(builder, body)
}

/// RFC 7231 date, as used by `Last-Modified`.
#[must_use]
pub fn http_date(dt: &DateTime<Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// A header value from text that came from a client or from stored metadata.
pub fn header_value(value: &str) -> Result<HeaderValue, S3ServiceError> {
    HeaderValue::from_str(value).map_err(|_| S3ServiceError::InvalidArgument {
        message: format!("value cannot be sent as a header: {value}"),
    })
}

/// Finish `builder` with `body`.
pub fn build_response(
    builder: http::response::Builder,
    body: S3ResponseBody,
) -> Result<http::Response<S3ResponseBody>, S3ServiceError> {
    builder
        .body(body)
        .map_err(|e| S3ServiceError::Internal(anyhow::anyhow!("failed to build response: {e}")))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use http_body::Body;
    use http_body_util::BodyExt;

    use super::*;

    fn info(version_id: Option<&str>) -> ObjectInfo {
        ObjectInfo {
            key: "cat.jpg".to_owned(),
            version_id: version_id.map(str::to_owned),
            size: 4,
            content_type: "image/jpeg".to_owned(),
            etag: "\"abc\"".to_owned(),
            last_modified: Utc
                .with_ymd_and_hms(2024, 3, 1, 12, 0, 0)
                .single()
                .unwrap_or_else(|| panic!("valid timestamp")),
            is_delete_marker: false,
        }
    }

    fn header<'a>(resp: &'a http::Response<S3ResponseBody>, name: &str) -> Option<&'a str> {
        resp.headers().get(name).and_then(|v| v.to_str().ok())
    }

    #[test]
    fn test_should_create_error_response() {
        let err = S3ServiceError::NoSuchBucket {
            bucket: "b".to_owned(),
        };
        let resp = error_to_response(&err, Some("/b"), "req-1");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(header(&resp, "content-type"), Some("application/xml"));
    }

    #[tokio::test]
    async fn test_should_hide_internal_error_detail() {
        let err = S3ServiceError::Internal(anyhow::anyhow!("disk /var/secret failed"));
        let resp = error_to_response(&err, None, "req-2");
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = resp
            .into_body()
            .collect()
            .await
            .unwrap_or_else(|e| match e {})
            .to_bytes();
        let text = String::from_utf8_lossy(&body);
        assert!(text.contains("<Code>InternalError</Code>"));
        assert!(!text.contains("/var/secret"));
    }

    #[test]
    fn test_should_set_object_headers() {
        let resp = object_response(&info(Some("00000000000000000001")), Some(Bytes::from_static(b"meow")))
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(header(&resp, "etag"), Some("\"abc\""));
        assert_eq!(header(&resp, "content-type"), Some("image/jpeg"));
        assert_eq!(header(&resp, "content-length"), Some("4"));
        assert_eq!(header(&resp, "last-modified"), Some("Fri, 01 Mar 2024 12:00:00 GMT"));
        assert_eq!(header(&resp, VERSION_ID_HEADER), Some("00000000000000000001"));
        assert_eq!(resp.body().size_hint().exact(), Some(4));
    }

    #[test]
    fn test_should_omit_version_header_when_unversioned() {
        let resp = object_response(&info(None), None).unwrap_or_else(|e| panic!("{e}"));
        assert!(resp.headers().get(VERSION_ID_HEADER).is_none());
        assert_eq!(header(&resp, "content-length"), Some("4"));
        assert!(resp.body().is_end_stream());
    }
}
