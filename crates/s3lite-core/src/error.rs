//! Gateway error types.
//!
//! Defines [`S3ServiceError`], the domain error enum for every failure the
//! gateway can report. Each variant maps to:
//!
//! - an [`ErrorKind`] (the coarse taxonomy callers branch on),
//! - an S3 wire error code (`NoSuchKey`, `InvalidPart`, ...),
//! - an HTTP status code.
//!
//! # Usage
//!
//! ```
//! use s3lite_core::error::{ErrorKind, S3ServiceError};
//!
//! let err = S3ServiceError::NoSuchBucket {
//!     bucket: "my-bucket".to_owned(),
//! };
//! assert_eq!(err.kind(), ErrorKind::NotFound);
//! assert_eq!(err.code(), "NoSuchBucket");
//! assert_eq!(err.status_code(), http::StatusCode::NOT_FOUND);
//! ```

use std::fmt;

use http::StatusCode;

/// Coarse error taxonomy exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bucket, key, version, upload or policy absent.
    NotFound,
    /// Bucket already exists, bucket not empty, part mismatch.
    Conflict,
    /// Malformed size, content, name or request shape.
    InvalidArgument,
    /// Policy or signature failure.
    AccessDenied,
    /// A bucket limit would be exceeded.
    QuotaExceeded,
    /// Storage-layer or otherwise unexpected fault.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotFound => "NotFound",
            Self::Conflict => "Conflict",
            Self::InvalidArgument => "InvalidArgument",
            Self::AccessDenied => "AccessDenied",
            Self::QuotaExceeded => "QuotaExceeded",
            Self::Internal => "Internal",
        };
        f.write_str(s)
    }
}

/// Gateway service error type.
#[derive(Debug, thiserror::Error)]
pub enum S3ServiceError {
    // -----------------------------------------------------------------------
    // Bucket errors
    // -----------------------------------------------------------------------
    /// The specified bucket does not exist.
    #[error("The specified bucket does not exist: {bucket}")]
    NoSuchBucket {
        /// The bucket name that was not found.
        bucket: String,
    },

    /// The requested bucket name is owned by another principal.
    #[error("The requested bucket name is not available: {bucket}")]
    BucketAlreadyExists {
        /// The bucket name that already exists.
        bucket: String,
    },

    /// The bucket is not empty and cannot be deleted.
    #[error("The bucket you tried to delete is not empty: {bucket}")]
    BucketNotEmpty {
        /// The bucket name that is not empty.
        bucket: String,
    },

    /// The bucket has no policy attached.
    #[error("The bucket policy does not exist: {bucket}")]
    NoSuchBucketPolicy {
        /// The bucket without a policy.
        bucket: String,
    },

    // -----------------------------------------------------------------------
    // Object / key errors
    // -----------------------------------------------------------------------
    /// The specified key does not exist.
    #[error("The specified key does not exist: {key}")]
    NoSuchKey {
        /// The key that was not found.
        key: String,
    },

    /// The specified version does not exist.
    #[error("The specified version does not exist: key={key}, version_id={version_id}")]
    NoSuchVersion {
        /// The key for the version.
        key: String,
        /// The version ID that was not found.
        version_id: String,
    },

    // -----------------------------------------------------------------------
    // Multipart upload errors
    // -----------------------------------------------------------------------
    /// The specified multipart upload does not exist (or is no longer open).
    #[error("The specified upload does not exist: {upload_id}")]
    NoSuchUpload {
        /// The upload ID that was not found.
        upload_id: String,
    },

    /// A part in the completion manifest is missing or has a different ETag.
    #[error("One or more of the specified parts could not be found: {message}")]
    InvalidPart {
        /// Which part failed and why.
        message: String,
    },

    /// A non-final part is smaller than the minimum part size.
    #[error(
        "Your proposed upload is smaller than the minimum allowed object size: part {part_number} is {size} bytes, minimum is {min_size}"
    )]
    EntityTooSmall {
        /// The undersized part.
        part_number: u32,
        /// Its size in bytes.
        size: u64,
        /// The configured minimum.
        min_size: u64,
    },

    // -----------------------------------------------------------------------
    // Validation errors
    // -----------------------------------------------------------------------
    /// The specified bucket name is not valid.
    #[error("Invalid bucket name: {name}: {reason}")]
    InvalidBucketName {
        /// The invalid bucket name.
        name: String,
        /// The reason for the error.
        reason: String,
    },

    /// An argument provided is invalid.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    /// The key is too long.
    #[error("Your key is too long")]
    KeyTooLong,

    /// The XML body is malformed.
    #[error("The XML you provided was not well-formed")]
    MalformedXml,

    /// The policy document could not be parsed.
    #[error("Policies must be valid JSON: {message}")]
    MalformedPolicy {
        /// Parser message.
        message: String,
    },

    /// Missing Content-Length header.
    #[error("You must provide the Content-Length HTTP header")]
    MissingContentLength,

    /// The HTTP method is not allowed against this resource.
    #[error("The specified method is not allowed against this resource")]
    MethodNotAllowed,

    /// The request body is larger than the gateway accepts.
    #[error("Your proposed upload exceeds the maximum allowed size of {max_size} bytes")]
    EntityTooLarge {
        /// Largest accepted body, in bytes.
        max_size: u64,
    },

    // -----------------------------------------------------------------------
    // Authorization errors
    // -----------------------------------------------------------------------
    /// Access denied by policy.
    #[error("Access Denied")]
    AccessDenied,

    /// A presigned URL is past its expiry.
    #[error("Request has expired")]
    RequestExpired,

    /// A presigned URL signature did not verify.
    #[error("The request signature we calculated does not match the signature you provided")]
    SignatureDoesNotMatch,

    // -----------------------------------------------------------------------
    // Resource limits
    // -----------------------------------------------------------------------
    /// A bucket limit would be exceeded by this write.
    #[error("Bucket quota exceeded for {bucket}: {message}")]
    QuotaExceeded {
        /// The bucket whose limit was hit.
        bucket: String,
        /// Which limit.
        message: String,
    },

    /// The request did not finish within the configured timeout.
    #[error("Your socket connection to the server was not read from or written to within the timeout period")]
    RequestTimeout,

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------
    /// A retryable storage fault. Never escapes the storage layer.
    #[error("transient storage fault: {0}")]
    TransientStorage(#[source] std::io::Error),

    /// Internal error with context.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl S3ServiceError {
    /// The taxonomy class of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoSuchBucket { .. }
            | Self::NoSuchKey { .. }
            | Self::NoSuchVersion { .. }
            | Self::NoSuchUpload { .. }
            | Self::NoSuchBucketPolicy { .. } => ErrorKind::NotFound,
            Self::BucketAlreadyExists { .. }
            | Self::BucketNotEmpty { .. }
            | Self::InvalidPart { .. } => ErrorKind::Conflict,
            Self::EntityTooSmall { .. }
            | Self::InvalidBucketName { .. }
            | Self::InvalidArgument { .. }
            | Self::KeyTooLong
            | Self::MalformedXml
            | Self::MalformedPolicy { .. }
            | Self::MissingContentLength
            | Self::MethodNotAllowed
            | Self::EntityTooLarge { .. } => ErrorKind::InvalidArgument,
            Self::AccessDenied | Self::RequestExpired | Self::SignatureDoesNotMatch => {
                ErrorKind::AccessDenied
            }
            Self::QuotaExceeded { .. } => ErrorKind::QuotaExceeded,
            Self::RequestTimeout | Self::TransientStorage(_) | Self::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// The S3 wire error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::NoSuchBucket { .. } => "NoSuchBucket",
            Self::BucketAlreadyExists { .. } => "BucketAlreadyExists",
            Self::BucketNotEmpty { .. } => "BucketNotEmpty",
            Self::NoSuchBucketPolicy { .. } => "NoSuchBucketPolicy",
            Self::NoSuchKey { .. } => "NoSuchKey",
            Self::NoSuchVersion { .. } => "NoSuchVersion",
            Self::NoSuchUpload { .. } => "NoSuchUpload",
            Self::InvalidPart { .. } => "InvalidPart",
            Self::EntityTooSmall { .. } => "EntityTooSmall",
            Self::InvalidBucketName { .. } => "InvalidBucketName",
            Self::InvalidArgument { .. } => "InvalidArgument",
            Self::KeyTooLong => "KeyTooLongError",
            Self::MalformedXml => "MalformedXML",
            Self::MalformedPolicy { .. } => "MalformedPolicy",
            Self::MissingContentLength => "MissingContentLength",
            Self::MethodNotAllowed => "MethodNotAllowed",
            Self::EntityTooLarge { .. } => "EntityTooLarge",
            Self::AccessDenied | Self::RequestExpired => "AccessDenied",
            Self::SignatureDoesNotMatch => "SignatureDoesNotMatch",
            Self::QuotaExceeded { .. } => "QuotaExceeded",
            Self::RequestTimeout => "RequestTimeout",
            Self::TransientStorage(_) | Self::Internal(_) => "InternalError",
        }
    }

    /// The HTTP status code returned to clients.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NoSuchBucket { .. }
            | Self::NoSuchKey { .. }
            | Self::NoSuchVersion { .. }
            | Self::NoSuchUpload { .. }
            | Self::NoSuchBucketPolicy { .. } => StatusCode::NOT_FOUND,
            Self::BucketAlreadyExists { .. } | Self::BucketNotEmpty { .. } => {
                StatusCode::CONFLICT
            }
            Self::InvalidPart { .. }
            | Self::EntityTooSmall { .. }
            | Self::InvalidBucketName { .. }
            | Self::InvalidArgument { .. }
            | Self::KeyTooLong
            | Self::MalformedXml
            | Self::MalformedPolicy { .. }
            | Self::QuotaExceeded { .. } => StatusCode::BAD_REQUEST,
            Self::MissingContentLength => StatusCode::LENGTH_REQUIRED,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::EntityTooLarge { .. } => StatusCode::BAD_REQUEST,
            Self::AccessDenied | Self::RequestExpired | Self::SignatureDoesNotMatch => {
                StatusCode::FORBIDDEN
            }
            Self::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            Self::TransientStorage(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the storage layer may retry the failed operation.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientStorage(_))
    }
}

/// Convenience result type for gateway operations.
pub type S3ServiceResult<T> = Result<T, S3ServiceError>;
