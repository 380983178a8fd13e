//! The operations the gateway routes to.

use std::fmt;

/// Every request shape the router recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum S3Operation {
    /// `GET /`
    ListBuckets,
    /// `PUT /{bucket}`
    CreateBucket,
    /// `HEAD /{bucket}`
    HeadBucket,
    /// `DELETE /{bucket}`
    DeleteBucket,
    /// `GET /{bucket}` with or without `list-type=2`.
    ListObjectsV2,
    /// `GET /{bucket}?policy`
    GetBucketPolicy,
    /// `PUT /{bucket}?policy`
    PutBucketPolicy,
    /// `DELETE /{bucket}?policy`
    DeleteBucketPolicy,
    /// `GET /{bucket}?versioning`
    GetBucketVersioning,
    /// `PUT /{bucket}?versioning`
    PutBucketVersioning,
    /// `GET /{bucket}?uploads`
    ListMultipartUploads,
    /// `PUT /{bucket}/{key}`
    PutObject,
    /// `GET /{bucket}/{key}`
    GetObject,
    /// `HEAD /{bucket}/{key}`
    HeadObject,
    /// `DELETE /{bucket}/{key}`
    DeleteObject,
    /// `POST /{bucket}/{key}?uploads`
    CreateMultipartUpload,
    /// `PUT /{bucket}/{key}?partNumber&uploadId`
    UploadPart,
    /// `POST /{bucket}/{key}?uploadId`
    CompleteMultipartUpload,
    /// `DELETE /{bucket}/{key}?uploadId`
    AbortMultipartUpload,
    /// `GET /{bucket}/{key}?uploadId`
    ListParts,
    /// `GET /{bucket}/{key}?presign`
    PresignObject,
}

impl S3Operation {
    /// Operation name as used in logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ListBuckets => "ListBuckets",
            Self::CreateBucket => "CreateBucket",
            Self::HeadBucket => "HeadBucket",
            Self::DeleteBucket => "DeleteBucket",
            Self::ListObjectsV2 => "ListObjectsV2",
            Self::GetBucketPolicy => "GetBucketPolicy",
            Self::PutBucketPolicy => "PutBucketPolicy",
            Self::DeleteBucketPolicy => "DeleteBucketPolicy",
            Self::GetBucketVersioning => "GetBucketVersioning",
            Self::PutBucketVersioning => "PutBucketVersioning",
            Self::ListMultipartUploads => "ListMultipartUploads",
            Self::PutObject => "PutObject",
            Self::GetObject => "GetObject",
            Self::HeadObject => "HeadObject",
            Self::DeleteObject => "DeleteObject",
            Self::CreateMultipartUpload => "CreateMultipartUpload",
            Self::UploadPart => "UploadPart",
            Self::CompleteMultipartUpload => "CompleteMultipartUpload",
            Self::AbortMultipartUpload => "AbortMultipartUpload",
            Self::ListParts => "ListParts",
            Self::PresignObject => "PresignObject",
        }
    }

    /// Whether the request body carries object bytes and so must declare a
    /// `Content-Length`.
    #[must_use]
    pub fn requires_content_length(&self) -> bool {
        matches!(self, Self::PutObject | Self::UploadPart)
    }
}

impl fmt::Display for S3Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
