//! Object types: callers, stored versions, delete markers.
//!
//! An [`S3Object`] is metadata plus a shared reference to its content blob.
//! Cloning one never copies content.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::BlobRef;

/// Version id used for objects written while versioning is off or suspended.
pub const NULL_VERSION_ID: &str = "null";

/// Owner id recorded for anonymous callers.
const ANONYMOUS_ID: &str = "anonymous";

// ---------------------------------------------------------------------------
// Principal
// ---------------------------------------------------------------------------

/// The caller on whose behalf an operation runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "type", content = "id")]
pub enum Principal {
    /// No credentials supplied.
    Anonymous,
    /// Identified by access key id.
    AccessKey(String),
}

impl Principal {
    /// Build a principal from an optional access key id.
    #[must_use]
    pub fn from_access_key(access_key: Option<&str>) -> Self {
        match access_key.filter(|k| !k.is_empty()) {
            Some(k) => Self::AccessKey(k.to_owned()),
            None => Self::Anonymous,
        }
    }

    /// Stable id used as the owner of buckets and uploads.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Anonymous => ANONYMOUS_ID,
            Self::AccessKey(k) => k,
        }
    }

    /// The access key id, if any.
    #[must_use]
    pub fn access_key(&self) -> Option<&str> {
        match self {
            Self::Anonymous => None,
            Self::AccessKey(k) => Some(k),
        }
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

// ---------------------------------------------------------------------------
// S3Object
// ---------------------------------------------------------------------------

/// A stored object version.
#[derive(Debug, Clone)]
pub struct S3Object {
    /// The object key.
    pub key: String,
    /// The version ID (`"null"` for un-versioned objects).
    pub version_id: String,
    /// Quoted content hash.
    pub etag: String,
    /// Size in bytes.
    pub size: u64,
    /// MIME type.
    pub content_type: String,
    /// When this version was published.
    pub last_modified: DateTime<Utc>,
    /// Number of parts if assembled from a multipart upload.
    pub parts_count: Option<u32>,
    /// The content.
    pub blob: BlobRef,
}

/// A delete marker in a versioned bucket.
#[derive(Debug, Clone)]
pub struct S3DeleteMarker {
    /// The object key.
    pub key: String,
    /// The version ID of this delete marker.
    pub version_id: String,
    /// When the marker was created.
    pub last_modified: DateTime<Utc>,
}

/// A version entry: either an object or a delete marker.
#[derive(Debug, Clone)]
pub enum ObjectVersion {
    /// A real object version (boxed to reduce enum size).
    Object(Box<S3Object>),
    /// A delete-marker version.
    DeleteMarker(S3DeleteMarker),
}

impl ObjectVersion {
    /// Returns the version ID.
    #[must_use]
    pub fn version_id(&self) -> &str {
        match self {
            Self::Object(obj) => &obj.version_id,
            Self::DeleteMarker(dm) => &dm.version_id,
        }
    }

    /// Returns `true` if this version is a delete marker.
    #[must_use]
    pub fn is_delete_marker(&self) -> bool {
        matches!(self, Self::DeleteMarker(_))
    }

    /// Returns the inner object, if this is an object version.
    #[must_use]
    pub fn as_object(&self) -> Option<&S3Object> {
        match self {
            Self::Object(obj) => Some(obj),
            Self::DeleteMarker(_) => None,
        }
    }

    /// Bytes this version contributes to bucket usage.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.as_object().map_or(0, |o| o.size)
    }
}

// ---------------------------------------------------------------------------
// ObjectInfo
// ---------------------------------------------------------------------------

/// Object metadata returned by head, list and delete operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectInfo {
    /// The object key.
    pub key: String,
    /// Version id; `None` when the bucket has never been versioned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
    /// Size in bytes.
    pub size: u64,
    /// MIME type.
    pub content_type: String,
    /// Quoted content hash.
    pub etag: String,
    /// Publish time.
    pub last_modified: DateTime<Utc>,
    /// Whether this entry is a delete marker.
    #[serde(default)]
    pub is_delete_marker: bool,
}

impl ObjectInfo {
    /// Build the metadata view of `object`.
    ///
    /// `versioned` controls whether the version id is exposed.
    #[must_use]
    pub fn from_object(object: &S3Object, versioned: bool) -> Self {
        Self {
            key: object.key.clone(),
            version_id: versioned.then(|| object.version_id.clone()),
            size: object.size,
            content_type: object.content_type.clone(),
            etag: object.etag.clone(),
            last_modified: object.last_modified,
            is_delete_marker: false,
        }
    }
}

/// Result of a delete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    /// Version id removed or created (a marker's id when `delete_marker`).
    pub version_id: Option<String>,
    /// Whether a delete marker was involved.
    pub delete_marker: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_build_principal_from_access_key() {
        assert_eq!(Principal::from_access_key(None), Principal::Anonymous);
        assert_eq!(Principal::from_access_key(Some("")), Principal::Anonymous);
        let p = Principal::from_access_key(Some("AKIDEXAMPLE"));
        assert_eq!(p.access_key(), Some("AKIDEXAMPLE"));
        assert_eq!(p.id(), "AKIDEXAMPLE");
        assert_eq!(Principal::Anonymous.id(), "anonymous");
    }

    #[test]
    fn test_should_report_delete_marker_size_as_zero() {
        let marker = ObjectVersion::DeleteMarker(S3DeleteMarker {
            key: "k".into(),
            version_id: "v1".into(),
            last_modified: Utc::now(),
        });
        assert!(marker.is_delete_marker());
        assert_eq!(marker.size(), 0);
        assert!(marker.as_object().is_none());
        assert_eq!(marker.version_id(), "v1");
    }
}
