//! In-memory gateway state.
//!
//! - [`S3ServiceState`] -- the bucket table
//! - [`S3Bucket`] -- per-bucket objects, uploads, versioning, policy, limits
//! - [`ObjectStore`] -- sorted key storage, versioned or not
//! - [`S3Object`] / [`S3DeleteMarker`] / [`ObjectInfo`] -- object types
//! - [`MultipartUpload`] / [`UploadPart`] -- multipart upload tracking
//!
//! # Thread Safety
//!
//! All types are `Send + Sync`:
//!
//! - `DashMap` for the bucket table, upload tables and part tables
//! - `parking_lot::RwLock` for each bucket's object store, versioning status
//!   and policy, and for each upload's state

pub(crate) mod bucket;
pub(crate) mod keystore;
pub(crate) mod multipart;
pub(crate) mod object;
pub(crate) mod service;

pub use bucket::{BucketLimits, NewObject, S3Bucket, VersioningStatus};
pub use keystore::{ListResult, ObjectStore, StoreUsage};
pub use multipart::{
    CompletedPart, CompletionGuard, CompletionStart, MultipartUpload, UploadPart, UploadState,
};
pub use object::{
    DeleteOutcome, NULL_VERSION_ID, ObjectInfo, ObjectVersion, Principal, S3DeleteMarker,
    S3Object,
};
pub use service::S3ServiceState;
