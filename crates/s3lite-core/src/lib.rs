//! Core of the s3lite object-storage gateway.
//!
//! This crate holds everything below the HTTP surface: bucket and object
//! state, blob storage with disk spillover, the bucket policy engine, the
//! multipart upload coordinator, the listing engine and the background upload
//! reaper. All of it is reached through one explicitly constructed handle,
//! [`ObjectGateway`].
//!
//! # Architecture
//!
//! ```text
//! ObjectGateway (ops: bucket, object, multipart, list, config)
//!        |
//!        +--> PolicyDocument (authorize)
//!        |
//!        v
//!   S3ServiceState (buckets, uploads)
//!        |
//!        v
//!   BlobStorage (in-memory + spillover, bounded retry)
//! ```
//!
//! # Example
//!
//! ```
//! use bytes::Bytes;
//! use s3lite_core::{GatewayConfig, ObjectGateway};
//! use s3lite_core::state::Principal;
//!
//! # tokio_test::block_on(async {
//! let gateway = ObjectGateway::new(GatewayConfig::default());
//! let owner = Principal::AccessKey("AKIDEXAMPLE".to_owned());
//! gateway.create_bucket("photos", &owner).unwrap();
//! gateway
//!     .put_object("photos", "cat.jpg", Bytes::from_static(b"meow"), Some(4), None)
//!     .await
//!     .unwrap();
//! let object = gateway.get_object("photos", "cat.jpg", None).await.unwrap();
//! assert_eq!(object.body.as_ref(), b"meow");
//! assert_eq!(object.info.content_type, "image/jpeg");
//! # });
//! ```

pub mod checksums;
pub mod config;
pub mod content_type;
pub mod error;
pub mod listing;
pub mod ops;
pub mod policy;
pub mod provider;
pub mod reaper;
pub mod retry;
pub mod state;
pub mod storage;
pub mod utils;
pub mod validation;

pub use config::GatewayConfig;
pub use provider::ObjectGateway;
