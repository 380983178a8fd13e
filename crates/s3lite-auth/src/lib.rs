//! Request authorization helpers for s3lite.
//!
//! - [`presign`] - issues and verifies presigned URL grants (HMAC-SHA256,
//!   constant-time comparison, absolute expiry)
//! - [`identity`] - reads the caller's access key id from an
//!   `Authorization` header
//! - [`error`] - authentication error types
//!
//! # Usage
//!
//! ```rust
//! use chrono::Utc;
//! use s3lite_auth::{PresignSigner, VerifyOutcome};
//!
//! let signer = PresignSigner::new("server-secret", 0);
//! let now = Utc::now();
//! let grant = signer
//!     .sign(&http::Method::GET, "photos", "cat.jpg", 300, now)
//!     .unwrap();
//! assert!(grant.query_string().starts_with("expires="));
//! assert_eq!(signer.verify(&grant, now), VerifyOutcome::Allow);
//! ```

pub mod error;
pub mod identity;
pub mod presign;

pub use error::AuthError;
pub use identity::access_key_from_headers;
pub use presign::{PresignSigner, PresignedGrant, VerifyOutcome};
