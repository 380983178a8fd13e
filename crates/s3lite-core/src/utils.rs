//! Shared utilities: ID generation and continuation-token encoding.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;

use crate::error::S3ServiceError;

// ---------------------------------------------------------------------------
// ID generation
// ---------------------------------------------------------------------------

/// Generate a version ID from a per-bucket sequence number.
///
/// The first 16 hex digits encode `sequence`, so IDs issued by one bucket sort
/// in issue order. A random suffix keeps them unguessable.
///
/// # Examples
///
/// ```
/// use s3lite_core::utils::generate_version_id;
///
/// let a = generate_version_id(1);
/// let b = generate_version_id(2);
/// assert!(a < b);
/// assert_eq!(a.len(), 32);
/// ```
#[must_use]
pub fn generate_version_id(sequence: u64) -> String {
    let mut rng = rand::rng();
    let mut suffix = [0u8; 8];
    rng.fill(&mut suffix);
    format!("{sequence:016x}{}", hex::encode(suffix))
}

/// Generate a random upload ID for multipart uploads.
///
/// # Examples
///
/// ```
/// use s3lite_core::utils::generate_upload_id;
///
/// let id = generate_upload_id();
/// assert_eq!(id.len(), 64);
/// assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
/// ```
#[must_use]
pub fn generate_upload_id() -> String {
    let mut rng = rand::rng();
    let mut buf = [0u8; 32];
    rng.fill(&mut buf);
    hex::encode(buf)
}

/// Generate a random hex secret for presigned URL signing.
#[must_use]
pub fn generate_secret() -> String {
    generate_upload_id()
}

// ---------------------------------------------------------------------------
// Continuation tokens
// ---------------------------------------------------------------------------

/// Encode the last key of a listing page as an opaque continuation token.
///
/// # Examples
///
/// ```
/// use s3lite_core::utils::{decode_continuation_token, encode_continuation_token};
///
/// let token = encode_continuation_token("photos/2024/img.jpg");
/// assert_eq!(decode_continuation_token(&token).unwrap(), "photos/2024/img.jpg");
/// ```
#[must_use]
pub fn encode_continuation_token(key: &str) -> String {
    URL_SAFE_NO_PAD.encode(key.as_bytes())
}

/// Decode a continuation token back to the key it was issued after.
///
/// # Errors
///
/// Returns [`S3ServiceError::InvalidArgument`] if the token is not valid
/// base64 or does not decode to UTF-8.
pub fn decode_continuation_token(token: &str) -> Result<String, S3ServiceError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|_| S3ServiceError::InvalidArgument {
            message: "Invalid continuation token".to_owned(),
        })?;
    String::from_utf8(bytes).map_err(|_| S3ServiceError::InvalidArgument {
        message: "Continuation token contains invalid UTF-8".to_owned(),
    })
}
