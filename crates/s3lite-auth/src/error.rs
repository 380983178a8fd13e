//! Error types for presigned URLs and caller identity.

/// Errors raised while signing presigned URLs or reading caller identity.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The `Authorization` header could not be parsed.
    #[error("Invalid Authorization header format")]
    InvalidAuthHeader,

    /// The signing algorithm is not supported (only AWS4-HMAC-SHA256 is supported).
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The `Credential` component does not match
    /// `AKID/date/region/service/aws4_request`.
    #[error("Invalid credential format")]
    InvalidCredential,

    /// The requested presign lifetime is outside the allowed range.
    #[error("Presigned URL expiry must be between 1 and {max} seconds, got {secs}")]
    InvalidExpiry {
        /// The requested lifetime.
        secs: u64,
        /// The largest lifetime accepted.
        max: u64,
    },

    /// A required presign query parameter is missing.
    #[error("Missing required query parameter: {0}")]
    MissingQueryParam(String),

    /// A presign query parameter could not be parsed.
    #[error("Invalid query parameter: {0}")]
    InvalidQueryParam(String),
}
