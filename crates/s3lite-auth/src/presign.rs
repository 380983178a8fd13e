//! Presigned URL signing and verification.
//!
//! A grant is the tuple (method, bucket, key, absolute expiry) plus an
//! HMAC-SHA256 signature over the canonical string
//!
//! ```text
//! METHOD\n
//! bucket\n
//! key\n
//! <expiry as unix seconds>
//! ```
//!
//! keyed with a server-held secret. Nothing is stored: verification
//! recomputes the signature and compares it in constant time.
//!
//! # Clock skew
//!
//! The expiry is an absolute timestamp. A grant is expired once
//! `now > expires + clock_skew`. Signer and verifier normally share one
//! process clock, so the default tolerance is zero; raise it only when they
//! run on different hosts.

use chrono::{DateTime, Utc};
use hmac::{Hmac, KeyInit, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::error::AuthError;

type HmacSha256 = Hmac<Sha256>;

/// Longest lifetime a grant may have: seven days.
pub const MAX_EXPIRY_SECS: u64 = 604_800;

/// Query parameter carrying the absolute expiry.
pub const EXPIRES_PARAM: &str = "expires";

/// Query parameter carrying the hex signature.
pub const SIGNATURE_PARAM: &str = "signature";

/// Characters left unescaped in a key path: unreserved plus `/`.
const KEY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/');

/// Outcome of checking a grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Signature valid and not expired.
    Allow,
    /// Signature valid but past expiry.
    Expired,
    /// Signature does not match the request.
    InvalidSignature,
}

/// A signed, time-bounded capability for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresignedGrant {
    /// HTTP method the grant covers.
    pub method: http::Method,
    /// Bucket name.
    pub bucket: String,
    /// Object key.
    pub key: String,
    /// Expiry as unix seconds.
    pub expires: i64,
    /// Hex HMAC-SHA256 signature.
    pub signature: String,
}

impl PresignedGrant {
    /// Rebuild a grant from a request's method, target and presign query
    /// parameters.
    ///
    /// # Errors
    ///
    /// - [`AuthError::MissingQueryParam`] if `expires` or `signature` is absent.
    /// - [`AuthError::InvalidQueryParam`] if `expires` is not an integer.
    pub fn from_request(
        method: &http::Method,
        bucket: &str,
        key: &str,
        expires: Option<&str>,
        signature: Option<&str>,
    ) -> Result<Self, AuthError> {
        let expires = expires.ok_or_else(|| AuthError::MissingQueryParam(EXPIRES_PARAM.to_owned()))?;
        let signature =
            signature.ok_or_else(|| AuthError::MissingQueryParam(SIGNATURE_PARAM.to_owned()))?;
        let expires = expires
            .parse::<i64>()
            .map_err(|_| AuthError::InvalidQueryParam(EXPIRES_PARAM.to_owned()))?;
        Ok(Self {
            method: method.clone(),
            bucket: bucket.to_owned(),
            key: key.to_owned(),
            expires,
            signature: signature.to_owned(),
        })
    }

    /// The query string carrying this grant: `expires=<unix>&signature=<hex>`.
    #[must_use]
    pub fn query_string(&self) -> String {
        format!(
            "{EXPIRES_PARAM}={}&{SIGNATURE_PARAM}={}",
            self.expires, self.signature
        )
    }

    /// Full path-style URL under `endpoint`, e.g. `http://localhost:9000`.
    #[must_use]
    pub fn url(&self, endpoint: &str) -> String {
        format!("{}/{}/{}", endpoint.trim_end_matches('/'), self.bucket, self.key_and_query())
    }

    /// URL for a bucket addressed by host name, e.g. under
    /// `http://photos.s3.localhost:9000`; the path is just the key.
    #[must_use]
    pub fn virtual_hosted_url(&self, bucket_origin: &str) -> String {
        format!("{}/{}", bucket_origin.trim_end_matches('/'), self.key_and_query())
    }

    fn key_and_query(&self) -> String {
        format!(
            "{}?{}",
            utf8_percent_encode(&self.key, KEY_ENCODE_SET),
            self.query_string()
        )
    }

    /// Expiry as a timestamp.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.expires, 0)
    }
}

/// Issues and checks presigned grants with a shared secret.
#[derive(Clone)]
pub struct PresignSigner {
    secret: Vec<u8>,
    clock_skew: chrono::Duration,
}

impl std::fmt::Debug for PresignSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresignSigner")
            .field("clock_skew", &self.clock_skew)
            .finish_non_exhaustive()
    }
}

impl PresignSigner {
    /// Create a signer. `clock_skew_secs` widens the expiry check.
    #[must_use]
    pub fn new(secret: impl AsRef<[u8]>, clock_skew_secs: u64) -> Self {
        let skew = i64::try_from(clock_skew_secs.min(MAX_EXPIRY_SECS)).unwrap_or(0);
        Self {
            secret: secret.as_ref().to_vec(),
            clock_skew: chrono::Duration::seconds(skew),
        }
    }

    /// Sign a grant for `method` on `bucket/key`, valid for `expiry_secs`
    /// from `now`.
    ///
    /// # Errors
    ///
    /// [`AuthError::InvalidExpiry`] unless `expiry_secs` is in
    /// 1..=[`MAX_EXPIRY_SECS`].
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::{Duration, Utc};
    /// use s3lite_auth::presign::{PresignSigner, VerifyOutcome};
    ///
    /// let signer = PresignSigner::new("secret", 0);
    /// let now = Utc::now();
    /// let grant = signer.sign(&http::Method::GET, "b", "k", 60, now).unwrap();
    /// assert_eq!(signer.verify(&grant, now + Duration::seconds(30)), VerifyOutcome::Allow);
    /// assert_eq!(signer.verify(&grant, now + Duration::seconds(61)), VerifyOutcome::Expired);
    /// ```
    pub fn sign(
        &self,
        method: &http::Method,
        bucket: &str,
        key: &str,
        expiry_secs: u64,
        now: DateTime<Utc>,
    ) -> Result<PresignedGrant, AuthError> {
        if expiry_secs == 0 || expiry_secs > MAX_EXPIRY_SECS {
            return Err(AuthError::InvalidExpiry {
                secs: expiry_secs,
                max: MAX_EXPIRY_SECS,
            });
        }
        let lifetime = i64::try_from(expiry_secs).map_err(|_| AuthError::InvalidExpiry {
            secs: expiry_secs,
            max: MAX_EXPIRY_SECS,
        })?;
        let expires = now.timestamp() + lifetime;
        let signature = self.compute_signature(method, bucket, key, expires);
        debug!(method = %method, bucket, key, expires, "presigned grant issued");
        Ok(PresignedGrant {
            method: method.clone(),
            bucket: bucket.to_owned(),
            key: key.to_owned(),
            expires,
            signature,
        })
    }

    /// Check `grant` at time `now`.
    ///
    /// The signature is checked first; an invalid grant is never reported as
    /// merely expired.
    #[must_use]
    pub fn verify(&self, grant: &PresignedGrant, now: DateTime<Utc>) -> VerifyOutcome {
        let expected =
            self.compute_signature(&grant.method, &grant.bucket, &grant.key, grant.expires);
        if !bool::from(expected.as_bytes().ct_eq(grant.signature.as_bytes())) {
            debug!(bucket = %grant.bucket, key = %grant.key, "presigned signature mismatch");
            return VerifyOutcome::InvalidSignature;
        }
        let deadline = grant.expires.saturating_add(self.clock_skew.num_seconds());
        if now.timestamp() > deadline {
            debug!(bucket = %grant.bucket, key = %grant.key, expires = grant.expires, "presigned grant expired");
            return VerifyOutcome::Expired;
        }
        VerifyOutcome::Allow
    }

    fn compute_signature(
        &self,
        method: &http::Method,
        bucket: &str,
        key: &str,
        expires: i64,
    ) -> String {
        let canonical = canonical_string(method, bucket, key, expires);
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).expect("HMAC can accept keys of any length");
        mac.update(canonical.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

/// The string a grant's signature covers.
#[must_use]
pub fn canonical_string(method: &http::Method, bucket: &str, key: &str, expires: i64) -> String {
    format!("{}\n{bucket}\n{key}\n{expires}", method.as_str())
}
