//! Gateway configuration.
//!
//! Provides [`GatewayConfig`] for configuring the s3lite gateway. Values are
//! loaded from `S3LITE_*` environment variables on top of built-in defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Gateway configuration.
///
/// All fields have defaults suitable for local development. Configuration can
/// be loaded from environment variables via [`GatewayConfig::from_env`].
///
/// # Examples
///
/// ```
/// use s3lite_core::config::GatewayConfig;
///
/// let config = GatewayConfig::default();
/// assert_eq!(config.listen_addr, "0.0.0.0:9000");
/// assert_eq!(config.min_part_size, 5 * 1024 * 1024);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Bind address for the HTTP listener.
    #[builder(default = String::from("0.0.0.0:9000"))]
    pub listen_addr: String,

    /// Domain used to resolve virtual-hosted-style bucket addressing.
    #[builder(default = String::from("s3.localhost"))]
    pub domain: String,

    /// Whether virtual-hosted-style addressing is enabled.
    #[builder(default = true)]
    pub virtual_hosting: bool,

    /// Secret used to sign presigned URLs. Empty means "generate at startup".
    #[serde(skip_serializing, default)]
    #[builder(default)]
    pub presign_secret: String,

    /// Tolerated clock skew (seconds) when checking presigned URL expiry.
    #[builder(default = 0)]
    pub presign_clock_skew_secs: u64,

    /// Maximum blob size (bytes) kept in memory before spilling to disk.
    #[builder(default = 524_288)]
    pub max_memory_object_size: usize,

    /// Largest request body (bytes) the HTTP layer will buffer.
    #[builder(default = 5_368_709_120)]
    pub max_body_size: u64,

    /// Minimum size (bytes) of every multipart part except the last.
    #[builder(default = 5_242_880)]
    pub min_part_size: u64,

    /// Age (seconds) after which an unfinished multipart upload is reclaimed.
    #[builder(default = 86_400)]
    pub multipart_ttl_secs: u64,

    /// Interval (seconds) between background upload reclamation sweeps.
    #[builder(default = 60)]
    pub reaper_interval_secs: u64,

    /// Maximum number of stored objects per bucket (0 = unlimited).
    #[builder(default = 0)]
    pub bucket_max_objects: u64,

    /// Maximum number of stored bytes per bucket (0 = unlimited).
    #[builder(default = 0)]
    pub bucket_max_bytes: u64,

    /// Attempts made for a storage write before giving up.
    #[builder(default = 3)]
    pub storage_retry_attempts: u32,

    /// Base backoff (milliseconds) between storage write attempts.
    #[builder(default = 10)]
    pub storage_retry_backoff_ms: u64,

    /// Upper bound (seconds) on handling a single request.
    #[builder(default = 300)]
    pub request_timeout_secs: u64,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl GatewayConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `S3LITE_LISTEN` | `0.0.0.0:9000` |
    /// | `S3LITE_DOMAIN` | `s3.localhost` |
    /// | `S3LITE_VIRTUAL_HOSTING` | `true` |
    /// | `S3LITE_PRESIGN_SECRET` | *(generated)* |
    /// | `S3LITE_PRESIGN_CLOCK_SKEW` | `0` |
    /// | `S3LITE_MAX_MEMORY_OBJECT_SIZE` | `524288` |
    /// | `S3LITE_MAX_BODY_SIZE` | `5368709120` |
    /// | `S3LITE_MIN_PART_SIZE` | `5242880` |
    /// | `S3LITE_MULTIPART_TTL` | `86400` |
    /// | `S3LITE_REAPER_INTERVAL` | `60` |
    /// | `S3LITE_BUCKET_MAX_OBJECTS` | `0` |
    /// | `S3LITE_BUCKET_MAX_BYTES` | `0` |
    /// | `S3LITE_STORAGE_RETRIES` | `3` |
    /// | `S3LITE_STORAGE_RETRY_BACKOFF_MS` | `10` |
    /// | `S3LITE_REQUEST_TIMEOUT` | `300` |
    /// | `LOG_LEVEL` | `info` |
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("S3LITE_LISTEN") {
            config.listen_addr = v;
        }
        if let Ok(v) = std::env::var("S3LITE_DOMAIN") {
            config.domain = v;
        }
        if let Ok(v) = std::env::var("S3LITE_VIRTUAL_HOSTING") {
            config.virtual_hosting = parse_bool(&v);
        }
        if let Ok(v) = std::env::var("S3LITE_PRESIGN_SECRET") {
            config.presign_secret = v;
        }
        override_number("S3LITE_PRESIGN_CLOCK_SKEW", &mut config.presign_clock_skew_secs);
        override_number(
            "S3LITE_MAX_MEMORY_OBJECT_SIZE",
            &mut config.max_memory_object_size,
        );
        override_number("S3LITE_MAX_BODY_SIZE", &mut config.max_body_size);
        override_number("S3LITE_MIN_PART_SIZE", &mut config.min_part_size);
        override_number("S3LITE_MULTIPART_TTL", &mut config.multipart_ttl_secs);
        override_number("S3LITE_REAPER_INTERVAL", &mut config.reaper_interval_secs);
        override_number("S3LITE_BUCKET_MAX_OBJECTS", &mut config.bucket_max_objects);
        override_number("S3LITE_BUCKET_MAX_BYTES", &mut config.bucket_max_bytes);
        override_number("S3LITE_STORAGE_RETRIES", &mut config.storage_retry_attempts);
        override_number(
            "S3LITE_STORAGE_RETRY_BACKOFF_MS",
            &mut config.storage_retry_backoff_ms,
        );
        override_number("S3LITE_REQUEST_TIMEOUT", &mut config.request_timeout_secs);
        if let Ok(v) = std::env::var("LOG_LEVEL") {
            config.log_level = v;
        }

        config
    }

    /// Multipart upload time-to-live.
    #[must_use]
    pub fn multipart_ttl(&self) -> Duration {
        Duration::from_secs(self.multipart_ttl_secs)
    }

    /// Interval between reaper sweeps. Never zero.
    #[must_use]
    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_secs.max(1))
    }

    /// Per-request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Per-bucket object count limit, if any.
    #[must_use]
    pub fn object_limit(&self) -> Option<u64> {
        (self.bucket_max_objects > 0).then_some(self.bucket_max_objects)
    }

    /// Per-bucket byte limit, if any.
    #[must_use]
    pub fn byte_limit(&self) -> Option<u64> {
        (self.bucket_max_bytes > 0).then_some(self.bucket_max_bytes)
    }
}

/// Overwrite `target` with the parsed value of `var`, keeping the default on
/// absence or parse failure.
fn override_number<T: std::str::FromStr>(var: &str, target: &mut T) {
    if let Ok(v) = std::env::var(var) {
        if let Ok(n) = v.parse::<T>() {
            *target = n;
        }
    }
}

/// Parse a string as a boolean, accepting `"1"` and `"true"` (case-insensitive).
fn parse_bool(value: &str) -> bool {
    value == "1" || value.eq_ignore_ascii_case("true")
}
