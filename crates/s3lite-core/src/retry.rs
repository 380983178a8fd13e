//! Bounded retry with exponential backoff for storage writes.
//!
//! Only [`S3ServiceError::TransientStorage`] faults are retried. Anything else
//! (not found, access denied, quota) is returned immediately. When the attempt
//! budget is spent the last transient fault is surfaced as
//! [`S3ServiceError::Internal`].

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::config::GatewayConfig;
use crate::error::S3ServiceError;

/// Upper bound on a single backoff sleep.
const MAX_BACKOFF: Duration = Duration::from_secs(1);

/// Retry policy for storage operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. At least 1.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled for each later attempt.
    pub base_delay: Duration,
    /// Cap on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            max_delay: MAX_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Build the policy from gateway configuration.
    #[must_use]
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            max_attempts: config.storage_retry_attempts.max(1),
            base_delay: Duration::from_millis(config.storage_retry_backoff_ms),
            max_delay: MAX_BACKOFF,
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Backoff before attempt `attempt + 1`, where `attempt` starts at 1.
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Run `op`, retrying transient storage faults.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, S3ServiceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, S3ServiceError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    let delay = self.backoff(attempt);
                    warn!(
                        operation,
                        attempt,
                        max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "transient storage fault, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(S3ServiceError::TransientStorage(source)) => {
                    return Err(S3ServiceError::Internal(anyhow::anyhow!(
                        "{operation} failed after {attempt} attempts: {source}"
                    )));
                }
                Err(err) => return Err(err),
            }
        }
    }
}
