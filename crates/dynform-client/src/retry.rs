use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};
use tracing::{debug, warn};

use crate::error::FetchError;

/// Half-open status range `[from, to)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRange {
    pub from: u16,
    pub to: u16,
}

impl StatusRange {
    pub fn contains(&self, status: u16) -> bool {
        status >= self.from && status < self.to
    }
}

impl Default for StatusRange {
    fn default() -> Self {
        Self { from: 400, to: 500 }
    }
}

/// Which failures are retried, and how many times.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt for the field list and choice sets.
    pub metadata_retries: u32,
    /// Retries after the first attempt for `POST /save`.
    pub submission_retries: u32,
    pub non_retryable_status: StatusRange,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "base_delay_ms")]
    pub base_delay: Duration,
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "max_delay_ms")]
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            metadata_retries: 3,
            submission_retries: 1,
            non_retryable_status: StatusRange::default(),
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn is_retryable(&self, err: &FetchError) -> bool {
        match err {
            FetchError::Status { status, .. } => !self.non_retryable_status.contains(*status),
            FetchError::Timeout | FetchError::Network(_) => true,
            FetchError::Decode(_) | FetchError::Url(_) => false,
        }
    }

    /// Delay before retry number `retry` (zero-based), doubling up to `max_delay`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Runs `call` until it succeeds, fails with a non-retryable error, or `retries` is spent.
///
/// Each attempt is bounded by `timeout`; an elapsed attempt counts as [`FetchError::Timeout`].
pub async fn run_with_retry<T, F, Fut>(
    operation: &str,
    policy: &RetryPolicy,
    retries: u32,
    timeout: Duration,
    mut call: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut attempt = 0u32;
    loop {
        debug!(operation, attempt = attempt + 1, "sending request");
        let err = match tokio::time::timeout(timeout, call()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) => err,
            Err(_) => FetchError::Timeout,
        };

        if !policy.is_retryable(&err) {
            warn!(operation, attempt = attempt + 1, error = %err, "request failed; not retryable");
            return Err(err);
        }
        if attempt >= retries {
            warn!(operation, attempts = attempt + 1, error = %err, "request failed; retries exhausted");
            return Err(err);
        }

        let delay = policy.delay_for(attempt);
        warn!(
            operation,
            attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "request failed; retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
