use std::future::Future;

use tokio::time::{sleep, timeout, Duration};
use tracing::{error, warn};

use crate::error::FetchError;
use crate::utils::constants::{DEFAULT_BACKOFF_MS, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT_MS};

/// Per-call retry configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// extra attempts after the first
    pub max_retries: u32,
    /// linear multiplier, attempt n waits n * backoff_ms
    pub backoff_ms: u64,
    /// wall-clock budget of one attempt
    pub timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_ms: DEFAULT_BACKOFF_MS,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_ms: u64, timeout_ms: u64) -> Self {
        Self { max_retries, backoff_ms, timeout_ms }
    }

    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Linear, not exponential.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_ms.saturating_mul(attempt as u64))
    }

    /// Bound one attempt. Expiry drops `operation`, which aborts its in-flight
    /// request, and counts as a failed attempt.
    pub async fn with_attempt_timeout<Fut, T>(&self, operation: Fut) -> Result<T, FetchError>
    where
        Fut: Future<Output = Result<T, FetchError>>,
    {
        timeout(Duration::from_millis(self.timeout_ms), operation)
            .await
            .unwrap_or(Err(FetchError::AttemptTimeout { timeout_ms: self.timeout_ms }))
    }

    /// Run `operation` up to `max_retries + 1` times, strictly one after the
    /// other. Returns the first success, or the error of the final attempt.
    pub async fn run_with_retry<F, Fut, T>(&self, mut operation: F) -> Result<T, FetchError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let total = self.total_attempts();
        let mut attempt: u32 = 0;

        loop {
            if attempt > 0 {
                sleep(self.backoff_for(attempt)).await;
            }
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_retries => {
                    warn!("Attempt {}/{} failed: {e}", attempt + 1, total);
                }
                Err(e) => {
                    error!("all {total} attempts failed: {e}");
                    return Err(e);
                }
            }
            attempt += 1;
        }
    }
}
