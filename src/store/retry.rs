//! Bounded, jittered retry around store calls.
//!
//! Every attempt is capped by the store timeout. Only [`StoreError::is_transient`]
//! failures are retried; everything else is returned on the first occurrence.

use super::StoreError;
use crate::config::StoreConfig;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    /// Upper bound on one attempt.
    pub timeout: Duration,
}

impl RetryPolicy {
    /// A single attempt with the given timeout.
    pub fn no_retry(timeout: Duration) -> Self {
        Self {
            attempts: 1,
            backoff_base: Duration::ZERO,
            backoff_max: Duration::ZERO,
            timeout,
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let exp = self
            .backoff_base
            .saturating_mul(1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX));
        let capped = exp.min(self.backoff_max);
        let jitter_ms = capped.as_millis() as u64 / 2;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
        };
        capped + jitter
    }
}

impl From<&StoreConfig> for RetryPolicy {
    fn from(config: &StoreConfig) -> Self {
        Self {
            attempts: config.retry_attempts.max(1),
            backoff_base: Duration::from_millis(config.backoff_base_ms),
            backoff_max: Duration::from_millis(config.backoff_max_ms),
            timeout: config.timeout(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&StoreConfig::default())
    }
}

/// Runs `call` until it succeeds, fails permanently, or the attempts run out.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &'static str,
    mut call: F,
) -> Result<T, StoreError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let error = match bounded(policy.timeout, call()).await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if !error.is_transient() || attempt >= policy.attempts {
            if error.is_transient() {
                warn!(operation, attempt, error = %error, "Store call failed, giving up");
            }
            return Err(error);
        }

        let delay = policy.backoff(attempt);
        debug!(operation, attempt, ?delay, error = %error, "Retrying store call");
        tokio::time::sleep(delay).await;
    }
}

/// Caps a single store call at `timeout`.
pub async fn bounded<T, Fut>(timeout: Duration, call: Fut) -> Result<T, StoreError>
where
    Fut: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(timeout)),
    }
}
