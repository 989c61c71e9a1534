//! Polling helper for records the backend has not provisioned yet.
//!
//! Right after sign-up the backend creates the user asynchronously, so the
//! first reads can return `NotFound`. Only `NotFound` is retried here; every
//! other error returns immediately.

use std::future::Future;
use std::time::Duration;

use crate::error::ApiError;
use crate::storage::ApiConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    /// Upper bound for a single backoff step.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &ApiConfig) -> Self {
        Self {
            max_attempts: config.provisioning_attempts,
            initial_delay: Duration::from_millis(config.provisioning_delay_ms),
            ..Self::default()
        }
    }
}

/// Runs `op` until it stops returning `NotFound` or attempts run out,
/// doubling the delay between attempts.
pub async fn poll_until_provisioned<T, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T, ApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut delay = policy.initial_delay;

    for attempt in 1..=attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(ApiError::NotFound) => {
                tracing::debug!(attempt, attempts, "record not provisioned yet");
                if attempt < attempts {
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(policy.max_delay);
                }
            }
            Err(e) => return Err(e),
        }
    }
    Err(ApiError::NotFound)
}
