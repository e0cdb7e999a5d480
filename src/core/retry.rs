//! Retry and recovery utilities for transient errors.

use crate::core::{Result, TallymanError};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included
    pub max_attempts: u32,
    /// Delay before each retry; the last entry repeats once the schedule runs out
    #[serde(with = "duration_list")]
    pub backoff: Vec<Duration>,
    /// Add up to 10% random delay to prevent thundering herd
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: vec![
                Duration::from_secs(1),
                Duration::from_secs(3),
                Duration::from_secs(5),
            ],
            jitter: false,
        }
    }
}

impl RetryConfig {
    /// A single attempt, never retried.
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let index = (attempt.saturating_sub(1) as usize).min(self.backoff.len().saturating_sub(1));
        self.backoff.get(index).copied().unwrap_or_default()
    }
}

/// Serde adapter for a list of humantime durations (`["1s", "3s", "5s"]`).
mod duration_list {
    use humantime_serde::Serde;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        durations: &[Duration],
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(durations.iter().map(|d| Serde::from(*d)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Vec<Duration>, D::Error> {
        let durations: Vec<Serde<Duration>> = Vec::deserialize(deserializer)?;
        Ok(durations.into_iter().map(Serde::into_inner).collect())
    }
}

/// Execute an operation with retry logic.
///
/// Only recoverable errors are retried. A non-recoverable error is returned
/// unchanged on the attempt that produced it; running out of attempts yields
/// [`TallymanError::Unavailable`] wrapping the last error. `on_retry` is called
/// with the ordinal of every failed attempt that is about to be retried.
///
/// Cancellation happens by dropping the returned future. There is no
/// per-attempt deadline.
pub async fn retry_with_config<F, Fut, T, R>(
    config: &RetryConfig,
    operation: &str,
    mut on_retry: R,
    mut f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    R: FnMut(u32, &TallymanError),
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        match f().await {
            Ok(result) => return Ok(result),
            Err(error) if !error.is_recoverable() => {
                if error.is_validation() {
                    tracing::warn!(operation, error = %error, "validation error reached storage, not retrying");
                }
                return Err(error);
            },
            Err(error) if attempt >= max_attempts => {
                tracing::error!(
                    operation,
                    attempts = attempt,
                    category = error.category(),
                    error = %error,
                    "operation failed after exhausting retries"
                );
                return Err(TallymanError::Unavailable {
                    attempts: attempt,
                    source: Box::new(error),
                });
            },
            Err(error) => {
                let backoff = config.delay_for(attempt);
                let actual_backoff = if config.jitter {
                    let jitter_ms = rand::random::<f64>() * backoff.as_millis() as f64 * 0.1;
                    backoff + Duration::from_millis(jitter_ms as u64)
                } else {
                    backoff
                };

                tracing::warn!(
                    operation,
                    attempt,
                    category = error.category(),
                    error = %error,
                    "Attempt {} failed, retrying in {:?}",
                    attempt,
                    actual_backoff
                );
                on_retry(attempt, &error);

                sleep(actual_backoff).await;
            },
        }
    }
}
