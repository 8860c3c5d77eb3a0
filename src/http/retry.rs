//! Bounded retry with exponential backoff
//!
//! One policy shared by every source. Sources differ only in their
//! parameters, see [`RetryPolicy::for_source`].

use rand::Rng;
use std::future::Future;
use std::time::Duration;

use super::FetchError;
use crate::sources::Source;

/// Configuration for retry behavior on transient upstream errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts are `max_retries + 1`
    pub max_retries: u32,
    /// Delay before the first retry; doubled on each subsequent retry
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Randomize each delay within `[delay / 2, delay]`
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Retry parameters for a given upstream source
    ///
    /// The Exoplanet Archive throttles aggressively, so it starts from a
    /// longer base delay.
    pub fn for_source(source: Source) -> Self {
        match source {
            Source::Exoplanets => Self {
                base_delay: Duration::from_secs(2),
                ..Self::default()
            },
            Source::Missions | Source::Satellites => Self::default(),
        }
    }

    /// A policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// A policy that retries immediately, for tests and offline tooling
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: false,
        }
    }

    /// Delay before retry number `retry` (0-based), ignoring jitter
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    fn delay_for(&self, retry: u32, err: &FetchError) -> Duration {
        if let FetchError::RateLimited { retry_after_secs } = err {
            return Duration::from_secs(*retry_after_secs).min(self.max_delay);
        }
        let delay = self.backoff(retry);
        if self.jitter && !delay.is_zero() {
            let half = delay / 2;
            rand::thread_rng().gen_range(half..=delay)
        } else {
            delay
        }
    }
}

/// Runs `request_fn` until it succeeds, fails permanently, or retries run out
///
/// Only errors for which [`FetchError::is_retryable`] holds are retried.
/// When retries are exhausted the last error is returned.
pub async fn fetch_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    mut request_fn: F,
) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut retry = 0;
    loop {
        match request_fn().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && retry < policy.max_retries => {
                let delay = policy.delay_for(retry, &err);
                tracing::debug!(
                    attempt = retry + 1,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying request"
                );
                tokio::time::sleep(delay).await;
                retry += 1;
            }
            Err(err) => {
                if err.is_retryable() {
                    tracing::warn!(attempts = retry + 1, error = %err, "retries exhausted");
                }
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn server_error() -> FetchError {
        FetchError::Status {
            status: 503,
            message: "unavailable".to_string(),
        }
    }

    #[tokio::test]
    async fn test_always_failing_request_is_attempted_max_retries_plus_one() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::immediate(3);

        let result: Result<(), _> = fetch_with_retry(&policy, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(server_error()) }
        })
        .await;

        assert!(matches!(result, Err(FetchError::Status { status: 503, .. })));
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_non_retryable_error_propagates_immediately() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::immediate(5);

        let result: Result<(), _> = fetch_with_retry(&policy, || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async {
                Err(FetchError::Status {
                    status: 404,
                    message: "not found".to_string(),
                })
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::immediate(3);

        let result = fetch_with_retry(&policy, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(FetchError::Timeout("deadline".to_string()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_last_error_is_returned() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::immediate(1);

        let result: Result<(), _> = fetch_with_retry(&policy, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move { Err(FetchError::Network(format!("attempt {}", n))) }
        })
        .await;

        match result {
            Err(FetchError::Network(msg)) => assert_eq!(msg, "attempt 1"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_backoff_is_exponential_and_capped() {
        let policy = RetryPolicy {
            max_retries: 10,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(10),
            jitter: false,
        };
        assert_eq!(policy.backoff(0), Duration::from_millis(1000));
        assert_eq!(policy.backoff(1), Duration::from_millis(2000));
        assert_eq!(policy.backoff(2), Duration::from_millis(4000));
        assert_eq!(policy.backoff(3), Duration::from_millis(8000));
        assert_eq!(policy.backoff(4), Duration::from_secs(10));
        assert_eq!(policy.backoff(40), Duration::from_secs(10));
    }

    #[test]
    fn test_jittered_delay_stays_within_bounds() {
        let policy = RetryPolicy::default();
        for _ in 0..50 {
            let delay = policy.delay_for(2, &server_error());
            assert!(delay >= Duration::from_secs(2) && delay <= Duration::from_secs(4));
        }
    }

    #[test]
    fn test_rate_limit_delay_honours_retry_after_up_to_cap() {
        let policy = RetryPolicy::default();
        let short = FetchError::RateLimited { retry_after_secs: 3 };
        let long = FetchError::RateLimited { retry_after_secs: 600 };
        assert_eq!(policy.delay_for(0, &short), Duration::from_secs(3));
        assert_eq!(policy.delay_for(0, &long), Duration::from_secs(10));
    }

    #[test]
    fn test_source_policies() {
        assert_eq!(
            RetryPolicy::for_source(Source::Exoplanets).base_delay,
            Duration::from_secs(2)
        );
        assert_eq!(
            RetryPolicy::for_source(Source::Missions).base_delay,
            Duration::from_secs(1)
        );
        assert_eq!(RetryPolicy::for_source(Source::Satellites).max_retries, 3);
    }
}
