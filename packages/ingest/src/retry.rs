//! Exponential backoff for whole-run retries.
//!
//! Individual upstream calls are never retried; a run that failed entirely
//! (see [`SyncError::TotalFailure`]) is run again from the start after a
//! growing delay.

use std::future::Future;
use std::time::Duration;

use crate::SyncError;

/// Backoff schedule for failed runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each retry.
    pub factor: u32,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    /// 3 retries after 5, 10, and 20 minutes.
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(5 * 60),
            factor: 2,
            max_delay: Duration::from_secs(60 * 60),
        }
    }
}

impl RetryPolicy {
    /// Same retry count as the default, without waiting.
    #[must_use]
    pub const fn immediate() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::ZERO,
            factor: 2,
            max_delay: Duration::ZERO,
        }
    }

    /// Never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::immediate()
        }
    }

    /// Delay before zero-based retry `retry`.
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.initial_delay
            .saturating_mul(self.factor.saturating_pow(retry))
            .min(self.max_delay)
    }
}

/// Runs `operation` until it succeeds, fails with a non-retryable error, or
/// the policy is exhausted.
///
/// Returns the final result together with the number of attempts made.
pub async fn with_retry<F, Fut, T>(
    label: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> (Result<T, SyncError>, u32)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SyncError>>,
{
    let mut attempts = 0;

    loop {
        attempts += 1;
        match operation().await {
            Ok(value) => {
                if attempts > 1 {
                    log::info!("[{label}] Succeeded after {} retries", attempts - 1);
                }
                return (Ok(value), attempts);
            }
            Err(e) if e.is_retryable() && attempts <= policy.max_retries => {
                let delay = policy.delay_for(attempts - 1);
                log::warn!(
                    "[{label}] Attempt {attempts}/{} failed: {e}. Retrying in {delay:?}...",
                    policy.max_retries + 1
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return (Err(e), attempts),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use astro_sync_domain_models::Domain;

    use super::*;

    fn total_failure() -> SyncError {
        SyncError::TotalFailure {
            domain: Domain::Epic,
            attempted: 1,
            last_error: "HTTP 503".to_string(),
        }
    }

    #[test]
    fn default_schedule_doubles_from_five_minutes() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(300));
        assert_eq!(policy.delay_for(1), Duration::from_secs(600));
        assert_eq!(policy.delay_for(2), Duration::from_secs(1200));
        assert_eq!(policy.delay_for(10), Duration::from_secs(3600));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(3600));
    }

    #[tokio::test(start_paused = true)]
    async fn total_failures_are_retried_then_returned() {
        let calls = AtomicU32::new(0);
        let start = tokio::time::Instant::now();

        let (result, attempts) = with_retry("epic", &RetryPolicy::default(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(total_failure()) }
        })
        .await;

        assert!(matches!(result, Err(SyncError::TotalFailure { .. })));
        assert_eq!(attempts, 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(start.elapsed(), Duration::from_secs(300 + 600 + 1200));
    }

    #[tokio::test]
    async fn success_after_a_failure_stops_retrying() {
        let calls = AtomicU32::new(0);
        let (result, attempts) = with_retry("epic", &RetryPolicy::immediate(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { if n == 0 { Err(total_failure()) } else { Ok(n) } }
        })
        .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(attempts, 2);
    }

    #[tokio::test]
    async fn configuration_errors_are_not_retried() {
        let (result, attempts) = with_retry("epic", &RetryPolicy::immediate(), || async {
            Err::<(), _>(SyncError::UnknownUpstream {
                domain: Domain::Epic,
                upstream: "nasa".to_string(),
            })
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts, 1);
    }
}
