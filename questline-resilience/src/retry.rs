//! Retry executor.
//!
//! Runs an async operation, sleeping between attempts according to a
//! [`Backoff`] schedule, for as long as the policy's predicate classifies the
//! failure as retryable and attempts remain.

use crate::backoff::Backoff;
use questline_core::{Classify, RetryConfig, RetryExhausted};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Decides whether a failure is worth another attempt.
pub type RetryPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Default classification: transport failures, timeouts and the
/// 408/429/500/502/503/504 statuses are retryable; everything else is not.
pub fn is_retryable_by_default<E: Classify>(err: &E) -> bool {
    err.failure_kind().is_transient()
}

/// Immutable retry policy for one call.
#[derive(Clone)]
pub struct RetryPolicy<E> {
    max_retries: u32,
    backoff: Backoff,
    retry_predicate: RetryPredicate<E>,
}

impl<E> fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("backoff", &self.backoff)
            .field("retry_predicate", &"<predicate>")
            .finish()
    }
}

impl<E: Classify + 'static> RetryPolicy<E> {
    /// Policy from configuration, using [`is_retryable_by_default`].
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::with_predicate(config, is_retryable_by_default::<E>)
    }
}

impl<E: Classify + 'static> Default for RetryPolicy<E> {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl<E> RetryPolicy<E> {
    /// Policy from configuration with a caller-supplied predicate.
    pub fn with_predicate<P>(config: &RetryConfig, predicate: P) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        Self {
            max_retries: config.max_retries,
            backoff: Backoff::from(config),
            retry_predicate: Arc::new(predicate),
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Constant delay between attempts, no jitter.
    pub fn with_fixed_delay(self, delay: Duration) -> Self {
        self.with_backoff(Backoff::new(delay, delay, 1.0))
    }

    pub fn with_retry_predicate<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.retry_predicate = Arc::new(predicate);
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    pub fn should_retry(&self, err: &E) -> bool {
        (self.retry_predicate)(err)
    }
}

/// Run `operation` under `policy`.
///
/// A failure the predicate rejects is returned unchanged. Once
/// `max_retries + 1` attempts have failed, the last failure is wrapped in
/// [`RetryExhausted`] and converted into `E`.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy<E>, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<RetryExhausted<E>> + fmt::Display,
{
    let mut attempt: u32 = 0;

    loop {
        let err = match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::debug!(attempts = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if !policy.should_retry(&err) {
            return Err(err);
        }

        if attempt >= policy.max_retries {
            tracing::warn!(
                attempts = attempt + 1,
                error = %err,
                "Retries exhausted"
            );
            return Err(E::from(RetryExhausted {
                attempts: attempt + 1,
                last_error: err,
            }));
        }

        let delay = policy.backoff.delay(attempt);
        tracing::warn!(
            attempt = attempt + 1,
            max_retries = policy.max_retries,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Operation failed, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

/// [`with_retry`] using the default policy for `E`.
pub async fn with_default_retry<T, E, F, Fut>(operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<RetryExhausted<E>> + fmt::Display + Classify + 'static,
{
    with_retry(&RetryPolicy::default(), operation).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use questline_core::{CircuitOpen, QuestlineError, UpstreamError};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn unavailable() -> QuestlineError {
        QuestlineError::from(UpstreamError::Status {
            service: "db".to_string(),
            status: 503,
            message: "unavailable".to_string(),
        })
    }

    fn policy(max_retries: u32) -> RetryPolicy<QuestlineError> {
        RetryPolicy::default()
            .with_max_retries(max_retries)
            .with_fixed_delay(Duration::from_millis(10))
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_calls_once() {
        let calls = &AtomicU32::new(0);
        let result: Result<u32, QuestlineError> = with_retry(&policy(3), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(7)
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_failing_is_exhausted_after_n_plus_one() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), QuestlineError> = with_retry(&policy(4), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(unavailable())
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 5);
        match result {
            Err(QuestlineError::RetryExhausted {
                attempts,
                last_error,
            }) => {
                assert_eq!(attempts, 5);
                assert!(matches!(*last_error, QuestlineError::Upstream(_)));
            }
            other => panic!("expected RetryExhausted, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_means_single_attempt() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), QuestlineError> = with_retry(&policy(0), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(unavailable())
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            result,
            Err(QuestlineError::RetryExhausted { attempts: 1, .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejecting_predicate_returns_original_error() {
        let calls = &AtomicU32::new(0);
        let policy = policy(5).with_retry_predicate(|_| false);
        let result: Result<(), QuestlineError> = with_retry(&policy, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(unavailable())
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(QuestlineError::Upstream(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let calls = &AtomicU32::new(0);
        let result: Result<&str, QuestlineError> = with_retry(&policy(3), move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(unavailable())
            } else {
                Ok("ok")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_circuit_open_is_not_retried_by_default() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), QuestlineError> = with_retry(&policy(3), move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(QuestlineError::from(CircuitOpen {
                name: "source".to_string(),
                retry_in: Duration::from_secs(1),
            }))
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(result, Err(QuestlineError::CircuitOpen(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleeps_follow_backoff_schedule() {
        let policy = RetryPolicy::<QuestlineError>::default()
            .with_max_retries(3)
            .with_backoff(Backoff::new(
                Duration::from_millis(100),
                Duration::from_secs(1),
                2.0,
            ));
        let started = tokio::time::Instant::now();
        let _: Result<(), QuestlineError> =
            with_retry(&policy, || async { Err(unavailable()) }).await;

        // 100 + 200 + 400
        assert_eq!(started.elapsed(), Duration::from_millis(700));
    }

    #[test]
    fn test_default_predicate_classification() {
        assert!(is_retryable_by_default(&unavailable()));
        assert!(is_retryable_by_default(&QuestlineError::from(
            UpstreamError::Transport {
                service: "db".to_string(),
                reason: "connection reset".to_string(),
            }
        )));
        assert!(!is_retryable_by_default(&QuestlineError::from(
            UpstreamError::Status {
                service: "db".to_string(),
                status: 404,
                message: "missing".to_string(),
            }
        )));
    }
}
