//! Circuit breaker for degraded dependencies.
//!
//! Three-state failure gate. While open, calls fail fast with
//! [`CircuitOpen`] and the wrapped operation is never invoked. After the
//! recovery timeout a single trial call is admitted; its outcome closes or
//! re-opens the circuit.
//!
//! ```text
//! Closed ── failures >= threshold ──→ Open ── recovery timeout ──→ HalfOpen
//!   ↑                                  ↑                              │
//!   └──────────── trial success ───────┼────── trial failure ─────────┘
//! ```

use questline_core::{CircuitBreakerConfig, CircuitOpen};
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Operating normally
    Closed,
    /// Rejecting calls until the recovery timeout elapses
    Open,
    /// Letting a single trial call through
    HalfOpen,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
    trial_in_flight: bool,
}

/// How a call was admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Normal,
    Trial,
}

/// Three-state circuit breaker. Cheap to share behind an `Arc`.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    /// Create a breaker with the given name (used in errors and logs).
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                last_failure_at: None,
                trial_in_flight: false,
            }),
        }
    }

    /// Create a breaker with default thresholds.
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, CircuitBreakerConfig::default())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state. An open breaker whose timeout has elapsed still reports
    /// `Open` until the next call moves it to `HalfOpen`.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    /// Force the breaker back to closed with a zero failure count.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.state = CircuitState::Closed;
        state.consecutive_failures = 0;
        state.last_failure_at = None;
        state.trial_in_flight = false;
        tracing::info!(circuit = %self.name, "Circuit manually reset");
    }

    /// Run `operation` through the breaker.
    ///
    /// Fails with [`CircuitOpen`] (converted into `E`) without invoking the
    /// operation while the circuit is open or a half-open trial is running.
    /// Every `Err` returned by the operation counts as a failure.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<CircuitOpen>,
    {
        let admission = self.admit().map_err(E::from)?;
        let mut guard = TrialGuard {
            breaker: self,
            armed: admission == Admission::Trial,
        };

        let result = operation().await;
        guard.armed = false;

        match &result {
            Ok(_) => self.on_success(admission),
            Err(_) => self.on_failure(admission),
        }
        result
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        // State is plain data; a panic elsewhere cannot leave it torn.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn admit(&self) -> Result<Admission, CircuitOpen> {
        let mut state = self.lock();
        match state.state {
            CircuitState::Closed => Ok(Admission::Normal),
            CircuitState::Open => {
                let elapsed = state
                    .last_failure_at
                    .map(|at| Instant::now().saturating_duration_since(at))
                    .unwrap_or(Duration::MAX);

                if elapsed >= self.config.recovery_timeout {
                    state.state = CircuitState::HalfOpen;
                    state.trial_in_flight = true;
                    tracing::info!(circuit = %self.name, "Circuit half-open, admitting trial call");
                    Ok(Admission::Trial)
                } else {
                    Err(CircuitOpen {
                        name: self.name.clone(),
                        retry_in: self.config.recovery_timeout - elapsed,
                    })
                }
            }
            CircuitState::HalfOpen => {
                if state.trial_in_flight {
                    Err(CircuitOpen {
                        name: self.name.clone(),
                        retry_in: Duration::ZERO,
                    })
                } else {
                    state.trial_in_flight = true;
                    Ok(Admission::Trial)
                }
            }
        }
    }

    fn on_success(&self, admission: Admission) {
        let mut state = self.lock();
        match (state.state, admission) {
            (CircuitState::HalfOpen, Admission::Trial) => {
                state.state = CircuitState::Closed;
                state.consecutive_failures = 0;
                state.trial_in_flight = false;
                tracing::info!(circuit = %self.name, "Trial call succeeded, circuit closed");
            }
            (CircuitState::Closed, _) => {
                state.consecutive_failures = 0;
            }
            // Only the trial decides a half-open circuit; calls admitted
            // before the circuit opened may finish late.
            (CircuitState::HalfOpen, Admission::Normal) | (CircuitState::Open, _) => {}
        }
    }

    fn on_failure(&self, admission: Admission) {
        let mut state = self.lock();
        match (state.state, admission) {
            (CircuitState::Closed, _) => {
                state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                state.last_failure_at = Some(Instant::now());
                if state.consecutive_failures >= self.config.failure_threshold {
                    state.state = CircuitState::Open;
                    tracing::warn!(
                        circuit = %self.name,
                        consecutive_failures = state.consecutive_failures,
                        recovery_timeout_ms = self.config.recovery_timeout.as_millis() as u64,
                        "Failure threshold reached, circuit opened"
                    );
                }
            }
            (CircuitState::HalfOpen, Admission::Trial) => {
                state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                state.last_failure_at = Some(Instant::now());
                state.state = CircuitState::Open;
                state.trial_in_flight = false;
                tracing::warn!(circuit = %self.name, "Trial call failed, circuit re-opened");
            }
            (CircuitState::Open, _) => {
                state.last_failure_at = Some(Instant::now());
            }
            (CircuitState::HalfOpen, Admission::Normal) => {}
        }
    }
}

/// Releases the half-open trial slot if the trial future is dropped before
/// it completes.
struct TrialGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut state = self.breaker.lock();
            if state.state == CircuitState::HalfOpen {
                state.trial_in_flight = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use questline_core::{QuestlineError, UpstreamError};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn breaker(threshold: u32, recovery_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold: threshold,
                recovery_timeout: Duration::from_millis(recovery_ms),
            },
        )
    }

    fn boom() -> QuestlineError {
        QuestlineError::from(UpstreamError::Transport {
            service: "db".to_string(),
            reason: "connection refused".to_string(),
        })
    }

    async fn fail(breaker: &CircuitBreaker, calls: &AtomicU32) -> Result<(), QuestlineError> {
        breaker
            .execute(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(boom())
            })
            .await
    }

    async fn succeed(breaker: &CircuitBreaker, calls: &AtomicU32) -> Result<(), QuestlineError> {
        breaker
            .execute(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
    }

    #[tokio::test(start_paused = true)]
    async fn test_opens_after_threshold_and_rejects_without_invoking() {
        let breaker = breaker(3, 1_000);
        let calls = AtomicU32::new(0);

        for _ in 0..3 {
            assert!(matches!(
                fail(&breaker, &calls).await,
                Err(QuestlineError::Upstream(_))
            ));
        }
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(breaker.consecutive_failures(), 3);

        let result = succeed(&breaker, &calls).await;
        assert!(matches!(result, Err(QuestlineError::CircuitOpen(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3, "wrapped op must not run");
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_in_closed_resets_count() {
        let breaker = breaker(3, 1_000);
        let calls = AtomicU32::new(0);

        let _ = fail(&breaker, &calls).await;
        let _ = fail(&breaker, &calls).await;
        assert_eq!(breaker.consecutive_failures(), 2);

        succeed(&breaker, &calls).await.unwrap();
        assert_eq!(breaker.consecutive_failures(), 0);

        let _ = fail(&breaker, &calls).await;
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trial_success_closes() {
        let breaker = breaker(2, 1_000);
        let calls = AtomicU32::new(0);
        let _ = fail(&breaker, &calls).await;
        let _ = fail(&breaker, &calls).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        tokio::time::advance(Duration::from_millis(1_000)).await;

        succeed(&breaker, &calls).await.unwrap();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.consecutive_failures(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trial_failure_reopens() {
        let breaker = breaker(2, 1_000);
        let calls = AtomicU32::new(0);
        let _ = fail(&breaker, &calls).await;
        let _ = fail(&breaker, &calls).await;

        tokio::time::advance(Duration::from_millis(1_500)).await;
        assert!(matches!(
            fail(&breaker, &calls).await,
            Err(QuestlineError::Upstream(_))
        ));
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        // The failure refreshed the timer; still rejected shortly after
        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(matches!(
            succeed(&breaker, &calls).await,
            Err(QuestlineError::CircuitOpen(_))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_still_open_before_timeout() {
        let breaker = breaker(1, 1_000);
        let calls = AtomicU32::new(0);
        let _ = fail(&breaker, &calls).await;

        tokio::time::advance(Duration::from_millis(999)).await;
        match succeed(&breaker, &calls).await {
            Err(QuestlineError::CircuitOpen(open)) => {
                assert_eq!(open.name, "test");
                assert_eq!(open.retry_in, Duration::from_millis(1));
            }
            other => panic!("expected CircuitOpen, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_half_open_admits_exactly_one_trial() {
        let breaker = Arc::new(breaker(1, 100));
        let calls = Arc::new(AtomicU32::new(0));
        let _ = fail(&breaker, &calls).await;
        tokio::time::advance(Duration::from_millis(100)).await;

        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let trial = {
            let breaker = Arc::clone(&breaker);
            let calls = Arc::clone(&calls);
            tokio::spawn(async move {
                breaker
                    .execute(move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        let _ = release_rx.await;
                        Ok::<_, QuestlineError>(())
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        let concurrent = succeed(&breaker, &calls).await;
        assert!(matches!(concurrent, Err(QuestlineError::CircuitOpen(_))));

        release_tx.send(()).unwrap();
        trial.await.unwrap().unwrap();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_normal_call_does_not_decide_trial() {
        let breaker = Arc::new(breaker(1, 100));
        let calls = Arc::new(AtomicU32::new(0));

        let (slow_tx, slow_rx) = tokio::sync::oneshot::channel::<()>();
        let slow = {
            let breaker = Arc::clone(&breaker);
            tokio::spawn(async move {
                breaker
                    .execute(move || async move {
                        let _ = slow_rx.await;
                        Ok::<_, QuestlineError>(())
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;

        let _ = fail(&breaker, &calls).await;
        assert_eq!(breaker.state(), CircuitState::Open);
        tokio::time::advance(Duration::from_millis(100)).await;

        let (trial_tx, trial_rx) = tokio::sync::oneshot::channel::<()>();
        let trial = {
            let breaker = Arc::clone(&breaker);
            tokio::spawn(async move {
                breaker
                    .execute(move || async move {
                        let _ = trial_rx.await;
                        Err::<(), _>(boom())
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        slow_tx.send(()).unwrap();
        slow.await.unwrap().unwrap();
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        let during_trial = succeed(&breaker, &calls).await;
        assert!(matches!(during_trial, Err(QuestlineError::CircuitOpen(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        trial_tx.send(()).unwrap();
        assert!(trial.await.unwrap().is_err());
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset() {
        let breaker = breaker(1, 60_000);
        let calls = AtomicU32::new(0);
        let _ = fail(&breaker, &calls).await;
        assert_eq!(breaker.state(), CircuitState::Open);

        breaker.reset();
        assert_eq!(breaker.state(), CircuitState::Closed);
        succeed(&breaker, &calls).await.unwrap();
    }
}
