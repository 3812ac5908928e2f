//! Sliding-window rate limiter.
//!
//! At most `max_requests` admissions in any trailing `window`. Callers over
//! the limit are delayed, never rejected. Admission order is FIFO: waiters
//! queue on a fair `tokio::sync::Mutex` that is held for the admission
//! decision and the wait, and released before the operation runs.

use questline_core::RateLimiterConfig;
use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    call_timestamps: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// A `max_requests` of zero is treated as one.
    pub fn new(config: RateLimiterConfig) -> Self {
        let max_requests = config.max_requests.max(1) as usize;
        Self {
            max_requests,
            window: config.window,
            call_timestamps: Mutex::new(VecDeque::with_capacity(max_requests)),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(RateLimiterConfig::default())
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Wait for a slot and record the admission.
    pub async fn acquire(&self) {
        let mut timestamps = self.call_timestamps.lock().await;
        let now = Instant::now();
        prune(&mut timestamps, now, self.window);

        if timestamps.len() >= self.max_requests {
            if let Some(&oldest) = timestamps.front() {
                let wait = self
                    .window
                    .saturating_sub(now.saturating_duration_since(oldest));
                if !wait.is_zero() {
                    tracing::debug!(
                        wait_ms = wait.as_millis() as u64,
                        in_window = timestamps.len(),
                        "Rate limit reached, delaying call"
                    );
                    tokio::time::sleep(wait).await;
                }
            }
            prune(&mut timestamps, Instant::now(), self.window);
        }

        timestamps.push_back(Instant::now());
    }

    /// Run `operation` once a slot is available.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.acquire().await;
        operation().await
    }

    /// Admissions recorded inside the current window.
    pub async fn in_window(&self) -> usize {
        let mut timestamps = self.call_timestamps.lock().await;
        prune(&mut timestamps, Instant::now(), self.window);
        timestamps.len()
    }
}

fn prune(timestamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&front) = timestamps.front() {
        if now.saturating_duration_since(front) >= window {
            timestamps.pop_front();
        } else {
            break;
        }
    }
}
