//! Questline Resilience - Downstream Call Primitives
//!
//! Backoff, retry, circuit breaking and rate limiting for unreliable
//! dependencies. The primitives are independent values; none calls another
//! internally, so callers compose them in whatever order they need:
//!
//! ```ignore
//! let page = with_retry(&policy, || async {
//!     breaker
//!         .execute(|| limiter.execute(|| source.fetch_page(view, None, 10, 0)))
//!         .await
//! })
//! .await?;
//! ```

pub mod backoff;
pub mod circuit_breaker;
pub mod rate_limiter;
pub mod retry;
pub mod timing;

pub use backoff::{backoff_delay, jittered_delay, Backoff};
pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use rate_limiter::RateLimiter;
pub use retry::{is_retryable_by_default, with_default_retry, with_retry, RetryPolicy, RetryPredicate};
pub use timing::{measure, timed};
