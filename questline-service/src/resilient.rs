//! Resilient data source wrapper.
//!
//! Wraps any [`LeaderboardSource`] so every call runs through, outermost
//! first: retry, circuit breaker, rate limiter. The wrapper exposes the same
//! trait, so the rank engine uses it unchanged.

use ::async_trait::async_trait;
use questline_core::{EntityId, QuestlineError, QuestlineResult, RankView, ScoredEntity};
use questline_rank::LeaderboardSource;
use questline_resilience::{timed, with_retry, CircuitBreaker, RateLimiter, RetryPolicy};
use std::future::Future;
use std::sync::Arc;

pub struct ResilientSource<S> {
    inner: Arc<S>,
    retry: RetryPolicy<QuestlineError>,
    breaker: Arc<CircuitBreaker>,
    limiter: Arc<RateLimiter>,
}

impl<S> ResilientSource<S> {
    pub fn new(
        inner: Arc<S>,
        retry: RetryPolicy<QuestlineError>,
        breaker: Arc<CircuitBreaker>,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        Self {
            inner,
            retry,
            breaker,
            limiter,
        }
    }

    /// The wrapped source, for direct (unprotected) access such as writes.
    pub fn inner(&self) -> &Arc<S> {
        &self.inner
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    async fn call<T, F, Fut>(&self, operation: &'static str, op: F) -> QuestlineResult<T>
    where
        F: Fn() -> Fut + Sync,
        Fut: Future<Output = QuestlineResult<T>> + Send,
        T: Send,
    {
        let breaker = &*self.breaker;
        let limiter = &*self.limiter;
        let op = &op;

        // Each attempt is timed; retry sits outside the breaker.
        let attempt = timed(operation, move || async move {
            breaker.execute(|| limiter.execute(op)).await
        });
        let result = with_retry(&self.retry, attempt).await;

        match &result {
            Ok(_) => tracing::trace!(operation, "Source call succeeded"),
            Err(e) => tracing::warn!(operation, error = %e, "Source call failed"),
        }
        result
    }
}

#[async_trait]
impl<S: LeaderboardSource> LeaderboardSource for ResilientSource<S> {
    async fn fetch_page(
        &self,
        view: RankView,
        domain: Option<&str>,
        limit: u32,
        offset: u64,
    ) -> QuestlineResult<Vec<ScoredEntity>> {
        self.call("fetch_page", move || {
            self.inner.fetch_page(view, domain, limit, offset)
        })
        .await
    }

    async fn fetch_population_size(
        &self,
        view: RankView,
        domain: Option<&str>,
    ) -> QuestlineResult<u64> {
        self.call("fetch_population_size", move || {
            self.inner.fetch_population_size(view, domain)
        })
        .await
    }

    async fn fetch_by_id(
        &self,
        view: RankView,
        id: EntityId,
        domain: Option<&str>,
    ) -> QuestlineResult<Option<ScoredEntity>> {
        self.call("fetch_by_id", move || self.inner.fetch_by_id(view, id, domain))
            .await
    }

    async fn count_ahead(
        &self,
        view: RankView,
        entity: &ScoredEntity,
        domain: Option<&str>,
    ) -> QuestlineResult<u64> {
        self.call("count_ahead", move || {
            self.inner.count_ahead(view, entity, domain)
        })
        .await
    }
}
