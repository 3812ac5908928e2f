//! Questline Test Utilities
//!
//! Shared test infrastructure for the Questline workspace:
//! - A scripted failing data source for resilience tests
//! - Proptest generators for ranked populations
//! - Leaderboard fixtures for common scenarios
//! - Assertions for Questline-specific results

// Re-export core types for convenience
pub use questline_core::{
    CacheConfig, CircuitBreakerConfig, EntityId, LeaderboardPage, QuestlineConfig,
    QuestlineError, QuestlineResult, RankConfig, RankView, RankedEntry, RateLimiterConfig,
    RetryConfig, ScoredEntity, SweepConfig, Timestamp, UpstreamError, ValidationError,
};
pub use questline_rank::{InMemoryLeaderboard, LeaderboardSource, Member};

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};

// ============================================================================
// SCRIPTED SOURCES
// ============================================================================

/// Wraps a source and fails the next `failures` calls with `error`, then
/// delegates. Every call is counted, failed or not.
#[derive(Debug)]
pub struct FlakySource<S> {
    inner: S,
    failures_remaining: AtomicU32,
    error: UpstreamError,
    calls: AtomicU32,
}

impl<S> FlakySource<S> {
    pub fn new(inner: S, failures: u32, error: UpstreamError) -> Self {
        Self {
            inner,
            failures_remaining: AtomicU32::new(failures),
            error,
            calls: AtomicU32::new(0),
        }
    }

    /// Never recovers unless [`set_failures`](Self::set_failures) is called.
    pub fn always_failing(inner: S, error: UpstreamError) -> Self {
        Self::new(inner, u32::MAX, error)
    }

    /// Pass-through that only counts calls.
    pub fn healthy(inner: S) -> Self {
        Self::new(inner, 0, fixtures::transient_error())
    }

    pub fn wrapped(&self) -> &S {
        &self.inner
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn failures_remaining(&self) -> u32 {
        self.failures_remaining.load(Ordering::SeqCst)
    }

    pub fn set_failures(&self, failures: u32) {
        self.failures_remaining.store(failures, Ordering::SeqCst);
    }

    fn attempt(&self) -> QuestlineResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failed = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            Err(QuestlineError::Upstream(self.error.clone()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl<S: LeaderboardSource> LeaderboardSource for FlakySource<S> {
    async fn fetch_page(
        &self,
        view: RankView,
        domain: Option<&str>,
        limit: u32,
        offset: u64,
    ) -> QuestlineResult<Vec<ScoredEntity>> {
        self.attempt()?;
        self.inner.fetch_page(view, domain, limit, offset).await
    }

    async fn fetch_population_size(
        &self,
        view: RankView,
        domain: Option<&str>,
    ) -> QuestlineResult<u64> {
        self.attempt()?;
        self.inner.fetch_population_size(view, domain).await
    }

    async fn fetch_by_id(
        &self,
        view: RankView,
        id: EntityId,
        domain: Option<&str>,
    ) -> QuestlineResult<Option<ScoredEntity>> {
        self.attempt()?;
        self.inner.fetch_by_id(view, id, domain).await
    }

    async fn count_ahead(
        &self,
        view: RankView,
        entity: &ScoredEntity,
        domain: Option<&str>,
    ) -> QuestlineResult<u64> {
        self.attempt()?;
        self.inner.count_ahead(view, entity, domain).await
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for ranked populations.

    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;
    use uuid::Uuid;

    pub fn arb_entity_id() -> impl Strategy<Value = EntityId> {
        any::<[u8; 16]>().prop_map(Uuid::from_bytes)
    }

    pub fn arb_rank_view() -> impl Strategy<Value = RankView> {
        prop_oneof![Just(RankView::AllTime), Just(RankView::Weekly)]
    }

    /// Short lowercase names, so collisions and ties actually happen.
    pub fn arb_display_key() -> impl Strategy<Value = String> {
        "[a-e]{1,3}"
    }

    /// Scores from a narrow range to force tie-breaks.
    pub fn arb_scored_entity() -> impl Strategy<Value = ScoredEntity> {
        (arb_entity_id(), 0u64..20, 0u64..5, arb_display_key()).prop_map(
            |(id, score, secondary, display)| ScoredEntity::new(id, score, secondary, display),
        )
    }

    /// Up to `max` entities with unique ids and display keys.
    pub fn arb_population(max: usize) -> impl Strategy<Value = Vec<ScoredEntity>> {
        prop::collection::vec((0u64..20, 0u64..5), 0..=max).prop_map(|scores| {
            scores
                .into_iter()
                .enumerate()
                .map(|(i, (score, secondary))| {
                    ScoredEntity::new(
                        Uuid::from_u128(i as u128 + 1),
                        score,
                        secondary,
                        format!("member{i:04}"),
                    )
                })
                .collect()
        })
    }

    /// Members with unique names, ready for an [`InMemoryLeaderboard`].
    pub fn arb_members(max: usize) -> impl Strategy<Value = Vec<Member>> {
        prop::collection::vec((0u64..1_000, 0u32..10, any::<bool>()), 1..=max).prop_map(
            |rows| {
                rows.into_iter()
                    .enumerate()
                    .map(|(i, (score, level, in_rust))| {
                        let member = Member::new(Uuid::from_u128(i as u128 + 1), format!("m{i:04}"))
                            .with_score(score)
                            .with_level(level);
                        if in_rust {
                            member.with_domain("rust")
                        } else {
                            member
                        }
                    })
                    .collect()
            },
        )
    }

    /// A retry config that passes validation.
    pub fn arb_retry_config() -> impl Strategy<Value = RetryConfig> {
        (0u32..6, 1u64..500, 500u64..10_000, 1.0f64..4.0, 0.0f64..1.0).prop_map(
            |(max_retries, base_ms, max_ms, factor, jitter)| RetryConfig {
                max_retries,
                base_delay: Duration::from_millis(base_ms),
                max_delay: Duration::from_millis(max_ms),
                backoff_factor: factor,
                jitter_factor: jitter,
            },
        )
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built leaderboards and configs.

    use super::*;
    use chrono::{TimeDelta, TimeZone, Utc};
    use std::time::Duration;
    use uuid::Uuid;

    pub fn id(n: u128) -> EntityId {
        Uuid::from_u128(n)
    }

    /// Fixed evaluation instant for weekly-window tests.
    pub fn fixed_now() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }

    /// `days` whole days before [`fixed_now`].
    pub fn days_ago(days: i64) -> Timestamp {
        fixed_now() - TimeDelta::days(days)
    }

    /// A retryable upstream failure (HTTP 503).
    pub fn transient_error() -> UpstreamError {
        UpstreamError::Status {
            service: "leaderboard-db".to_string(),
            status: 503,
            message: "Service Unavailable".to_string(),
        }
    }

    /// A non-retryable upstream failure (HTTP 400).
    pub fn fatal_error() -> UpstreamError {
        UpstreamError::Status {
            service: "leaderboard-db".to_string(),
            status: 400,
            message: "Bad Request".to_string(),
        }
    }

    /// Config with millisecond-scale timings for paused-clock tests.
    pub fn fast_config() -> QuestlineConfig {
        QuestlineConfig {
            retry: RetryConfig {
                max_retries: 2,
                base_delay: Duration::from_millis(10),
                max_delay: Duration::from_millis(100),
                backoff_factor: 2.0,
                jitter_factor: 0.0,
            },
            breaker: CircuitBreakerConfig {
                failure_threshold: 3,
                recovery_timeout: Duration::from_secs(5),
            },
            cache: CacheConfig::new()
                .with_ttl(Duration::from_secs(60))
                .with_stale_window(Duration::from_secs(30)),
            ..QuestlineConfig::default()
        }
    }

    /// Members 1..=n named `userNNN` with strictly decreasing totals.
    pub fn ranked_board(n: u128) -> InMemoryLeaderboard {
        let board = InMemoryLeaderboard::default().with_fixed_now(fixed_now());
        for i in 1..=n {
            let _ = board.upsert_member(
                Member::new(id(i), format!("user{i:03}")).with_score(10_000 - 10 * i as u64),
            );
        }
        board
    }

    /// Three members tied on total and level with distinct names, one tied
    /// on total with a lower level, and a trailing member.
    ///
    /// All-time order is ids 3 ("Alice"), 2 ("b"), 1 ("a"), 4 ("c").
    pub fn tie_break_board() -> InMemoryLeaderboard {
        let board = InMemoryLeaderboard::default().with_fixed_now(fixed_now());
        let members = [
            Member::new(id(1), "a").with_score(300),
            Member::new(id(2), "b").with_score(300).with_level(50),
            Member::new(id(3), "Alice").with_score(300).with_level(50),
            Member::new(id(4), "c").with_score(100),
        ];
        for member in members {
            let _ = board.upsert_member(member);
        }
        board
    }

    /// Weekly scenario at [`fixed_now`]: id 1 leads all-time but earned
    /// nothing this week; id 2 earned 50 recently; id 3 earned 50 recently
    /// with a higher total; id 4 only has an award older than the window.
    pub fn weekly_board() -> InMemoryLeaderboard {
        let now = fixed_now();
        let board = InMemoryLeaderboard::default().with_fixed_now(now);
        let _ = board.upsert_member(Member::new(id(1), "veteran").with_score(5_000));
        let _ = board.upsert_member(Member::new(id(2), "newcomer").with_score(50));
        let _ = board.upsert_member(Member::new(id(3), "regular").with_score(800));
        let _ = board.upsert_member(Member::new(id(4), "lapsed").with_score(300));

        let _ = board.award(id(2), 50, now - TimeDelta::days(1));
        let _ = board.award(id(3), 20, now - TimeDelta::days(2));
        let _ = board.award(id(3), 30, now - TimeDelta::days(6));
        let _ = board.award(id(4), 100, now - TimeDelta::days(9));
        board
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for Questline results and rankings.

    use super::*;

    #[track_caller]
    pub fn assert_unavailable<T: std::fmt::Debug>(result: &QuestlineResult<T>) {
        match result {
            Err(e) if e.is_unavailable() => {}
            other => panic!("Expected an unavailable error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &QuestlineResult<T>) {
        match result {
            Err(QuestlineError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_circuit_open<T: std::fmt::Debug>(result: &QuestlineResult<T>) {
        match result {
            Err(QuestlineError::CircuitOpen(_)) => {}
            other => panic!("Expected CircuitOpen, got: {:?}", other),
        }
    }

    /// Ranks are consecutive starting at `first`.
    #[track_caller]
    pub fn assert_dense_ranks(entries: &[RankedEntry], first: u64) {
        for (i, entry) in entries.iter().enumerate() {
            assert_eq!(
                entry.rank,
                first + i as u64,
                "rank gap at position {i}: {:?}",
                entries
            );
        }
    }

    /// No entry ranks ahead of the one before it.
    #[track_caller]
    pub fn assert_rank_order(entries: &[RankedEntry]) {
        for pair in entries.windows(2) {
            assert!(
                !questline_rank::is_ahead(&pair[1].entity, &pair[0].entity),
                "{:?} ranked behind {:?}",
                pair[1].entity,
                pair[0].entity
            );
        }
    }

    pub fn ids(entries: &[RankedEntry]) -> Vec<EntityId> {
        entries.iter().map(|e| e.entity.id).collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================
