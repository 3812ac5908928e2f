//! Cached Leaderboard Service
//!
//! `LeaderboardService` puts the rank engine behind the cache store's
//! read-through `get`. Callers ask for pages, ranks and neighborhoods; a miss
//! computes through the engine, whose source calls run under retry, circuit
//! breaker and rate limiter (see [`ResilientSource`]).
//!
//! Paging input is validated before any cache or source access, so a bad
//! request never touches either.

use crate::resilient::ResilientSource;
use questline_core::{
    EntityId, LeaderboardPage, Neighborhood, QuestlineResult, RankConfig, RankView, RankedEntry,
};
use questline_rank::{LeaderboardSource, RankEngine};
use questline_storage::{keys, CacheOptions, CacheRead, CacheStore};
use std::sync::Arc;
use std::time::Duration;

pub struct LeaderboardService<S> {
    engine: Arc<RankEngine<ResilientSource<S>>>,
    cache: CacheStore,
    config: RankConfig,
}

impl<S> Clone for LeaderboardService<S> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            cache: self.cache.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S: LeaderboardSource + 'static> LeaderboardService<S> {
    pub fn new(source: ResilientSource<S>, cache: CacheStore, config: RankConfig) -> Self {
        let engine = RankEngine::new(source, &config);
        Self {
            engine: Arc::new(engine),
            cache,
            config,
        }
    }

    pub fn engine(&self) -> &RankEngine<ResilientSource<S>> {
        &self.engine
    }

    pub fn source(&self) -> &ResilientSource<S> {
        self.engine.source()
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn config(&self) -> &RankConfig {
        &self.config
    }

    fn options(ttl: Duration, view: RankView, domain: Option<&str>) -> CacheOptions {
        let options = CacheOptions::new().with_ttl(ttl).with_tag(keys::view_tag(view));
        match domain {
            Some(d) => options.with_tag(keys::domain_tag(d)),
            None => options,
        }
    }

    // ========================================================================
    // LEADERBOARD PAGES
    // ========================================================================

    /// A page of the leaderboard for `view`, optionally filtered to `domain`.
    pub async fn leaderboard(
        &self,
        view: RankView,
        domain: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> QuestlineResult<LeaderboardPage> {
        self.leaderboard_read(view, domain, limit, offset)
            .await
            .map(CacheRead::into_value)
    }

    /// [`leaderboard`](Self::leaderboard) with the default page size.
    pub async fn top(&self, view: RankView, domain: Option<&str>) -> QuestlineResult<LeaderboardPage> {
        self.leaderboard(view, domain, i64::from(self.config.default_page_size), 0)
            .await
    }

    /// A leaderboard page along with whether it was fresh, stale or computed.
    pub async fn leaderboard_read(
        &self,
        view: RankView,
        domain: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> QuestlineResult<CacheRead<LeaderboardPage>> {
        let request = self.engine.page_request(limit, offset)?;
        let key = keys::leaderboard(view, domain, request.limit(), request.offset());
        let options = Self::options(self.config.leaderboard_ttl, view, domain);

        let engine = Arc::clone(&self.engine);
        let owned_domain = domain.map(str::to_string);
        self.cache
            .get_with_status(
                &key,
                move || async move { engine.page(view, owned_domain.as_deref(), request).await },
                options,
            )
            .await
    }

    // ========================================================================
    // USER LOOKUPS
    // ========================================================================

    /// The user's rank, or `None` when they are not part of the population.
    pub async fn rank_of(
        &self,
        view: RankView,
        user_id: EntityId,
        domain: Option<&str>,
    ) -> QuestlineResult<Option<RankedEntry>> {
        let key = keys::user_rank(user_id, view, domain);
        let options = Self::options(self.config.user_rank_ttl, view, domain)
            .with_tag(keys::user_tag(user_id));

        let engine = Arc::clone(&self.engine);
        let owned_domain = domain.map(str::to_string);
        self.cache
            .get(
                &key,
                move || async move { engine.rank_of(view, user_id, owned_domain.as_deref()).await },
                options,
            )
            .await
    }

    /// The user and up to `context` neighbors on each side.
    pub async fn neighborhood(
        &self,
        view: RankView,
        user_id: EntityId,
        context: u32,
        domain: Option<&str>,
    ) -> QuestlineResult<Option<Neighborhood>> {
        let key = keys::user_neighborhood(user_id, view, domain, context);
        let options = Self::options(self.config.user_rank_ttl, view, domain)
            .with_tag(keys::user_tag(user_id));

        let engine = Arc::clone(&self.engine);
        let owned_domain = domain.map(str::to_string);
        self.cache
            .get(
                &key,
                move || async move {
                    engine
                        .neighborhood(view, user_id, context, owned_domain.as_deref())
                        .await
                },
                options,
            )
            .await
    }

    // ========================================================================
    // WIDGETS
    // ========================================================================

    /// Top entries for a sidebar widget. Cached longer than full pages.
    pub async fn widget_top(&self, view: RankView, limit: i64) -> QuestlineResult<Vec<RankedEntry>> {
        let request = self.engine.page_request(limit, 0)?;
        let name = format!("top-{}", view.as_str());
        let key = keys::widget(&name, request.limit());
        let options = Self::options(self.config.widget_ttl, view, None);

        let engine = Arc::clone(&self.engine);
        self.cache
            .get(
                &key,
                move || async move {
                    engine
                        .page(view, None, request)
                        .await
                        .map(|page| page.entries)
                },
                options,
            )
            .await
    }

    // ========================================================================
    // INVALIDATION
    // ========================================================================

    /// Drop everything a score change for `user_id` can affect: the user's own
    /// lookups, both views and the member's domains.
    pub fn on_score_changed<D: AsRef<str>>(
        &self,
        user_id: EntityId,
        domains: &[D],
    ) -> QuestlineResult<usize> {
        let mut tags = vec![keys::user_tag(user_id)];
        tags.extend(RankView::ALL.iter().map(|view| keys::view_tag(*view)));
        tags.extend(domains.iter().map(|d| keys::domain_tag(d.as_ref())));

        let removed = self.cache.invalidate_by_tags(&tags)?;
        tracing::debug!(user_id = %user_id, removed, "Invalidated after score change");
        Ok(removed)
    }

    /// Drop every cached entry for one view.
    pub fn invalidate_view(&self, view: RankView) -> QuestlineResult<usize> {
        Ok(self.cache.invalidate_by_tags(&[keys::view_tag(view)])?)
    }
}
