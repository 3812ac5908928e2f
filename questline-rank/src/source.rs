//! Data source boundary for the rank engine.

use crate::order;
use ::async_trait::async_trait;
use questline_core::{EntityId, QuestlineResult, RankView, ScoredEntity};
use std::sync::Arc;

/// Chunk size used by the default [`LeaderboardSource::count_ahead`] scan.
pub const SCAN_CHUNK: u32 = 100;

/// Async access to a ranked population.
///
/// Pages must come back in rank order for the view (see [`order::compare`]).
/// A `domain` of `None` means the whole population; inactive members are
/// never part of any population.
#[async_trait]
pub trait LeaderboardSource: Send + Sync {
    /// A contiguous slice of the ordering.
    async fn fetch_page(
        &self,
        view: RankView,
        domain: Option<&str>,
        limit: u32,
        offset: u64,
    ) -> QuestlineResult<Vec<ScoredEntity>>;

    /// Size of the (filtered) population.
    async fn fetch_population_size(&self, view: RankView, domain: Option<&str>)
        -> QuestlineResult<u64>;

    /// One entity as seen by `view`, or `None` if it is outside the filtered
    /// population.
    async fn fetch_by_id(
        &self,
        view: RankView,
        id: EntityId,
        domain: Option<&str>,
    ) -> QuestlineResult<Option<ScoredEntity>>;

    /// Number of entities ranked ahead of `entity`.
    ///
    /// The default walks the ordering in chunks until it meets `entity`.
    async fn count_ahead(
        &self,
        view: RankView,
        entity: &ScoredEntity,
        domain: Option<&str>,
    ) -> QuestlineResult<u64> {
        let mut offset = 0u64;
        let mut strictly_ahead = 0u64;

        loop {
            let chunk = self.fetch_page(view, domain, SCAN_CHUNK, offset).await?;
            if chunk.is_empty() {
                // Not found by id; fall back to what compares ahead of it
                return Ok(strictly_ahead);
            }

            for (i, candidate) in chunk.iter().enumerate() {
                if candidate.id == entity.id {
                    return Ok(offset + i as u64);
                }
                if order::is_ahead(candidate, entity) {
                    strictly_ahead += 1;
                }
            }

            offset += chunk.len() as u64;
            if chunk.len() < SCAN_CHUNK as usize {
                return Ok(strictly_ahead);
            }
        }
    }
}

#[async_trait]
impl<S: LeaderboardSource + ?Sized> LeaderboardSource for Arc<S> {
    async fn fetch_page(
        &self,
        view: RankView,
        domain: Option<&str>,
        limit: u32,
        offset: u64,
    ) -> QuestlineResult<Vec<ScoredEntity>> {
        (**self).fetch_page(view, domain, limit, offset).await
    }

    async fn fetch_population_size(
        &self,
        view: RankView,
        domain: Option<&str>,
    ) -> QuestlineResult<u64> {
        (**self).fetch_population_size(view, domain).await
    }

    async fn fetch_by_id(
        &self,
        view: RankView,
        id: EntityId,
        domain: Option<&str>,
    ) -> QuestlineResult<Option<ScoredEntity>> {
        (**self).fetch_by_id(view, id, domain).await
    }

    async fn count_ahead(
        &self,
        view: RankView,
        entity: &ScoredEntity,
        domain: Option<&str>,
    ) -> QuestlineResult<u64> {
        (**self).count_ahead(view, entity, domain).await
    }
}
