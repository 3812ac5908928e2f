//! Rank engine: pages, rank-of-entity and neighborhoods over a source.

use crate::order;
use crate::source::LeaderboardSource;
use questline_core::{
    EntityId, LeaderboardPage, Neighborhood, QuestlineResult, RankConfig, RankView, RankedEntry,
    ValidationError,
};

// ============================================================================
// PAGE REQUEST
// ============================================================================

/// A validated `(limit, offset)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageRequest {
    limit: u32,
    offset: u64,
}

impl PageRequest {
    /// Validate raw paging input: `1 <= limit <= max_page_size`, `offset >= 0`.
    pub fn new(limit: i64, offset: i64, max_page_size: u32) -> Result<Self, ValidationError> {
        if limit < 1 || limit > i64::from(max_page_size) {
            return Err(ValidationError::OutOfRange {
                field: "limit".to_string(),
                value: limit,
                min: 1,
                max: i64::from(max_page_size),
            });
        }
        if offset < 0 {
            return Err(ValidationError::InvalidValue {
                field: "offset".to_string(),
                reason: format!("offset must not be negative, got {offset}"),
            });
        }
        Ok(Self {
            limit: limit as u32,
            offset: offset as u64,
        })
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }
}

// ============================================================================
// ENGINE
// ============================================================================

/// Computes ranked views over a [`LeaderboardSource`]. Holds no ranking
/// state of its own.
#[derive(Debug, Clone)]
pub struct RankEngine<S> {
    source: S,
    max_page_size: u32,
}

impl<S: LeaderboardSource> RankEngine<S> {
    pub fn new(source: S, config: &RankConfig) -> Self {
        Self {
            source,
            max_page_size: config.max_page_size.max(1),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn max_page_size(&self) -> u32 {
        self.max_page_size
    }

    /// Validate paging input against this engine's maximum page size.
    pub fn page_request(&self, limit: i64, offset: i64) -> Result<PageRequest, ValidationError> {
        PageRequest::new(limit, offset, self.max_page_size)
    }

    /// A slice of the ordering. `total` is the filtered population size.
    pub async fn page(
        &self,
        view: RankView,
        domain: Option<&str>,
        request: PageRequest,
    ) -> QuestlineResult<LeaderboardPage> {
        let entities = self
            .source
            .fetch_page(view, domain, request.limit, request.offset)
            .await?;
        let total = self.source.fetch_population_size(view, domain).await?;

        // Re-sort so ranks hold even if the source orders ties differently
        let entries = order::assign_ranks(entities, request.offset + 1);

        tracing::debug!(
            view = %view,
            domain = questline_core::domain_label(domain),
            limit = request.limit,
            offset = request.offset,
            returned = entries.len(),
            total,
            "Leaderboard page computed"
        );

        Ok(LeaderboardPage {
            view,
            domain: domain.map(str::to_string),
            entries,
            total,
            limit: request.limit,
            offset: request.offset,
        })
    }

    /// The entity's rank in the filtered ordering, or `None` if it is not
    /// part of it.
    pub async fn rank_of(
        &self,
        view: RankView,
        id: EntityId,
        domain: Option<&str>,
    ) -> QuestlineResult<Option<RankedEntry>> {
        let Some(entity) = self.source.fetch_by_id(view, id, domain).await? else {
            return Ok(None);
        };
        let ahead = self.source.count_ahead(view, &entity, domain).await?;
        Ok(Some(RankedEntry {
            entity,
            rank: ahead + 1,
        }))
    }

    /// Up to `context` entries on each side of the entity, plus the entity.
    ///
    /// The window is `page(offset = rank - context - 1, limit = 2 * context + 1)`
    /// with the offset floored at zero, so near the top it starts at rank 1.
    /// `context` is reduced so the window fits the maximum page size.
    pub async fn neighborhood(
        &self,
        view: RankView,
        id: EntityId,
        context: u32,
        domain: Option<&str>,
    ) -> QuestlineResult<Option<Neighborhood>> {
        let Some(center) = self.rank_of(view, id, domain).await? else {
            return Ok(None);
        };

        let context = u64::from(context.min((self.max_page_size - 1) / 2));
        let offset = center.rank.saturating_sub(context + 1);
        let limit = (2 * context + 1) as u32;
        let page = self
            .page(view, domain, PageRequest { limit, offset })
            .await?;

        Ok(Some(Neighborhood {
            view,
            entries: page.entries,
            center_rank: center.rank,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{InMemoryLeaderboard, Member};
    use uuid::Uuid;

    fn id(n: u128) -> EntityId {
        Uuid::from_u128(n)
    }

    /// Members 1..=n with strictly decreasing scores.
    fn engine(n: u128) -> RankEngine<InMemoryLeaderboard> {
        let board = InMemoryLeaderboard::default();
        for i in 1..=n {
            board
                .upsert_member(Member::new(id(i), format!("user{i:03}")).with_score(1_000 - i as u64))
                .unwrap();
        }
        RankEngine::new(board, &RankConfig::default())
    }

    #[test]
    fn test_page_request_validation() {
        assert!(PageRequest::new(10, 0, 100).is_ok());
        assert!(PageRequest::new(100, 5, 100).is_ok());
        assert!(matches!(
            PageRequest::new(0, 0, 100),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert!(matches!(
            PageRequest::new(101, 0, 100),
            Err(ValidationError::OutOfRange { value: 101, .. })
        ));
        assert!(matches!(
            PageRequest::new(10, -1, 100),
            Err(ValidationError::InvalidValue { .. })
        ));
    }

    #[tokio::test]
    async fn test_page_assigns_offset_ranks() {
        let engine = engine(30);
        let request = engine.page_request(10, 10).unwrap();
        let page = engine.page(RankView::AllTime, None, request).await.unwrap();

        assert_eq!(page.total, 30);
        assert_eq!(page.entries.len(), 10);
        assert_eq!(page.entries[0].rank, 11);
        assert_eq!(page.entries[0].entity.id, id(11));
        assert_eq!(page.entries[9].rank, 20);
        assert!(page.has_more());
    }

    #[tokio::test]
    async fn test_page_past_end_is_empty() {
        let engine = engine(3);
        let request = engine.page_request(10, 50).unwrap();
        let page = engine.page(RankView::AllTime, None, request).await.unwrap();
        assert!(page.entries.is_empty());
        assert_eq!(page.total, 3);
    }

    #[tokio::test]
    async fn test_rank_of_matches_page() {
        let engine = engine(25);
        let full = engine
            .page(RankView::AllTime, None, engine.page_request(25, 0).unwrap())
            .await
            .unwrap();

        for entry in &full.entries {
            let ranked = engine
                .rank_of(RankView::AllTime, entry.entity.id, None)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(ranked.rank, entry.rank);
        }
    }

    #[tokio::test]
    async fn test_rank_of_absent_is_none() {
        let engine = engine(3);
        engine.source().set_active(id(2), false).unwrap();

        assert!(engine
            .rank_of(RankView::AllTime, id(2), None)
            .await
            .unwrap()
            .is_none());
        assert!(engine
            .rank_of(RankView::AllTime, id(99), None)
            .await
            .unwrap()
            .is_none());
        // id(3) moved up
        let third = engine
            .rank_of(RankView::AllTime, id(3), None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(third.rank, 2);
    }

    #[tokio::test]
    async fn test_neighborhood_centered() {
        let engine = engine(20);
        let hood = engine
            .neighborhood(RankView::AllTime, id(10), 2, None)
            .await
            .unwrap()
            .unwrap();

        let ranks: Vec<u64> = hood.entries.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, vec![8, 9, 10, 11, 12]);
        assert_eq!(hood.center_rank, 10);
        assert_eq!(hood.center().unwrap().entity.id, id(10));
    }

    #[tokio::test]
    async fn test_neighborhood_at_edges() {
        let engine = engine(5);
        let top = engine
            .neighborhood(RankView::AllTime, id(1), 2, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            top.entries.iter().map(|e| e.rank).collect::<Vec<_>>(),
            vec![1, 2, 3, 4, 5]
        );

        let bottom = engine
            .neighborhood(RankView::AllTime, id(5), 2, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            bottom.entries.iter().map(|e| e.rank).collect::<Vec<_>>(),
            vec![3, 4, 5]
        );
    }

    #[tokio::test]
    async fn test_neighborhood_context_clamped_to_page_size() {
        let board = InMemoryLeaderboard::default();
        for i in 1..=30u128 {
            board
                .upsert_member(Member::new(id(i), format!("u{i:02}")).with_score(100 - i as u64))
                .unwrap();
        }
        let config = RankConfig {
            max_page_size: 5,
            default_page_size: 5,
            warm_top_n: 5,
            ..RankConfig::default()
        };
        let engine = RankEngine::new(board, &config);

        let hood = engine
            .neighborhood(RankView::AllTime, id(15), 50, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hood.entries.len(), 5);
        assert!(hood.center().is_some());
    }

    #[tokio::test]
    async fn test_end_to_end_tie_break() {
        let board = InMemoryLeaderboard::default();
        board
            .upsert_member(Member::new(id(1), "a").with_score(300).with_level(0))
            .unwrap();
        board
            .upsert_member(Member::new(id(2), "b").with_score(300).with_level(50))
            .unwrap();
        board
            .upsert_member(Member::new(id(3), "Alice").with_score(300).with_level(50))
            .unwrap();
        board
            .upsert_member(Member::new(id(4), "c").with_score(100).with_level(0))
            .unwrap();
        let engine = RankEngine::new(board, &RankConfig::default());

        let page = engine
            .page(RankView::AllTime, None, engine.page_request(10, 0).unwrap())
            .await
            .unwrap();
        let order: Vec<(u64, EntityId)> = page.entries.iter().map(|e| (e.rank, e.entity.id)).collect();
        assert_eq!(order, vec![(1, id(3)), (2, id(2)), (3, id(1)), (4, id(4))]);
    }
}
