//! In-memory reference leaderboard.
//!
//! Holds members and their score events behind a `RwLock` and answers every
//! [`LeaderboardSource`] call from a freshly sorted snapshot. Useful for
//! tests, demos and small deployments.

use crate::order;
use crate::source::LeaderboardSource;
use crate::window::{windowed_scores, ScoreEvent};
use ::async_trait::async_trait;
use chrono::Utc;
use questline_core::{
    EntityId, QuestlineError, QuestlineResult, RankConfig, RankView, ScoredEntity, StorageError,
    Timestamp, ValidationError,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

/// A ranked community member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: EntityId,
    pub username: String,
    pub total_score: u64,
    pub level: u32,
    pub domains: BTreeSet<String>,
    pub active: bool,
}

impl Member {
    pub fn new(id: EntityId, username: impl Into<String>) -> Self {
        Self {
            id,
            username: username.into(),
            total_score: 0,
            level: 1,
            domains: BTreeSet::new(),
            active: true,
        }
    }

    pub fn with_score(mut self, total_score: u64) -> Self {
        self.total_score = total_score;
        self
    }

    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domains.insert(domain.into());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    fn in_population(&self, domain: Option<&str>) -> bool {
        self.active && domain.map_or(true, |d| self.domains.contains(d))
    }
}

#[derive(Debug, Default)]
struct BoardState {
    /// Insertion order; duplicates rank in this order.
    members: Vec<Member>,
    events: Vec<ScoreEvent>,
}

/// Thread-safe in-memory [`LeaderboardSource`].
#[derive(Debug)]
pub struct InMemoryLeaderboard {
    state: RwLock<BoardState>,
    window: Duration,
    include_idle_in_window: bool,
    /// Evaluate the weekly window at this instant instead of the wall clock.
    fixed_now: Option<Timestamp>,
}

impl Default for InMemoryLeaderboard {
    fn default() -> Self {
        Self::new(&RankConfig::default())
    }
}

impl InMemoryLeaderboard {
    pub fn new(config: &RankConfig) -> Self {
        Self {
            state: RwLock::new(BoardState::default()),
            window: config.window,
            include_idle_in_window: config.include_idle_in_window,
            fixed_now: None,
        }
    }

    pub fn with_fixed_now(mut self, now: Timestamp) -> Self {
        self.fixed_now = Some(now);
        self
    }

    pub fn with_idle_in_window(mut self, include: bool) -> Self {
        self.include_idle_in_window = include;
        self
    }

    fn now(&self) -> Timestamp {
        self.fixed_now.unwrap_or_else(Utc::now)
    }

    fn read(&self) -> QuestlineResult<RwLockReadGuard<'_, BoardState>> {
        self.state
            .read()
            .map_err(|_| QuestlineError::Storage(StorageError::LockPoisoned))
    }

    fn write(&self) -> QuestlineResult<RwLockWriteGuard<'_, BoardState>> {
        self.state
            .write()
            .map_err(|_| QuestlineError::Storage(StorageError::LockPoisoned))
    }

    // ========================================================================
    // MUTATION
    // ========================================================================

    /// Insert a member, or replace the one with the same id in place.
    pub fn upsert_member(&self, member: Member) -> QuestlineResult<()> {
        let mut state = self.write()?;
        match state.members.iter_mut().find(|m| m.id == member.id) {
            Some(existing) => *existing = member,
            None => state.members.push(member),
        }
        Ok(())
    }

    pub fn remove_member(&self, id: EntityId) -> QuestlineResult<bool> {
        let mut state = self.write()?;
        let before = state.members.len();
        state.members.retain(|m| m.id != id);
        state.events.retain(|e| e.user_id != id);
        Ok(state.members.len() != before)
    }

    pub fn set_active(&self, id: EntityId, active: bool) -> QuestlineResult<()> {
        let mut state = self.write()?;
        let member = find_mut(&mut state.members, id)?;
        member.active = active;
        Ok(())
    }

    /// Add points to a member's total and record the award for the window.
    pub fn award(&self, user_id: EntityId, amount: u64, at: Timestamp) -> QuestlineResult<()> {
        let mut state = self.write()?;
        let member = find_mut(&mut state.members, user_id)?;
        member.total_score = member.total_score.saturating_add(amount);
        state.events.push(ScoreEvent::new(user_id, amount, at));

        tracing::trace!(user_id = %user_id, amount, "Score awarded");
        Ok(())
    }

    pub fn member(&self, id: EntityId) -> QuestlineResult<Option<Member>> {
        Ok(self.read()?.members.iter().find(|m| m.id == id).cloned())
    }

    pub fn members(&self) -> QuestlineResult<Vec<Member>> {
        Ok(self.read()?.members.clone())
    }

    /// Distinct domains across active members, sorted.
    pub fn domains(&self) -> QuestlineResult<Vec<String>> {
        let state = self.read()?;
        let domains: BTreeSet<String> = state
            .members
            .iter()
            .filter(|m| m.active)
            .flat_map(|m| m.domains.iter().cloned())
            .collect();
        Ok(domains.into_iter().collect())
    }

    // ========================================================================
    // SNAPSHOT
    // ========================================================================

    /// The full filtered population in rank order.
    pub fn snapshot(&self, view: RankView, domain: Option<&str>) -> QuestlineResult<Vec<ScoredEntity>> {
        let state = self.read()?;
        let members = state.members.iter().filter(|m| m.in_population(domain));

        let mut entities: Vec<ScoredEntity> = match view {
            RankView::AllTime => members
                .map(|m| ScoredEntity::new(m.id, m.total_score, u64::from(m.level), &m.username))
                .collect(),
            RankView::Weekly => {
                let windowed = windowed_scores(&state.events, self.now(), self.window);
                members
                    .filter_map(|m| {
                        let score = windowed.get(&m.id).copied().unwrap_or(0);
                        (score > 0 || self.include_idle_in_window)
                            .then(|| ScoredEntity::new(m.id, score, m.total_score, &m.username))
                    })
                    .collect()
            }
        };

        order::sort_entities(&mut entities);
        Ok(entities)
    }
}

fn find_mut(members: &mut [Member], id: EntityId) -> QuestlineResult<&mut Member> {
    members
        .iter_mut()
        .find(|m| m.id == id)
        .ok_or_else(|| {
            QuestlineError::Validation(ValidationError::InvalidValue {
                field: "user_id".to_string(),
                reason: format!("unknown member {id}"),
            })
        })
}

#[async_trait]
impl LeaderboardSource for InMemoryLeaderboard {
    async fn fetch_page(
        &self,
        view: RankView,
        domain: Option<&str>,
        limit: u32,
        offset: u64,
    ) -> QuestlineResult<Vec<ScoredEntity>> {
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        Ok(self
            .snapshot(view, domain)?
            .into_iter()
            .skip(offset)
            .take(limit as usize)
            .collect())
    }

    async fn fetch_population_size(
        &self,
        view: RankView,
        domain: Option<&str>,
    ) -> QuestlineResult<u64> {
        Ok(self.snapshot(view, domain)?.len() as u64)
    }

    async fn fetch_by_id(
        &self,
        view: RankView,
        id: EntityId,
        domain: Option<&str>,
    ) -> QuestlineResult<Option<ScoredEntity>> {
        Ok(self.snapshot(view, domain)?.into_iter().find(|e| e.id == id))
    }

    async fn count_ahead(
        &self,
        view: RankView,
        entity: &ScoredEntity,
        domain: Option<&str>,
    ) -> QuestlineResult<u64> {
        let snapshot = self.snapshot(view, domain)?;
        let ahead = match snapshot.iter().position(|e| e.id == entity.id) {
            Some(position) => position,
            None => snapshot.iter().filter(|e| order::is_ahead(e, entity)).count(),
        };
        Ok(ahead as u64)
    }
}
