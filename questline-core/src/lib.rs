//! Questline Core - Shared Types
//!
//! Data structures, error taxonomy and configuration shared by the cache,
//! resilience and ranking crates. This crate contains no I/O.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub mod config;
pub mod constants;
pub mod error;

pub use config::{
    CacheConfig, CircuitBreakerConfig, QuestlineConfig, RankConfig, RateLimiterConfig,
    RetryConfig, SweepConfig,
};
pub use error::{
    CircuitOpen, Classify, ConfigError, FailureKind, QuestlineError, QuestlineResult,
    RetryExhausted, StorageError, UpstreamError, ValidationError,
};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Identifier of a ranked member (a community user).
pub type EntityId = Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Generate a new UUIDv7 entity id (timestamp-sortable).
pub fn new_entity_id() -> EntityId {
    Uuid::now_v7()
}

/// Label used for an optional domain filter in keys, tags and logs.
pub fn domain_label(domain: Option<&str>) -> &str {
    domain.unwrap_or(constants::ALL_DOMAINS)
}

// ============================================================================
// RANK VIEWS
// ============================================================================

/// Time scope of a leaderboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "kebab-case")]
pub enum RankView {
    /// Total accumulated points, tie-broken by level.
    AllTime,
    /// Points earned inside the trailing window, tie-broken by total points.
    Weekly,
}

impl RankView {
    pub const ALL: [RankView; 2] = [RankView::AllTime, RankView::Weekly];

    /// Stable name used in cache keys and tags.
    pub fn as_str(&self) -> &'static str {
        match self {
            RankView::AllTime => "all-time",
            RankView::Weekly => "weekly",
        }
    }
}

impl fmt::Display for RankView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown view name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankViewParseError(pub String);

impl fmt::Display for RankViewParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown rank view: {}", self.0)
    }
}

impl std::error::Error for RankViewParseError {}

impl FromStr for RankView {
    type Err = RankViewParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all-time" | "alltime" | "all_time" | "total" => Ok(RankView::AllTime),
            "weekly" | "week" => Ok(RankView::Weekly),
            _ => Err(RankViewParseError(s.to_string())),
        }
    }
}

// ============================================================================
// RANKED DATA
// ============================================================================

/// A member as seen by one rank view.
///
/// For [`RankView::AllTime`] `score` is the total and `secondary_score` the
/// level; for [`RankView::Weekly`] `score` is the windowed sum and
/// `secondary_score` the total.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ScoredEntity {
    pub id: EntityId,
    pub score: u64,
    pub secondary_score: u64,
    /// Final tie-break, compared ascending (the username).
    pub display_key: String,
}

impl ScoredEntity {
    pub fn new(
        id: EntityId,
        score: u64,
        secondary_score: u64,
        display_key: impl Into<String>,
    ) -> Self {
        Self {
            id,
            score,
            secondary_score,
            display_key: display_key.into(),
        }
    }
}

/// An entity with its 1-based position in one ordering snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RankedEntry {
    pub entity: ScoredEntity,
    pub rank: u64,
}

/// A contiguous slice of a leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct LeaderboardPage {
    pub view: RankView,
    pub domain: Option<String>,
    pub entries: Vec<RankedEntry>,
    /// Size of the (filtered) population, not of this page.
    pub total: u64,
    pub limit: u32,
    pub offset: u64,
}

impl LeaderboardPage {
    /// True if entries exist beyond this page.
    pub fn has_more(&self) -> bool {
        self.offset + (self.entries.len() as u64) < self.total
    }
}

/// A member's entry plus the entries ranked around it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Neighborhood {
    pub view: RankView,
    pub entries: Vec<RankedEntry>,
    pub center_rank: u64,
}

impl Neighborhood {
    /// The entry the neighborhood is centered on.
    pub fn center(&self) -> Option<&RankedEntry> {
        self.entries.iter().find(|e| e.rank == self.center_rank)
    }
}

// ============================================================================
// TESTS
// ============================================================================
