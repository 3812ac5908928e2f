//! Questline Rank - Leaderboard Ranking Engine
//!
//! Ordered, tie-broken ranks over a mutable population, in two views:
//!
//! - all-time: `(total DESC, level DESC, username ASC)`
//! - weekly: `(points in trailing window DESC, total DESC, username ASC)`
//!
//! Ranks are dense: the tie-break chain ends in the username, so only true
//! duplicates compare equal, and those still get consecutive distinct ranks.
//! The engine owns no data; it reads through a [`LeaderboardSource`].

pub mod engine;
pub mod memory;
pub mod order;
pub mod source;
pub mod window;

pub use engine::{PageRequest, RankEngine};
pub use memory::{InMemoryLeaderboard, Member};
pub use order::{assign_ranks, compare, is_ahead, sort_entities};
pub use source::LeaderboardSource;
pub use window::{in_window, window_start, windowed_scores, ScoreEvent};
