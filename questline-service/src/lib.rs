//! Questline Service - Leaderboard Composition
//!
//! Wires the resilience primitives, the cache store and the rank engine into
//! one leaderboard service:
//!
//! ```text
//! caller -> LeaderboardService -> CacheStore::get
//!                                   | miss / stale refresh
//!                                   v
//!                               RankEngine -> ResilientSource
//!                                               retry -> breaker -> limiter -> source
//! ```
//!
//! [`QuestlineRuntime`] builds all of it from a [`QuestlineConfig`] and owns
//! the background cache sweep.
//!
//! [`QuestlineConfig`]: questline_core::QuestlineConfig

pub mod admin;
pub mod leaderboard;
pub mod resilient;
pub mod runtime;
pub mod telemetry;

pub use admin::{CacheAdmin, WarmReport};
pub use leaderboard::LeaderboardService;
pub use resilient::ResilientSource;
pub use runtime::{QuestlineRuntime, SOURCE_BREAKER};
pub use telemetry::{init_tracing, TelemetryConfig};
