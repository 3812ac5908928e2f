//! Tag-addressable in-memory cache with stale-while-revalidate reads.
//!
//! Staleness is explicit: every entry carries a TTL and a stale window, and
//! [`CacheStore::get_with_status`] reports whether a read was fresh, stale
//! (and therefore being revalidated in the background) or a miss.
//!
//! # Example
//!
//! ```ignore
//! let store = CacheStore::new(CacheConfig::default());
//! let opts = CacheOptions::new()
//!     .with_ttl(Duration::from_secs(300))
//!     .with_tags([keys::view_tag(RankView::Weekly)]);
//!
//! let page: LeaderboardPage = store
//!     .get(&keys::leaderboard(RankView::Weekly, None, 10, 0), move || compute_page(), opts)
//!     .await?;
//!
//! // Drop every cached weekly page after a score change
//! store.invalidate_by_tags(&[keys::view_tag(RankView::Weekly)])?;
//! ```

pub mod entry;
pub mod freshness;
pub mod keys;
pub mod pattern;
pub mod stats;
pub mod store;
pub mod sweep;

pub use entry::{CacheEntry, CacheOptions, EntryState};
pub use freshness::{CacheRead, ReadStatus};
pub use pattern::KeyPattern;
pub use stats::CacheStats;
pub use store::{CacheStore, StorageResult};
pub use sweep::{cache_sweep_task, sweep_once, SweepMetrics, SweepSnapshot};
