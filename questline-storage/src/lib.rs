//! Questline Storage - In-Process Cache
//!
//! Single-process, in-memory storage for computed leaderboard data. There is
//! no persistence and no distribution; the relational store behind the
//! leaderboard is reached through `questline-rank`'s source trait.

pub mod cache;

pub use cache::{
    cache_sweep_task, keys, CacheEntry, CacheOptions, CacheRead, CacheStats, CacheStore,
    EntryState, KeyPattern, ReadStatus, StorageResult, SweepMetrics, SweepSnapshot,
};
