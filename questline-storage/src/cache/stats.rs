//! Cache usage counters.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of entries currently stored, including stale ones.
    pub size: usize,
    /// Stored keys, sorted.
    pub keys: Vec<String>,
    /// Sum of serialized payload and key sizes.
    pub approximate_memory_bytes: usize,
    /// Reads served from a fresh entry.
    pub hits: u64,
    /// Reads served from a stale entry.
    pub stale_hits: u64,
    /// Reads that had to compute inline.
    pub misses: u64,
    /// Background refreshes that stored a new value.
    pub refreshes: u64,
    /// Background refreshes whose compute failed.
    pub refresh_failures: u64,
    /// Entries dropped by capacity pressure or expiry sweeps.
    pub evictions: u64,
}

impl CacheStats {
    /// Fraction of reads served from the cache, stale hits included (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let served = self.hits + self.stale_hits;
        let total = served + self.misses;
        if total == 0 {
            0.0
        } else {
            served as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub hits: AtomicU64,
    pub stale_hits: AtomicU64,
    pub misses: AtomicU64,
    pub refreshes: AtomicU64,
    pub refresh_failures: AtomicU64,
    pub evictions: AtomicU64,
}

impl Counters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }

    /// Fill the counter fields of `stats`.
    pub fn fill(&self, stats: &mut CacheStats) {
        stats.hits = self.hits.load(Ordering::Relaxed);
        stats.stale_hits = self.stale_hits.load(Ordering::Relaxed);
        stats.misses = self.misses.load(Ordering::Relaxed);
        stats.refreshes = self.refreshes.load(Ordering::Relaxed);
        stats.refresh_failures = self.refresh_failures.load(Ordering::Relaxed);
        stats.evictions = self.evictions.load(Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);

        let stats = CacheStats {
            hits: 6,
            stale_hits: 2,
            misses: 2,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.8).abs() < f64::EPSILON);
    }
}
