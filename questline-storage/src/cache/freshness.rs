//! Freshness metadata for cache reads.
//!
//! Reads through [`CacheStore::get_with_status`](super::CacheStore::get_with_status)
//! return a [`CacheRead<T>`] so callers that care can see whether they got
//! fresh data, stale data being revalidated, or a freshly computed value.

use std::time::Duration;

/// How a read was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadStatus {
    /// Served from an entry younger than its TTL.
    Fresh,
    /// Served from an entry inside its stale window; a refresh was scheduled.
    Stale,
    /// Computed inline because no usable entry existed.
    Miss,
}

impl ReadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadStatus::Fresh => "fresh",
            ReadStatus::Stale => "stale",
            ReadStatus::Miss => "miss",
        }
    }
}

/// Result of a cache read, carrying staleness metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRead<T> {
    value: T,
    status: ReadStatus,
    /// Age of the entry when it was read; zero for a miss.
    age: Duration,
}

impl<T> CacheRead<T> {
    pub fn fresh(value: T, age: Duration) -> Self {
        Self {
            value,
            status: ReadStatus::Fresh,
            age,
        }
    }

    pub fn stale(value: T, age: Duration) -> Self {
        Self {
            value,
            status: ReadStatus::Stale,
            age,
        }
    }

    pub fn miss(value: T) -> Self {
        Self {
            value,
            status: ReadStatus::Miss,
            age: Duration::ZERO,
        }
    }

    /// Consume the wrapper and return the underlying value.
    pub fn into_value(self) -> T {
        self.value
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn status(&self) -> ReadStatus {
        self.status
    }

    pub fn age(&self) -> Duration {
        self.age
    }

    /// True for fresh and stale hits.
    pub fn was_cache_hit(&self) -> bool {
        self.status != ReadStatus::Miss
    }

    pub fn is_stale(&self) -> bool {
        self.status == ReadStatus::Stale
    }

    /// Map the value, keeping the metadata.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> CacheRead<U> {
        CacheRead {
            value: f(self.value),
            status: self.status,
            age: self.age,
        }
    }
}
