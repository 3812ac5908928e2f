//! Cache entries and per-write options.

use std::collections::BTreeSet;
use std::time::Duration;
use tokio::time::Instant;

/// Where an entry sits in its lifecycle at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// `age < ttl`
    Fresh,
    /// `ttl <= age < ttl + stale_window`; servable while a refresh runs
    Stale,
    /// Past `ttl + stale_window`; treated as absent
    Expired,
}

/// A stored value with its timing and tags.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub value: serde_json::Value,
    pub stored_at: Instant,
    pub ttl: Duration,
    pub stale_window: Duration,
    pub tags: BTreeSet<String>,
    /// Serialized payload size plus key size.
    pub approx_bytes: usize,
}

impl CacheEntry {
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.stored_at)
    }

    pub fn state(&self, now: Instant) -> EntryState {
        let age = self.age(now);
        if age < self.ttl {
            EntryState::Fresh
        } else if age < self.ttl.saturating_add(self.stale_window) {
            EntryState::Stale
        } else {
            EntryState::Expired
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.state(now) == EntryState::Expired
    }

    pub fn has_any_tag<S: AsRef<str>>(&self, tags: &[S]) -> bool {
        tags.iter().any(|t| self.tags.contains(t.as_ref()))
    }
}

/// TTL, stale window and tags for one write. Unset durations fall back to
/// the store's configured defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheOptions {
    pub ttl: Option<Duration>,
    pub stale_window: Option<Duration>,
    pub tags: Vec<String>,
}

impl CacheOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_stale_window(mut self, window: Duration) -> Self {
        self.stale_window = Some(window);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }
}
