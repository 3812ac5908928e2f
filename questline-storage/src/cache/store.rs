//! Read-through cache store with stale-while-revalidate.
//!
//! Values are stored as `serde_json::Value` snapshots and read back into the
//! caller's type. A read classifies the entry by age:
//!
//! - fresh (`age < ttl`): served, no compute;
//! - stale (`ttl <= age < ttl + stale_window`): served immediately while a
//!   detached task recomputes it;
//! - otherwise: computed inline and stored.
//!
//! Synchronous misses are not coalesced. Background refreshes are: at most
//! one per key runs at a time.

use super::entry::{CacheEntry, CacheOptions, EntryState};
use super::freshness::CacheRead;
use super::pattern::KeyPattern;
use super::stats::{CacheStats, Counters};
use questline_core::{CacheConfig, StorageError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::time::Instant;

pub type StorageResult<T> = Result<T, StorageError>;

type EntryMap = HashMap<String, CacheEntry>;

/// In-process cache store. Clones share the same entries.
#[derive(Clone)]
pub struct CacheStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    config: CacheConfig,
    entries: RwLock<EntryMap>,
    refreshing: Mutex<HashSet<String>>,
    counters: Counters,
}

impl fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let size = self.inner.entries.read().map(|e| e.len()).ok();
        f.debug_struct("CacheStore")
            .field("config", &self.inner.config)
            .field("size", &size)
            .finish()
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl CacheStore {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                config,
                entries: RwLock::new(HashMap::new()),
                refreshing: Mutex::new(HashSet::new()),
                counters: Counters::default(),
            }),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    fn read_entries(&self) -> StorageResult<RwLockReadGuard<'_, EntryMap>> {
        self.inner
            .entries
            .read()
            .map_err(|_| StorageError::LockPoisoned)
    }

    fn write_entries(&self) -> StorageResult<RwLockWriteGuard<'_, EntryMap>> {
        self.inner
            .entries
            .write()
            .map_err(|_| StorageError::LockPoisoned)
    }

    fn refreshing(&self) -> MutexGuard<'_, HashSet<String>> {
        self.inner
            .refreshing
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // ========================================================================
    // READ-THROUGH
    // ========================================================================

    /// Read `key`, computing and storing it when no usable entry exists.
    ///
    /// A compute failure on a miss propagates unchanged and nothing is
    /// stored. A failed background refresh is logged and never surfaces.
    pub async fn get<T, E, F, Fut>(&self, key: &str, compute: F, opts: CacheOptions) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        E: From<StorageError> + fmt::Display + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        self.get_with_status(key, compute, opts)
            .await
            .map(CacheRead::into_value)
    }

    /// [`get`](Self::get), reporting whether the value was fresh, stale or
    /// computed.
    pub async fn get_with_status<T, E, F, Fut>(
        &self,
        key: &str,
        compute: F,
        opts: CacheOptions,
    ) -> Result<CacheRead<T>, E>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        E: From<StorageError> + fmt::Display + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        match self.lookup::<T>(key, Instant::now())? {
            Some((EntryState::Fresh, value, age)) => {
                Counters::bump(&self.inner.counters.hits);
                tracing::trace!(key, "Cache hit");
                return Ok(CacheRead::fresh(value, age));
            }
            Some((EntryState::Stale, value, age)) => {
                Counters::bump(&self.inner.counters.stale_hits);
                tracing::debug!(key, age_ms = age.as_millis() as u64, "Serving stale entry");
                self.spawn_refresh(key.to_string(), compute, opts);
                return Ok(CacheRead::stale(value, age));
            }
            _ => {}
        }

        Counters::bump(&self.inner.counters.misses);
        tracing::trace!(key, "Cache miss");
        let value = compute().await?;
        self.set(key, &value, opts)?;
        Ok(CacheRead::miss(value))
    }

    /// Find a servable entry and decode it. Undecodable entries are treated
    /// as absent so the caller recomputes over them.
    fn lookup<T: DeserializeOwned>(
        &self,
        key: &str,
        now: Instant,
    ) -> StorageResult<Option<(EntryState, T, Duration)>> {
        let entries = self.read_entries()?;
        let Some(entry) = entries.get(key) else {
            return Ok(None);
        };

        let state = entry.state(now);
        if state == EntryState::Expired {
            return Ok(None);
        }

        match serde_json::from_value::<T>(entry.value.clone()) {
            Ok(value) => Ok(Some((state, value, entry.age(now)))),
            Err(e) => {
                tracing::warn!(key, error = %e, "Cached value does not decode, recomputing");
                Ok(None)
            }
        }
    }

    fn spawn_refresh<T, E, F, Fut>(&self, key: String, compute: F, opts: CacheOptions)
    where
        T: Serialize + Send + 'static,
        E: fmt::Display + Send + 'static,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        if !self.refreshing().insert(key.clone()) {
            tracing::trace!(key = %key, "Refresh already in flight");
            return;
        }

        let guard = RefreshGuard {
            store: self.clone(),
            key,
        };
        tokio::spawn(async move {
            let store = &guard.store;
            let key = guard.key.as_str();
            let counters = &store.inner.counters;

            match compute().await {
                Ok(value) => match store.set(key, &value, opts) {
                    Ok(()) => {
                        Counters::bump(&counters.refreshes);
                        tracing::debug!(key, "Background refresh stored");
                    }
                    Err(e) => {
                        Counters::bump(&counters.refresh_failures);
                        tracing::warn!(key, error = %e, "Background refresh could not store value");
                    }
                },
                Err(e) => {
                    Counters::bump(&counters.refresh_failures);
                    tracing::warn!(key, error = %e, "Background refresh failed, keeping stale entry");
                }
            }
        });
    }

    // ========================================================================
    // DIRECT ACCESS
    // ========================================================================

    /// Store `value` under `key`, replacing any previous entry.
    pub fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        opts: CacheOptions,
    ) -> StorageResult<()> {
        let value = serde_json::to_value(value).map_err(|e| StorageError::Serialization {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        let approx_bytes = serde_json::to_vec(&value).map(|v| v.len()).unwrap_or(0) + key.len();

        let now = Instant::now();
        let entry = CacheEntry {
            key: key.to_string(),
            value,
            stored_at: now,
            ttl: opts.ttl.unwrap_or(self.inner.config.default_ttl),
            stale_window: opts
                .stale_window
                .unwrap_or(self.inner.config.default_stale_window),
            tags: opts.tags.into_iter().collect(),
            approx_bytes,
        };

        let mut entries = self.write_entries()?;
        if let Some(max) = self.inner.config.max_entries {
            if !entries.contains_key(key) {
                self.make_room(&mut entries, max, now);
            }
        }
        entries.insert(key.to_string(), entry);
        Ok(())
    }

    /// Drop expired entries, then the oldest ones, until one slot is free.
    fn make_room(&self, entries: &mut EntryMap, max: usize, now: Instant) {
        if entries.len() < max {
            return;
        }

        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now));
        let mut evicted = before - entries.len();

        while entries.len() >= max {
            let oldest = entries
                .values()
                .min_by_key(|e| e.stored_at)
                .map(|e| e.key.clone());
            match oldest {
                Some(key) => {
                    entries.remove(&key);
                    evicted += 1;
                    tracing::debug!(key = %key, "Evicted oldest entry at capacity");
                }
                None => break,
            }
        }
        Counters::add(&self.inner.counters.evictions, evicted);
    }

    /// Read without computing. Stale entries are returned as stale and are
    /// not refreshed.
    pub fn peek<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<CacheRead<T>>> {
        let now = Instant::now();
        let entries = self.read_entries()?;
        let Some(entry) = entries.get(key) else {
            return Ok(None);
        };

        let state = entry.state(now);
        if state == EntryState::Expired {
            return Ok(None);
        }
        let value = serde_json::from_value::<T>(entry.value.clone()).map_err(|e| {
            StorageError::Deserialization {
                key: key.to_string(),
                reason: e.to_string(),
            }
        })?;
        let age = entry.age(now);
        Ok(Some(match state {
            EntryState::Fresh => CacheRead::fresh(value, age),
            _ => CacheRead::stale(value, age),
        }))
    }

    /// True only while the entry is fresh. An entry past its stale window is
    /// removed on the spot; a stale one is kept for stale reads.
    pub fn has(&self, key: &str) -> StorageResult<bool> {
        let now = Instant::now();
        let state = self.read_entries()?.get(key).map(|e| e.state(now));

        match state {
            Some(EntryState::Fresh) => Ok(true),
            Some(EntryState::Expired) => {
                let mut entries = self.write_entries()?;
                if entries.get(key).is_some_and(|e| e.is_expired(now)) {
                    entries.remove(key);
                    Counters::bump(&self.inner.counters.evictions);
                }
                Ok(false)
            }
            _ => Ok(false),
        }
    }

    /// Remove one entry. Returns whether it existed.
    pub fn delete(&self, key: &str) -> StorageResult<bool> {
        Ok(self.write_entries()?.remove(key).is_some())
    }

    /// Remove every entry. Returns how many were removed.
    pub fn clear(&self) -> StorageResult<usize> {
        let mut entries = self.write_entries()?;
        let removed = entries.len();
        entries.clear();
        tracing::info!(removed, "Cache cleared");
        Ok(removed)
    }

    // ========================================================================
    // BULK INVALIDATION
    // ========================================================================

    /// Remove every entry carrying at least one of `tags`.
    pub fn invalidate_by_tags<S: AsRef<str>>(&self, tags: &[S]) -> StorageResult<usize> {
        if tags.is_empty() {
            return Ok(0);
        }
        let mut entries = self.write_entries()?;
        let before = entries.len();
        entries.retain(|_, e| !e.has_any_tag(tags));
        let removed = before - entries.len();

        tracing::debug!(
            tags = ?tags.iter().map(AsRef::as_ref).collect::<Vec<_>>(),
            removed,
            "Invalidated by tags"
        );
        Ok(removed)
    }

    /// Remove every entry whose key matches `pattern`.
    pub fn invalidate_by_pattern(&self, pattern: &KeyPattern) -> StorageResult<usize> {
        let mut entries = self.write_entries()?;
        let before = entries.len();
        entries.retain(|key, _| !pattern.matches(key));
        let removed = before - entries.len();

        tracing::debug!(pattern = %pattern, removed, "Invalidated by pattern");
        Ok(removed)
    }

    /// Remove entries past `ttl + stale_window`.
    pub fn cleanup(&self) -> StorageResult<usize> {
        let now = Instant::now();
        let mut entries = self.write_entries()?;
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now));
        let removed = before - entries.len();

        Counters::add(&self.inner.counters.evictions, removed);
        Ok(removed)
    }

    pub fn stats(&self) -> StorageResult<CacheStats> {
        let entries = self.read_entries()?;
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();

        let mut stats = CacheStats {
            size: entries.len(),
            keys,
            approximate_memory_bytes: entries.values().map(|e| e.approx_bytes).sum(),
            ..CacheStats::default()
        };
        self.inner.counters.fill(&mut stats);
        Ok(stats)
    }

    /// Keys with a background refresh currently running.
    pub fn refreshing_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.refreshing().iter().cloned().collect();
        keys.sort();
        keys
    }
}

/// Clears the in-flight marker when a refresh task ends, even by panic.
struct RefreshGuard {
    store: CacheStore,
    key: String,
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.store.refreshing().remove(&self.key);
    }
}
