//! Cache Sweep Background Task
//!
//! Periodically removes entries past `ttl + stale_window` so memory held by
//! dead entries is reclaimed even for keys nobody reads again. The sweep
//! takes the same lock as foreground calls.
//!
//! ```ignore
//! let (shutdown_tx, shutdown_rx) = watch::channel(false);
//! let handle = tokio::spawn(cache_sweep_task(store.clone(), SweepConfig::default(), shutdown_rx));
//!
//! // Later
//! let _ = shutdown_tx.send(true);
//! let metrics = handle.await?;
//! ```

use super::store::CacheStore;
use questline_core::constants::MIN_CACHE_SWEEP_INTERVAL_MS;
use questline_core::SweepConfig;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

// ============================================================================
// METRICS
// ============================================================================

/// Counters for sweep activity since the task started.
#[derive(Debug, Default)]
pub struct SweepMetrics {
    pub sweep_cycles: AtomicU64,
    pub entries_removed: AtomicU64,
    pub sweep_errors: AtomicU64,
}

impl SweepMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> SweepSnapshot {
        SweepSnapshot {
            sweep_cycles: self.sweep_cycles.load(Ordering::Relaxed),
            entries_removed: self.entries_removed.load(Ordering::Relaxed),
            sweep_errors: self.sweep_errors.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of sweep metrics at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepSnapshot {
    pub sweep_cycles: u64,
    pub entries_removed: u64,
    pub sweep_errors: u64,
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Run sweeps every `config.interval` until `shutdown_rx` carries `true` or
/// its sender is dropped. The first sweep runs immediately.
///
/// Periods shorter than [`MIN_CACHE_SWEEP_INTERVAL_MS`] are raised to it.
pub async fn cache_sweep_task(
    store: CacheStore,
    config: SweepConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<SweepMetrics> {
    let metrics = Arc::new(SweepMetrics::new());

    let period = sweep_period(&config);
    if period != config.interval {
        tracing::warn!(
            requested_ms = config.interval.as_millis() as u64,
            period_ms = period.as_millis() as u64,
            "Sweep interval below minimum, clamped"
        );
    }
    let mut sweep_interval = interval(period);
    sweep_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        interval_ms = period.as_millis() as u64,
        "Cache sweep task started"
    );

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Cache sweep task shutting down");
                    break;
                }
            }

            _ = sweep_interval.tick() => {
                sweep_once(&store, &config, &metrics);
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        sweep_cycles = snapshot.sweep_cycles,
        entries_removed = snapshot.entries_removed,
        sweep_errors = snapshot.sweep_errors,
        "Cache sweep task completed"
    );

    metrics
}

fn sweep_period(config: &SweepConfig) -> Duration {
    config
        .interval
        .max(Duration::from_millis(MIN_CACHE_SWEEP_INTERVAL_MS))
}

/// Perform one sweep cycle.
pub fn sweep_once(store: &CacheStore, config: &SweepConfig, metrics: &SweepMetrics) -> u64 {
    metrics.sweep_cycles.fetch_add(1, Ordering::Relaxed);

    match store.cleanup() {
        Ok(removed) => {
            let removed = removed as u64;
            metrics.entries_removed.fetch_add(removed, Ordering::Relaxed);
            if removed > 0 && config.log_sweeps {
                tracing::info!(removed, "Cache sweep removed expired entries");
            } else {
                tracing::trace!(removed, "Cache sweep cycle completed");
            }
            removed
        }
        Err(e) => {
            tracing::error!(error = %e, "Cache sweep failed");
            metrics.sweep_errors.fetch_add(1, Ordering::Relaxed);
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheOptions;
    use questline_core::CacheConfig;
    use std::time::Duration;

    fn store() -> CacheStore {
        CacheStore::new(
            CacheConfig::new()
                .with_ttl(Duration::from_secs(10))
                .with_stale_window(Duration::from_secs(5)),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_once_counts_removals() {
        let store = store();
        store.set("a", &1u32, CacheOptions::new()).unwrap();
        store.set("b", &2u32, CacheOptions::new()).unwrap();
        tokio::time::advance(Duration::from_secs(15)).await;

        let metrics = SweepMetrics::new();
        assert_eq!(sweep_once(&store, &SweepConfig::default(), &metrics), 2);
        assert_eq!(
            metrics.snapshot(),
            SweepSnapshot {
                sweep_cycles: 1,
                entries_removed: 2,
                sweep_errors: 0,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_sweeps_on_interval_and_stops_on_shutdown() {
        let store = store();
        store.set("a", &1u32, CacheOptions::new()).unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let config = SweepConfig {
            interval: Duration::from_secs(20),
            log_sweeps: true,
        };
        let handle = tokio::spawn(cache_sweep_task(store.clone(), config, shutdown_rx));

        // t=0 sweep finds nothing, t=20 sweep removes "a"
        tokio::time::sleep(Duration::from_secs(21)).await;
        assert_eq!(store.stats().unwrap().size, 0);

        shutdown_tx.send(true).unwrap();
        let metrics = handle.await.unwrap().snapshot();
        assert_eq!(metrics.sweep_cycles, 2);
        assert_eq!(metrics.entries_removed, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_stops_when_sender_dropped() {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(cache_sweep_task(store(), SweepConfig::default(), shutdown_rx));

        tokio::task::yield_now().await;
        drop(shutdown_tx);
        let metrics = handle.await.unwrap().snapshot();
        assert_eq!(metrics.sweep_errors, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_clamped() {
        let store = store();
        store.set("a", &1u32, CacheOptions::new()).unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let config = SweepConfig {
            interval: Duration::ZERO,
            log_sweeps: false,
        };
        let handle = tokio::spawn(cache_sweep_task(store.clone(), config, shutdown_rx));

        tokio::time::sleep(Duration::from_millis(MIN_CACHE_SWEEP_INTERVAL_MS * 3 + 50)).await;
        shutdown_tx.send(true).unwrap();
        let metrics = handle.await.unwrap().snapshot();
        // Ticks at 0, 100, 200 and 300 ms
        assert_eq!(metrics.sweep_cycles, 4);
        assert_eq!(store.stats().unwrap().size, 1);
    }
}
