//! Composition root.
//!
//! `QuestlineRuntime` builds every primitive from one [`QuestlineConfig`] and
//! owns them for the life of the process: the cache store, the circuit
//! breaker, the rate limiter, the leaderboard service, the admin surface and
//! the background cache sweep.
//!
//! ```ignore
//! let mut runtime = QuestlineRuntime::new(source, QuestlineConfig::from_env())?;
//! runtime.start();
//! let page = runtime.service().top(RankView::Weekly, None).await?;
//! // ...
//! let sweeps = runtime.shutdown().await;
//! ```

use crate::admin::CacheAdmin;
use crate::leaderboard::LeaderboardService;
use crate::resilient::ResilientSource;
use questline_core::{QuestlineConfig, QuestlineError, QuestlineResult};
use questline_rank::LeaderboardSource;
use questline_resilience::{CircuitBreaker, CircuitState, RateLimiter, RetryPolicy};
use questline_storage::{cache_sweep_task, CacheStore, SweepMetrics, SweepSnapshot};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Name of the breaker guarding the leaderboard data source.
pub const SOURCE_BREAKER: &str = "leaderboard-source";

struct SweepHandle {
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<Arc<SweepMetrics>>,
}

pub struct QuestlineRuntime<S> {
    config: QuestlineConfig,
    cache: CacheStore,
    breaker: Arc<CircuitBreaker>,
    limiter: Arc<RateLimiter>,
    service: LeaderboardService<S>,
    admin: CacheAdmin<S>,
    sweep: Option<SweepHandle>,
}

impl<S: LeaderboardSource + 'static> QuestlineRuntime<S> {
    /// Validate `config` and wire everything around `source`. Nothing is
    /// spawned until [`start`](Self::start).
    pub fn new(source: S, config: QuestlineConfig) -> QuestlineResult<Self> {
        config.validate()?;

        let cache = CacheStore::new(config.cache.clone());
        let breaker = Arc::new(CircuitBreaker::new(SOURCE_BREAKER, config.breaker.clone()));
        let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        let retry = RetryPolicy::<QuestlineError>::from_config(&config.retry);

        let resilient = ResilientSource::new(
            Arc::new(source),
            retry,
            Arc::clone(&breaker),
            Arc::clone(&limiter),
        );
        let service = LeaderboardService::new(resilient, cache.clone(), config.rank.clone());
        let admin = CacheAdmin::new(service.clone());

        Ok(Self {
            config,
            cache,
            breaker,
            limiter,
            service,
            admin,
            sweep: None,
        })
    }

    /// [`new`](Self::new) with configuration read from `QUESTLINE_*`.
    pub fn from_env(source: S) -> QuestlineResult<Self> {
        Self::new(source, QuestlineConfig::from_env())
    }

    pub fn config(&self) -> &QuestlineConfig {
        &self.config
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn breaker_state(&self) -> CircuitState {
        self.breaker.state()
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn service(&self) -> &LeaderboardService<S> {
        &self.service
    }

    pub fn admin(&self) -> &CacheAdmin<S> {
        &self.admin
    }

    /// The unwrapped data source, for writes that bypass resilience.
    pub fn source(&self) -> &Arc<S> {
        self.service.source().inner()
    }

    pub fn is_running(&self) -> bool {
        self.sweep.is_some()
    }

    /// Spawn the cache sweep. Must be called inside a Tokio runtime.
    /// Returns `false` if it was already running.
    pub fn start(&mut self) -> bool {
        if self.sweep.is_some() {
            return false;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(cache_sweep_task(
            self.cache.clone(),
            self.config.sweep.clone(),
            shutdown_rx,
        ));
        self.sweep = Some(SweepHandle {
            shutdown_tx,
            handle,
        });

        tracing::info!(
            sweep_interval_secs = self.config.sweep.interval.as_secs(),
            "Questline runtime started"
        );
        true
    }

    /// Stop the sweep and wait for it. `None` if it was not running.
    pub async fn shutdown(&mut self) -> Option<SweepSnapshot> {
        let SweepHandle {
            shutdown_tx,
            handle,
        } = self.sweep.take()?;

        // A send error means the task already exited
        let _ = shutdown_tx.send(true);
        match handle.await {
            Ok(metrics) => {
                let snapshot = metrics.snapshot();
                tracing::info!(
                    sweep_cycles = snapshot.sweep_cycles,
                    entries_removed = snapshot.entries_removed,
                    "Questline runtime stopped"
                );
                Some(snapshot)
            }
            Err(e) => {
                tracing::error!(error = %e, "Cache sweep task did not finish cleanly");
                None
            }
        }
    }
}
