//! Configuration types
//!
//! Every section has a `Default`, a `from_env()` that falls back to the
//! default for unset or unparsable variables, and a `validate()`.

use crate::constants::*;
use crate::error::{ConfigError, QuestlineError, QuestlineResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_millis(name: &str, default_ms: u64) -> Duration {
    Duration::from_millis(env_or(name, default_ms))
}

fn env_secs(name: &str, default_secs: u64) -> Duration {
    Duration::from_secs(env_or(name, default_secs))
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> QuestlineError {
    QuestlineError::Config(ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    })
}

fn require_positive(field: &str, value: Duration) -> QuestlineResult<()> {
    if value.is_zero() {
        return Err(invalid(field, format!("{:?}", value), "must be positive"));
    }
    Ok(())
}

// ============================================================================
// RETRY
// ============================================================================

/// Retry configuration for downstream calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt; total attempts are `max_retries + 1`.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
    /// 0.0 disables jitter.
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_RETRY_MAX_DELAY_MS),
            backoff_factor: DEFAULT_RETRY_BACKOFF_FACTOR,
            jitter_factor: DEFAULT_RETRY_JITTER_FACTOR,
        }
    }
}

impl RetryConfig {
    /// Environment variables:
    /// - `QUESTLINE_RETRY_MAX_RETRIES` (default: 3)
    /// - `QUESTLINE_RETRY_BASE_DELAY_MS` (default: 100)
    /// - `QUESTLINE_RETRY_MAX_DELAY_MS` (default: 10000)
    /// - `QUESTLINE_RETRY_BACKOFF_FACTOR` (default: 2.0)
    /// - `QUESTLINE_RETRY_JITTER_FACTOR` (default: 0.1)
    pub fn from_env() -> Self {
        Self {
            max_retries: env_or("QUESTLINE_RETRY_MAX_RETRIES", DEFAULT_MAX_RETRIES),
            base_delay: env_millis("QUESTLINE_RETRY_BASE_DELAY_MS", DEFAULT_RETRY_BASE_DELAY_MS),
            max_delay: env_millis("QUESTLINE_RETRY_MAX_DELAY_MS", DEFAULT_RETRY_MAX_DELAY_MS),
            backoff_factor: env_or("QUESTLINE_RETRY_BACKOFF_FACTOR", DEFAULT_RETRY_BACKOFF_FACTOR),
            jitter_factor: env_or("QUESTLINE_RETRY_JITTER_FACTOR", DEFAULT_RETRY_JITTER_FACTOR),
        }
    }

    pub fn validate(&self) -> QuestlineResult<()> {
        if self.max_delay < self.base_delay {
            return Err(invalid(
                "retry.max_delay",
                format!("{:?}", self.max_delay),
                "max_delay must be >= base_delay",
            ));
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(invalid(
                "retry.backoff_factor",
                self.backoff_factor,
                "backoff_factor must be a finite number >= 1.0",
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(invalid(
                "retry.jitter_factor",
                self.jitter_factor,
                "jitter_factor must be between 0.0 and 1.0",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// CIRCUIT BREAKER
// ============================================================================

/// Circuit breaker thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// Wait after the last failure before a trial call is admitted.
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_BREAKER_FAILURE_THRESHOLD,
            recovery_timeout: Duration::from_millis(DEFAULT_BREAKER_RECOVERY_TIMEOUT_MS),
        }
    }
}

impl CircuitBreakerConfig {
    /// Environment variables:
    /// - `QUESTLINE_BREAKER_FAILURE_THRESHOLD` (default: 5)
    /// - `QUESTLINE_BREAKER_RECOVERY_TIMEOUT_MS` (default: 30000)
    pub fn from_env() -> Self {
        Self {
            failure_threshold: env_or(
                "QUESTLINE_BREAKER_FAILURE_THRESHOLD",
                DEFAULT_BREAKER_FAILURE_THRESHOLD,
            ),
            recovery_timeout: env_millis(
                "QUESTLINE_BREAKER_RECOVERY_TIMEOUT_MS",
                DEFAULT_BREAKER_RECOVERY_TIMEOUT_MS,
            ),
        }
    }

    pub fn validate(&self) -> QuestlineResult<()> {
        if self.failure_threshold == 0 {
            return Err(invalid(
                "breaker.failure_threshold",
                self.failure_threshold,
                "failure_threshold must be at least 1",
            ));
        }
        require_positive("breaker.recovery_timeout", self.recovery_timeout)
    }
}

// ============================================================================
// RATE LIMITER
// ============================================================================

/// Sliding-window rate limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimiterConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_RATE_LIMIT_MAX_REQUESTS,
            window: Duration::from_millis(DEFAULT_RATE_LIMIT_WINDOW_MS),
        }
    }
}

impl RateLimiterConfig {
    /// Environment variables:
    /// - `QUESTLINE_RATE_LIMIT_MAX_REQUESTS` (default: 50)
    /// - `QUESTLINE_RATE_LIMIT_WINDOW_MS` (default: 1000)
    pub fn from_env() -> Self {
        Self {
            max_requests: env_or(
                "QUESTLINE_RATE_LIMIT_MAX_REQUESTS",
                DEFAULT_RATE_LIMIT_MAX_REQUESTS,
            ),
            window: env_millis("QUESTLINE_RATE_LIMIT_WINDOW_MS", DEFAULT_RATE_LIMIT_WINDOW_MS),
        }
    }

    pub fn validate(&self) -> QuestlineResult<()> {
        if self.max_requests == 0 {
            return Err(invalid(
                "rate_limit.max_requests",
                self.max_requests,
                "max_requests must be at least 1",
            ));
        }
        require_positive("rate_limit.window", self.window)
    }
}

// ============================================================================
// CACHE
// ============================================================================

/// Cache store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// TTL applied when a caller does not pass one.
    pub default_ttl: Duration,
    /// Stale-while-revalidate window applied when a caller does not pass one.
    pub default_stale_window: Duration,
    /// Entry cap; `None` means unbounded.
    pub max_entries: Option<usize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            default_stale_window: Duration::from_secs(DEFAULT_CACHE_STALE_WINDOW_SECS),
            max_entries: None,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set the default stale window.
    pub fn with_stale_window(mut self, window: Duration) -> Self {
        self.default_stale_window = window;
        self
    }

    /// Cap the number of entries.
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = Some(max);
        self
    }

    /// Environment variables:
    /// - `QUESTLINE_CACHE_TTL_SECS` (default: 300)
    /// - `QUESTLINE_CACHE_STALE_WINDOW_SECS` (default: 60)
    /// - `QUESTLINE_CACHE_MAX_ENTRIES` (default: unbounded)
    pub fn from_env() -> Self {
        Self {
            default_ttl: env_secs("QUESTLINE_CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS),
            default_stale_window: env_secs(
                "QUESTLINE_CACHE_STALE_WINDOW_SECS",
                DEFAULT_CACHE_STALE_WINDOW_SECS,
            ),
            max_entries: std::env::var("QUESTLINE_CACHE_MAX_ENTRIES")
                .ok()
                .and_then(|s| s.trim().parse().ok()),
        }
    }

    pub fn validate(&self) -> QuestlineResult<()> {
        require_positive("cache.default_ttl", self.default_ttl)?;
        if self.max_entries == Some(0) {
            return Err(invalid(
                "cache.max_entries",
                0,
                "max_entries must be at least 1 when set",
            ));
        }
        Ok(())
    }
}

/// Background sweep configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepConfig {
    pub interval: Duration,
    /// Log every sweep that removed entries at info level.
    pub log_sweeps: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_CACHE_SWEEP_INTERVAL_SECS),
            log_sweeps: true,
        }
    }
}

impl SweepConfig {
    /// Environment variables:
    /// - `QUESTLINE_SWEEP_INTERVAL_SECS` (default: 60)
    /// - `QUESTLINE_SWEEP_LOG` (default: true)
    pub fn from_env() -> Self {
        Self {
            interval: env_secs(
                "QUESTLINE_SWEEP_INTERVAL_SECS",
                DEFAULT_CACHE_SWEEP_INTERVAL_SECS,
            ),
            log_sweeps: std::env::var("QUESTLINE_SWEEP_LOG")
                .ok()
                .map(|s| s.to_lowercase() != "false")
                .unwrap_or(true),
        }
    }

    pub fn validate(&self) -> QuestlineResult<()> {
        require_positive("sweep.interval", self.interval)
    }
}

// ============================================================================
// LEADERBOARD
// ============================================================================

/// Rank engine and leaderboard caching configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankConfig {
    pub default_page_size: u32,
    pub max_page_size: u32,
    /// Trailing window of the weekly view.
    pub window: Duration,
    /// Keep members with zero windowed score in the weekly view.
    pub include_idle_in_window: bool,
    pub leaderboard_ttl: Duration,
    pub user_rank_ttl: Duration,
    pub widget_ttl: Duration,
    pub warm_top_n: u32,
    /// Domains pre-populated by cache warming, besides the unfiltered board.
    pub warm_domains: Vec<String>,
}

impl Default for RankConfig {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
            window: Duration::from_secs(DEFAULT_RANK_WINDOW_SECS),
            include_idle_in_window: false,
            leaderboard_ttl: Duration::from_secs(DEFAULT_LEADERBOARD_TTL_SECS),
            user_rank_ttl: Duration::from_secs(DEFAULT_USER_RANK_TTL_SECS),
            widget_ttl: Duration::from_secs(DEFAULT_WIDGET_TTL_SECS),
            warm_top_n: DEFAULT_WARM_TOP_N,
            warm_domains: Vec::new(),
        }
    }
}

impl RankConfig {
    /// Environment variables:
    /// - `QUESTLINE_RANK_DEFAULT_PAGE_SIZE` (default: 10)
    /// - `QUESTLINE_RANK_MAX_PAGE_SIZE` (default: 100)
    /// - `QUESTLINE_RANK_WINDOW_SECS` (default: 604800)
    /// - `QUESTLINE_RANK_INCLUDE_IDLE` (default: false)
    /// - `QUESTLINE_LEADERBOARD_TTL_SECS` (default: 300)
    /// - `QUESTLINE_USER_RANK_TTL_SECS` (default: 120)
    /// - `QUESTLINE_WIDGET_TTL_SECS` (default: 600)
    /// - `QUESTLINE_WARM_TOP_N` (default: 10)
    /// - `QUESTLINE_WARM_DOMAINS`: comma-separated domain names (default: none)
    pub fn from_env() -> Self {
        Self {
            default_page_size: env_or("QUESTLINE_RANK_DEFAULT_PAGE_SIZE", DEFAULT_PAGE_SIZE),
            max_page_size: env_or("QUESTLINE_RANK_MAX_PAGE_SIZE", MAX_PAGE_SIZE),
            window: env_secs("QUESTLINE_RANK_WINDOW_SECS", DEFAULT_RANK_WINDOW_SECS),
            include_idle_in_window: std::env::var("QUESTLINE_RANK_INCLUDE_IDLE")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(false),
            leaderboard_ttl: env_secs(
                "QUESTLINE_LEADERBOARD_TTL_SECS",
                DEFAULT_LEADERBOARD_TTL_SECS,
            ),
            user_rank_ttl: env_secs("QUESTLINE_USER_RANK_TTL_SECS", DEFAULT_USER_RANK_TTL_SECS),
            widget_ttl: env_secs("QUESTLINE_WIDGET_TTL_SECS", DEFAULT_WIDGET_TTL_SECS),
            warm_top_n: env_or("QUESTLINE_WARM_TOP_N", DEFAULT_WARM_TOP_N),
            warm_domains: std::env::var("QUESTLINE_WARM_DOMAINS")
                .map(|s| {
                    s.split(',')
                        .map(str::trim)
                        .filter(|d| !d.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    pub fn validate(&self) -> QuestlineResult<()> {
        if self.max_page_size == 0 {
            return Err(invalid(
                "rank.max_page_size",
                self.max_page_size,
                "max_page_size must be at least 1",
            ));
        }
        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            return Err(invalid(
                "rank.default_page_size",
                self.default_page_size,
                "default_page_size must be between 1 and max_page_size",
            ));
        }
        if self.warm_top_n > self.max_page_size {
            return Err(invalid(
                "rank.warm_top_n",
                self.warm_top_n,
                "warm_top_n must not exceed max_page_size",
            ));
        }
        require_positive("rank.window", self.window)?;
        require_positive("rank.leaderboard_ttl", self.leaderboard_ttl)?;
        require_positive("rank.user_rank_ttl", self.user_rank_ttl)?;
        require_positive("rank.widget_ttl", self.widget_ttl)
    }
}

// ============================================================================
// MASTER CONFIG
// ============================================================================

/// Master configuration struct.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QuestlineConfig {
    pub retry: RetryConfig,
    pub breaker: CircuitBreakerConfig,
    pub rate_limit: RateLimiterConfig,
    pub cache: CacheConfig,
    pub sweep: SweepConfig,
    pub rank: RankConfig,
}

impl QuestlineConfig {
    pub fn from_env() -> Self {
        Self {
            retry: RetryConfig::from_env(),
            breaker: CircuitBreakerConfig::from_env(),
            rate_limit: RateLimiterConfig::from_env(),
            cache: CacheConfig::from_env(),
            sweep: SweepConfig::from_env(),
            rank: RankConfig::from_env(),
        }
    }

    /// Validate every section, reporting the first invalid field.
    pub fn validate(&self) -> QuestlineResult<()> {
        self.retry.validate()?;
        self.breaker.validate()?;
        self.rate_limit.validate()?;
        self.cache.validate()?;
        self.sweep.validate()?;
        self.rank.validate()
    }
}

// ============================================================================
// TESTS
// ============================================================================
