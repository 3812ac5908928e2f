//! Default values shared across the Questline crates.
//!
//! Centralizing defaults keeps the `from_env()` fallbacks and the
//! `Default` impls in agreement.

// ============================================================================
// RETRY
// ============================================================================

/// Retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Delay before the first retry (milliseconds).
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 100;

/// Upper bound for any single backoff delay (milliseconds).
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 10_000;

pub const DEFAULT_RETRY_BACKOFF_FACTOR: f64 = 2.0;

/// Fraction of the computed delay added as random jitter.
pub const DEFAULT_RETRY_JITTER_FACTOR: f64 = 0.1;

// ============================================================================
// CIRCUIT BREAKER
// ============================================================================

pub const DEFAULT_BREAKER_FAILURE_THRESHOLD: u32 = 5;

/// Time an open breaker waits before admitting a trial call (milliseconds).
pub const DEFAULT_BREAKER_RECOVERY_TIMEOUT_MS: u64 = 30_000;

// ============================================================================
// RATE LIMITING
// ============================================================================

pub const DEFAULT_RATE_LIMIT_MAX_REQUESTS: u32 = 50;

/// Sliding window length (milliseconds).
pub const DEFAULT_RATE_LIMIT_WINDOW_MS: u64 = 1_000;

// ============================================================================
// CACHE
// ============================================================================

/// Default entry TTL (seconds).
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Default window after TTL during which stale data is still served (seconds).
pub const DEFAULT_CACHE_STALE_WINDOW_SECS: u64 = 60;

/// How often the background sweep runs (seconds).
pub const DEFAULT_CACHE_SWEEP_INTERVAL_SECS: u64 = 60;

/// Shortest sweep period the background task will run with (milliseconds).
pub const MIN_CACHE_SWEEP_INTERVAL_MS: u64 = 100;

// ============================================================================
// LEADERBOARD
// ============================================================================

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Maximum page size; larger requests are rejected.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Trailing window for the weekly view (seconds).
pub const DEFAULT_RANK_WINDOW_SECS: u64 = 7 * 24 * 60 * 60;

/// TTL for cached leaderboard pages (seconds).
pub const DEFAULT_LEADERBOARD_TTL_SECS: u64 = 300;

/// TTL for cached rank-of-user lookups (seconds).
pub const DEFAULT_USER_RANK_TTL_SECS: u64 = 120;

/// TTL for cached widget aggregates (seconds).
pub const DEFAULT_WIDGET_TTL_SECS: u64 = 600;

/// Entries per view/domain combination pre-populated by cache warming.
pub const DEFAULT_WARM_TOP_N: u32 = 10;

/// Domain label used in cache keys when no domain filter applies.
pub const ALL_DOMAINS: &str = "all";
