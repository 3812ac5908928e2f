//! Error types for Questline operations

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Failures reported by an unreliable downstream dependency.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    #[error("Transport failure calling {service}: {reason}")]
    Transport { service: String, reason: String },

    #[error("Timed out calling {service} after {elapsed:?}")]
    Timeout { service: String, elapsed: Duration },

    #[error("{service} responded with status {status}: {message}")]
    Status {
        service: String,
        status: u16,
        message: String,
    },

    #[error("{service} failed: {reason}")]
    Other { service: String, reason: String },
}

/// Cache storage errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Failed to serialize value for key {key}: {reason}")]
    Serialization { key: String, reason: String },

    #[error("Failed to deserialize value for key {key}: {reason}")]
    Deserialization { key: String, reason: String },

    #[error("Invalid key pattern {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Input validation errors. Raised before any cache or data-source access.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("{field} = {value} is out of range [{min}, {max}]")]
    OutOfRange {
        field: String,
        value: i64,
        min: i64,
        max: i64,
    },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Raised by a circuit breaker that refuses to invoke its wrapped operation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Circuit '{name}' is open, retry in {retry_in:?}")]
pub struct CircuitOpen {
    pub name: String,
    /// Time left until the breaker admits a trial call.
    pub retry_in: Duration,
}

/// Raised by the retry executor once every permitted attempt has failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryExhausted<E> {
    /// Total attempts made, including the first one.
    pub attempts: u32,
    pub last_error: E,
}

impl<E: fmt::Display> fmt::Display for RetryExhausted<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Retries exhausted after {} attempts: {}",
            self.attempts, self.last_error
        )
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for RetryExhausted<E> {}

/// Coarse classification of a failure, used by retry predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Connection refused, reset, DNS failure and similar.
    Transport,
    Timeout,
    /// A response carrying an HTTP-like status code.
    Status(u16),
    /// The breaker refused the call.
    CircuitOpen,
    Other,
}

impl FailureKind {
    /// Status codes retried by default.
    pub const RETRYABLE_STATUSES: [u16; 6] = [408, 429, 500, 502, 503, 504];

    /// Whether the default retry policy treats this failure as transient.
    pub fn is_transient(&self) -> bool {
        match self {
            FailureKind::Transport | FailureKind::Timeout => true,
            FailureKind::Status(code) => Self::RETRYABLE_STATUSES.contains(code),
            FailureKind::CircuitOpen | FailureKind::Other => false,
        }
    }
}

/// Errors that can describe what kind of failure they are.
pub trait Classify {
    fn failure_kind(&self) -> FailureKind;
}

impl Classify for UpstreamError {
    fn failure_kind(&self) -> FailureKind {
        match self {
            UpstreamError::Transport { .. } => FailureKind::Transport,
            UpstreamError::Timeout { .. } => FailureKind::Timeout,
            UpstreamError::Status { status, .. } => FailureKind::Status(*status),
            UpstreamError::Other { .. } => FailureKind::Other,
        }
    }
}

/// Master error type for all Questline errors.
#[derive(Debug, Clone, Error)]
pub enum QuestlineError {
    #[error("Upstream error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    CircuitOpen(#[from] CircuitOpen),

    #[error("Retries exhausted after {attempts} attempts: {last_error}")]
    RetryExhausted {
        attempts: u32,
        last_error: Box<QuestlineError>,
    },
}

impl From<RetryExhausted<QuestlineError>> for QuestlineError {
    fn from(err: RetryExhausted<QuestlineError>) -> Self {
        QuestlineError::RetryExhausted {
            attempts: err.attempts,
            last_error: Box::new(err.last_error),
        }
    }
}

impl Classify for QuestlineError {
    fn failure_kind(&self) -> FailureKind {
        match self {
            QuestlineError::Upstream(e) => e.failure_kind(),
            QuestlineError::CircuitOpen(_) => FailureKind::CircuitOpen,
            _ => FailureKind::Other,
        }
    }
}

impl QuestlineError {
    /// True when the caller should render "temporarily unavailable, retry"
    /// rather than treat the failure as a hard error.
    pub fn is_unavailable(&self) -> bool {
        match self {
            QuestlineError::Upstream(_)
            | QuestlineError::CircuitOpen(_)
            | QuestlineError::RetryExhausted { .. } => true,
            QuestlineError::Storage(_)
            | QuestlineError::Validation(_)
            | QuestlineError::Config(_) => false,
        }
    }

    /// True for caller mistakes (bad paging arguments and the like).
    pub fn is_input_error(&self) -> bool {
        matches!(self, QuestlineError::Validation(_))
    }
}

/// Result type alias for Questline operations.
pub type QuestlineResult<T> = Result<T, QuestlineError>;

// =============================================================================
// TESTS
// =============================================================================
