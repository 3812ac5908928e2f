//! Exponential backoff with optional jitter.
//!
//! Pure functions: no clock, no failure modes. Every delay is clamped to
//! `max`, and for a fixed configuration delays never shrink as `attempt`
//! grows.

use questline_core::RetryConfig;
use rand::Rng;
use std::time::Duration;

/// `min(base * factor^attempt, max)`.
///
/// A `factor` below 1.0 (or NaN) is treated as 1.0. Products that overflow
/// or are not finite clamp to `max`.
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration, factor: f64) -> Duration {
    let factor = if factor >= 1.0 { factor } else { 1.0 };
    let exponent = attempt.min(i32::MAX as u32) as i32;
    let scaled = base.as_secs_f64() * factor.powi(exponent);

    if !scaled.is_finite() || scaled >= max.as_secs_f64() {
        return max;
    }
    Duration::from_secs_f64(scaled).min(max)
}

/// [`backoff_delay`] plus a uniform random addend in `[0, delay * jitter_factor)`,
/// still clamped to `max`.
pub fn jittered_delay(
    attempt: u32,
    base: Duration,
    max: Duration,
    factor: f64,
    jitter_factor: f64,
) -> Duration {
    let delay = backoff_delay(attempt, base, max, factor);
    let jitter = jitter_factor.min(1.0);
    if !(jitter > 0.0) || delay.is_zero() {
        return delay;
    }

    let span = delay.as_secs_f64() * jitter;
    let extra = rand::rng().random_range(0.0..span);
    (delay + Duration::from_secs_f64(extra)).min(max)
}

/// A backoff schedule bundled as a value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
    pub factor: f64,
    pub jitter_factor: f64,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration, factor: f64) -> Self {
        Self {
            base,
            max,
            factor,
            jitter_factor: 0.0,
        }
    }

    pub fn with_jitter(mut self, jitter_factor: f64) -> Self {
        self.jitter_factor = jitter_factor;
        self
    }

    /// Delay to wait after the failure of 0-based `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        jittered_delay(attempt, self.base, self.max, self.factor, self.jitter_factor)
    }
}

impl From<&RetryConfig> for Backoff {
    fn from(config: &RetryConfig) -> Self {
        Backoff::new(config.base_delay, config.max_delay, config.backoff_factor)
            .with_jitter(config.jitter_factor)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::from(&RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Duration = Duration::from_millis(100);
    const MAX: Duration = Duration::from_secs(10);

    #[test]
    fn test_backoff_doubles() {
        assert_eq!(backoff_delay(0, BASE, MAX, 2.0), Duration::from_millis(100));
        assert_eq!(backoff_delay(1, BASE, MAX, 2.0), Duration::from_millis(200));
        assert_eq!(backoff_delay(3, BASE, MAX, 2.0), Duration::from_millis(800));
    }

    #[test]
    fn test_backoff_clamps_to_max() {
        assert_eq!(backoff_delay(10, BASE, MAX, 2.0), MAX);
        assert_eq!(backoff_delay(u32::MAX, BASE, MAX, 2.0), MAX);
    }

    #[test]
    fn test_backoff_shrinking_factor_is_flat() {
        assert_eq!(backoff_delay(5, BASE, MAX, 0.5), BASE);
        assert_eq!(backoff_delay(5, BASE, MAX, f64::NAN), BASE);
    }

    #[test]
    fn test_jitter_zero_is_deterministic() {
        assert_eq!(
            jittered_delay(2, BASE, MAX, 2.0, 0.0),
            backoff_delay(2, BASE, MAX, 2.0)
        );
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let plain = backoff_delay(2, BASE, MAX, 2.0);
        for _ in 0..200 {
            let jittered = jittered_delay(2, BASE, MAX, 2.0, 0.5);
            assert!(jittered >= plain);
            assert!(jittered < plain + plain / 2 + Duration::from_nanos(1));
        }
    }

    #[test]
    fn test_backoff_from_config() {
        let backoff = Backoff::from(&RetryConfig {
            jitter_factor: 0.0,
            ..RetryConfig::default()
        });
        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(200));
    }
}
