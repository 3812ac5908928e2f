//! Tracing subscriber setup.
//!
//! Libraries in this workspace only emit `tracing` events; the host process
//! installs a subscriber once at startup with [`init_tracing`].

use questline_core::{ConfigError, QuestlineResult};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "questline=debug,info";

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Emit one JSON object per event instead of human-readable lines.
    pub json: bool,
    /// Directive used when `RUST_LOG` does not provide one.
    pub default_filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            json: false,
            default_filter: DEFAULT_FILTER.to_string(),
        }
    }
}

impl TelemetryConfig {
    pub fn from_env() -> Self {
        Self {
            json: std::env::var("QUESTLINE_LOG_FORMAT")
                .map(|s| s.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
            default_filter: std::env::var("QUESTLINE_LOG_FILTER")
                .unwrap_or_else(|_| DEFAULT_FILTER.to_string()),
        }
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_tracing(config: &TelemetryConfig) -> QuestlineResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let (json_layer, text_layer) = if config.json {
        (Some(tracing_subscriber::fmt::layer().json()), None)
    } else {
        (None, Some(tracing_subscriber::fmt::layer()))
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .map_err(|e| ConfigError::InvalidValue {
            field: "telemetry.subscriber".to_string(),
            value: config.default_filter.clone(),
            reason: format!("Failed to init subscriber: {e}"),
        })?;

    tracing::info!(json = config.json, "Telemetry initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert!(!config.json);
        assert_eq!(config.default_filter, DEFAULT_FILTER);
        assert!(TelemetryConfig::default().with_json(true).json);
    }

    #[test]
    fn test_second_init_is_an_error() {
        let config = TelemetryConfig::default();
        // Another test in this binary may have installed one already
        let _ = init_tracing(&config);
        assert!(init_tracing(&config).is_err());
    }
}
