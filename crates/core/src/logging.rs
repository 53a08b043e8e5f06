//! Structured logging setup shared by PIB consumers.
//!
//! Store operations emit `tracing` events; a process installs a subscriber
//! once at startup with [`init`]. The `RUST_LOG` environment variable
//! always wins over the configured default filter.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{CoreError, Result};

/// Output format for log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable lines
    #[default]
    Text,
    /// One JSON object per record, for log aggregation
    Json,
}

/// Logging section of the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset (e.g. `info`, `aethercore_pib=debug`)
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Build the filter: `RUST_LOG` if set, otherwise `default_directive`.
pub fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Install the global subscriber.
///
/// Fails if a subscriber is already installed.
///
/// # Example
/// ```no_run
/// use aethercore_core::logging::{self, LoggingConfig};
///
/// logging::init(&LoggingConfig::default()).unwrap();
/// tracing::info!("PIB tool started");
/// ```
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = env_filter(&config.level);
    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.format {
        LogFormat::Text => registry
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(true))
            .try_init(),
    };

    result.map_err(|e| CoreError::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Text);
    }

    #[test]
    fn test_format_deserializes_lowercase() {
        let config: LoggingConfig =
            serde_json::from_str(r#"{"level":"debug","format":"json"}"#).unwrap();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.level, "debug");

        let partial: LoggingConfig = serde_json::from_str(r#"{"format":"text"}"#).unwrap();
        assert_eq!(partial.level, "info");
    }

    #[test]
    fn test_filter_builds() {
        // Installing a global subscriber can only happen once per process
        let _ = env_filter("aethercore_pib=debug");
    }
}
