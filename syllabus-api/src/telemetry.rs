//! Tracing initialization.
//!
//! Installs a `tracing-subscriber` registry with an `EnvFilter` from
//! `RUST_LOG` and either JSON or human-readable output.

use std::str::FromStr;

use syllabus_core::ConfigError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{StartupError, StartupResult};

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "syllabus_api=info,syllabus_storage=info,warn";

/// Output format of the log stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event, for log shippers.
    Json,
    /// Multi-line human-readable output for local development.
    Pretty,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" | "text" => Ok(Self::Pretty),
            other => Err(ConfigError::InvalidValue {
                field: "SYLLABUS_LOG_FORMAT".to_string(),
                value: other.to_string(),
                reason: "expected json or pretty".to_string(),
            }),
        }
    }
}

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Log output format
    pub format: LogFormat,
    /// Filter directives used when `RUST_LOG` is unset
    pub default_filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Json,
            default_filter: DEFAULT_FILTER.to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Read `SYLLABUS_LOG_FORMAT` (default: json).
    pub fn from_env() -> Result<Self, ConfigError> {
        let format = match std::env::var("SYLLABUS_LOG_FORMAT") {
            Ok(s) => s.parse()?,
            Err(_) => LogFormat::Json,
        };
        Ok(Self {
            format,
            ..Self::default()
        })
    }
}

/// Install the global tracing subscriber.
///
/// Call once at startup. A second call fails because a global subscriber
/// is already set.
pub fn init_tracing(config: &TelemetryConfig) -> StartupResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match config.format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer().pretty()).try_init(),
    };
    result.map_err(|e| StartupError::Telemetry(e.to_string()))?;

    tracing::info!(format = ?config.format, "Telemetry initialized");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!("pretty".parse::<LogFormat>(), Ok(LogFormat::Pretty));
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_telemetry_config_default() {
        let config = TelemetryConfig::default();
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.default_filter, DEFAULT_FILTER);
    }

    #[test]
    fn test_second_init_fails() {
        let config = TelemetryConfig {
            format: LogFormat::Pretty,
            ..Default::default()
        };
        // Another test may have installed a subscriber first; either way the
        // second call in this process must fail.
        let _ = init_tracing(&config);
        assert!(matches!(
            init_tracing(&config),
            Err(StartupError::Telemetry(_))
        ));
    }
}
