//! Service configuration.

use syllabus_core::ConfigError;
use syllabus_storage::CacheConfig;

use crate::db::DbConfig;
use crate::telemetry::TelemetryConfig;

/// Everything a service built on the core reads from its environment.
#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    pub db: DbConfig,
    pub cache: CacheConfig,
    pub telemetry: TelemetryConfig,
}

impl ServiceConfig {
    /// Read all sections from environment variables.
    ///
    /// See [`DbConfig::from_env`], [`CacheConfig::from_env`] and
    /// [`TelemetryConfig::from_env`] for the variables involved.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            db: DbConfig::from_env(),
            cache: CacheConfig::from_env()?,
            telemetry: TelemetryConfig::from_env()?,
        })
    }
}
