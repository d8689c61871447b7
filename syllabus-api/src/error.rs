//! Startup and wiring errors for services built on the core.

use syllabus_core::{ConfigError, DatabaseError};
use syllabus_storage::RedisCacheError;
use thiserror::Error;

/// Errors raised while assembling [`CoreServices`](crate::CoreServices).
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Cache error: {0}")]
    Cache(#[from] RedisCacheError),

    #[error("Failed to initialize tracing: {0}")]
    Telemetry(String),
}

/// Result type alias for service startup.
pub type StartupResult<T> = Result<T, StartupError>;
