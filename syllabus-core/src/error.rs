//! Error types for Syllabus tenancy and cache operations

use std::fmt;
use thiserror::Error;

/// Cache layer errors.
///
/// `EtagMismatch`, `LockHeld` and `LockNotHeld` are expected outcomes that
/// callers are meant to match on. The remaining variants are failures of the
/// backing store and must never be read as a cache miss.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("ETag mismatch for {key}: current etag is {current_etag:?}")]
    EtagMismatch { key: String, current_etag: String },

    #[error("Lock already held: {key}")]
    LockHeld { key: String },

    #[error("Lock {key} is not held by this process")]
    LockNotHeld { key: String },

    #[error("Cache backend failure: {reason}")]
    Backend { reason: String },

    #[error("Failed to serialize value for {key}: {reason}")]
    Serialization { key: String, reason: String },

    #[error("Failed to deserialize value for {key}: {reason}")]
    Deserialization { key: String, reason: String },

    #[error("Cache operation {operation} exceeded the request deadline")]
    Timeout { operation: &'static str },

    #[error("Cache lock poisoned")]
    LockPoisoned,
}

impl CacheError {
    /// The etag currently stored, when this is an optimistic-concurrency conflict.
    pub fn current_etag(&self) -> Option<&str> {
        match self {
            Self::EtagMismatch { current_etag, .. } => Some(current_etag),
            _ => None,
        }
    }

    /// Returns true for the expected outcomes a caller resolves itself
    /// (conflict, contention, ownership), as opposed to store failures.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            Self::EtagMismatch { .. } | Self::LockHeld { .. } | Self::LockNotHeld { .. }
        )
    }
}

/// Database layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DatabaseError {
    #[error("Connection pool error: {reason}")]
    Pool { reason: String },

    #[error("Query failed: {reason}")]
    Query { reason: String },

    #[error("Failed to set session variable {variable}: {reason}")]
    SessionVariable {
        variable: &'static str,
        reason: String,
    },

    #[error("Commit failed: {reason}")]
    Commit { reason: String },

    #[error("Transaction exceeded the request deadline")]
    Timeout,
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

/// Master error type for all Syllabus core errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyllabusError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for Syllabus operations.
pub type SyllabusResult<T> = Result<T, SyllabusError>;

/// Result type alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// A tenant-scoped operation was attempted with no tenant identity.
///
/// This is not an error value. The tenant-scoped cache panics with this as
/// its message, so the bug cannot be swallowed by `?`, `.ok()` or a default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IsolationViolation {
    /// The operation that was attempted.
    pub operation: &'static str,
}

impl fmt::Display for IsolationViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tenant isolation violation: {} called without a tenant context",
            self.operation
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================
