//! Cache configuration.

use std::str::FromStr;
use std::time::Duration;

use syllabus_core::ConfigError;

/// Which store backs the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackendKind {
    /// Shared Redis instance.
    Redis,
    /// Process-local map (tests, single-node development).
    Memory,
    /// Caching disabled: every read misses, every write succeeds.
    Disabled,
}

impl FromStr for CacheBackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            "disabled" | "none" | "noop" => Ok(Self::Disabled),
            other => Err(ConfigError::InvalidValue {
                field: "SYLLABUS_CACHE_BACKEND".to_string(),
                value: other.to_string(),
                reason: "expected redis, memory or disabled".to_string(),
            }),
        }
    }
}

/// Configuration for the versioned cache store.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Backing store.
    pub backend: CacheBackendKind,
    /// Redis connection URL, used when `backend` is `Redis`.
    pub redis_url: String,
    /// TTL applied when a write asks for `Ttl::Default`.
    pub default_ttl: Duration,
    /// Entries older than this are deleted on read and reported as misses.
    pub staleness_window: Duration,
    /// Keys deleted per round trip during pattern invalidation.
    pub scan_batch_size: usize,
    /// How often the memory backend drops expired keys.
    pub sweep_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackendKind::Redis,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            default_ttl: Duration::from_secs(3600),             // 1 hour
            staleness_window: Duration::from_secs(24 * 60 * 60), // 24 hours
            scan_batch_size: 500,
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create CacheConfig from environment variables.
    ///
    /// Environment variables:
    /// - `SYLLABUS_CACHE_BACKEND`: `redis`, `memory` or `disabled` (default: redis)
    /// - `SYLLABUS_REDIS_URL`: Redis URL (default: redis://127.0.0.1:6379)
    /// - `SYLLABUS_CACHE_DEFAULT_TTL_SECS`: default entry TTL (default: 3600)
    /// - `SYLLABUS_CACHE_STALENESS_SECS`: staleness window (default: 86400)
    /// - `SYLLABUS_CACHE_SCAN_BATCH`: invalidation batch size (default: 500)
    /// - `SYLLABUS_CACHE_SWEEP_SECS`: memory backend sweep period (default: 60)
    ///
    /// A variable that is set but malformed is an error, never a silent
    /// fallback to the default.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let backend = match lookup("SYLLABUS_CACHE_BACKEND") {
            Some(s) => s.parse()?,
            None => defaults.backend,
        };

        let redis_url = lookup("SYLLABUS_REDIS_URL").unwrap_or(defaults.redis_url);

        let default_ttl = parse_secs(&lookup, "SYLLABUS_CACHE_DEFAULT_TTL_SECS")?
            .unwrap_or(defaults.default_ttl);
        let staleness_window = parse_secs(&lookup, "SYLLABUS_CACHE_STALENESS_SECS")?
            .unwrap_or(defaults.staleness_window);
        let sweep_interval = parse_secs(&lookup, "SYLLABUS_CACHE_SWEEP_SECS")?
            .unwrap_or(defaults.sweep_interval);
        let scan_batch_size = parse_positive(&lookup, "SYLLABUS_CACHE_SCAN_BATCH")?
            .map_or(defaults.scan_batch_size, |n| n as usize);

        Ok(Self {
            backend,
            redis_url,
            default_ttl,
            staleness_window,
            scan_batch_size,
            sweep_interval,
        })
    }

    /// Set the backend.
    pub fn with_backend(mut self, backend: CacheBackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Set the Redis URL.
    pub fn with_redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis_url = url.into();
        self
    }

    /// Set the default TTL.
    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Set the staleness window.
    pub fn with_staleness_window(mut self, window: Duration) -> Self {
        self.staleness_window = window;
        self
    }

    /// Set the invalidation batch size.
    pub fn with_scan_batch_size(mut self, size: usize) -> Self {
        self.scan_batch_size = size.max(1);
        self
    }

    /// Set the memory backend sweep period.
    pub fn with_sweep_interval(mut self, every: Duration) -> Self {
        self.sweep_interval = every;
        self
    }
}

fn parse_positive(
    lookup: &impl Fn(&str) -> Option<String>,
    field: &str,
) -> Result<Option<u64>, ConfigError> {
    let Some(raw) = lookup(field) else {
        return Ok(None);
    };
    match raw.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(Some(n)),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value: raw,
            reason: "expected a positive integer".to_string(),
        }),
    }
}

fn parse_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    field: &str,
) -> Result<Option<Duration>, ConfigError> {
    Ok(parse_positive(lookup, field)?.map(Duration::from_secs))
}
