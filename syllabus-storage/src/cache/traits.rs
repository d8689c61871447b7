//! Cache store and backend traits.
//!
//! Two layers:
//!
//! - [`EntryBackend`] is the narrow set of atomic primitives a shared
//!   key/value store must offer (conditional entry write, scan-and-delete,
//!   set-if-absent, compare-and-delete). Redis and the in-memory map
//!   implement it.
//! - [`CacheStore`] is the contract consumed by repositories: typed
//!   get/set with optimistic concurrency, delete, pattern invalidation and
//!   locks. [`VersionedCache`] implements it over any backend, and
//!   [`NoopCacheStore`] implements it with no backend at all.
//!
//! [`VersionedCache`]: super::versioned::VersionedCache
//! [`NoopCacheStore`]: super::noop::NoopCacheStore

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use syllabus_core::CacheResult;
use uuid::Uuid;

use super::entry::CacheEntry;

// ============================================================================
// VALUE TYPES
// ============================================================================

/// Requested lifetime of a cache entry.
///
/// A zero duration means [`Ttl::Default`]. There is no "never expires"
/// variant: the staleness window bounds every entry's life on read anyway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ttl {
    /// Use the store's configured default TTL.
    #[default]
    Default,
    /// Expire after the given duration.
    After(Duration),
}

impl Ttl {
    /// Resolve against the store default. A zero `After` resolves to the
    /// default, the same as `Ttl::from(Duration::ZERO)`.
    pub fn resolve(self, default: Duration) -> Duration {
        match self {
            Self::After(d) if !d.is_zero() => d,
            _ => default,
        }
    }
}

impl From<Duration> for Ttl {
    fn from(d: Duration) -> Self {
        if d.is_zero() {
            Self::Default
        } else {
            Self::After(d)
        }
    }
}

/// Identifier of a lock holder, returned by `acquire_lock`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockId(String);

impl LockId {
    /// A fresh random holder id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The holder id as stored in the lock entry.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for LockId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for LockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A cache hit: the deserialized value plus its entry metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<T> {
    pub value: T,
    pub etag: String,
    pub version: i64,
    pub written_at: DateTime<Utc>,
}

impl<T> Cached<T> {
    /// Consume the wrapper and return the value.
    pub fn into_value(self) -> T {
        self.value
    }
}

/// A conditional entry write handed to a backend.
#[derive(Debug, Clone, Copy)]
pub struct EntryWrite<'a> {
    pub data: &'a [u8],
    pub etag: &'a str,
    pub written_at_millis: i64,
    pub ttl: Duration,
    /// When set, the write only happens if the stored etag equals this.
    pub expected_etag: Option<&'a str>,
}

/// Result of a conditional entry write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The entry was written with this version.
    Written { version: i64 },
    /// The expected etag did not match; nothing was written.
    /// `current_etag` is empty when no entry exists.
    Conflict { current_etag: String },
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses, including stale evictions.
    pub misses: u64,
    /// Entries deleted on read for exceeding the staleness window.
    pub stale_evictions: u64,
    /// Writes rejected for an etag mismatch.
    pub conflicts: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// ============================================================================
// TRAITS
// ============================================================================

/// Atomic primitives over a shared key/value store.
///
/// Every method is a single atomic step on the store; no method may be
/// emulated with a read followed by a separate write.
#[async_trait]
pub trait EntryBackend: Send + Sync {
    /// Read a live entry.
    async fn read(&self, key: &str) -> CacheResult<Option<CacheEntry>>;

    /// Write an entry, honouring `write.expected_etag`. The new version
    /// continues from the stored one, or starts at 1.
    async fn write(&self, key: &str, write: EntryWrite<'_>) -> CacheResult<WriteOutcome>;

    /// Remove a key. Returns whether something was removed.
    async fn remove(&self, key: &str) -> CacheResult<bool>;

    /// Remove every key matching a Redis-style glob, `batch_size` keys per
    /// round trip. Returns the number removed.
    async fn remove_matching(&self, pattern: &str, batch_size: usize) -> CacheResult<u64>;

    /// Set a plain value only if the key is absent.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<bool>;

    /// Remove a plain value only if it still equals `value`.
    async fn remove_if_equals(&self, key: &str, value: &str) -> CacheResult<bool>;
}

/// The cache contract consumed by repositories and services.
///
/// Keys here are raw store keys; callers go through the tenant-scoped or
/// global facade, which derive them from typed keys.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Read and deserialize an entry. A miss is `Ok(None)`, never an error.
    async fn get<T: DeserializeOwned + Send>(&self, key: &str)
        -> CacheResult<Option<Cached<T>>>;

    /// Serialize and write a value, returning its new etag.
    ///
    /// With `expected_etag`, the write fails with `CacheError::EtagMismatch`
    /// carrying the current etag when the stored entry has moved on.
    async fn set<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        expected_etag: Option<&str>,
        ttl: Ttl,
    ) -> CacheResult<String>;

    /// Delete one key.
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Delete every key matching a glob. Returns the number deleted.
    async fn invalidate_pattern(&self, pattern: &str) -> CacheResult<u64>;

    /// Try to take the lock on `key` without waiting.
    /// Contention is `CacheError::LockHeld`.
    async fn acquire_lock(&self, key: &str, ttl: Duration) -> CacheResult<LockId>;

    /// Release a lock only if `lock_id` still holds it.
    /// Otherwise `CacheError::LockNotHeld`.
    async fn release_lock(&self, key: &str, lock_id: &LockId) -> CacheResult<()>;

    /// Snapshot of usage counters.
    fn stats(&self) -> CacheStats;
}
