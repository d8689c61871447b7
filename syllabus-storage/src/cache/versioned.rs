//! Versioned cache store.
//!
//! [`VersionedCache`] layers serialization, ETag derivation, staleness
//! eviction and lock ownership over any [`EntryBackend`]. It holds no
//! entries itself; every operation goes to the backend, bounded by the
//! current request deadline.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use syllabus_core::keys::lock_key;
use syllabus_core::{CacheError, CacheResult};

use super::config::CacheConfig;
use super::deadline::within_deadline;
use super::entry::compute_etag;
use super::traits::{
    CacheStats, CacheStore, Cached, EntryBackend, EntryWrite, LockId, Ttl, WriteOutcome,
};

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    stale_evictions: AtomicU64,
    conflicts: AtomicU64,
}

/// [`CacheStore`] implementation over an [`EntryBackend`].
#[derive(Debug)]
pub struct VersionedCache<B> {
    backend: B,
    default_ttl: Duration,
    staleness_window: Duration,
    scan_batch_size: usize,
    counters: Counters,
}

impl<B: EntryBackend> VersionedCache<B> {
    /// Create a store over `backend` using the TTL, staleness and batch
    /// settings from `config`.
    pub fn new(backend: B, config: &CacheConfig) -> Self {
        Self {
            backend,
            default_ttl: config.default_ttl,
            staleness_window: config.staleness_window,
            scan_batch_size: config.scan_batch_size.max(1),
            counters: Counters::default(),
        }
    }

    /// Create a store with default configuration.
    pub fn with_defaults(backend: B) -> Self {
        Self::new(backend, &CacheConfig::default())
    }

    /// Get a reference to the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// TTL applied for `Ttl::Default`.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Age beyond which entries are evicted on read.
    pub fn staleness_window(&self) -> Duration {
        self.staleness_window
    }

    fn staleness_millis(&self) -> i64 {
        i64::try_from(self.staleness_window.as_millis()).unwrap_or(i64::MAX)
    }
}

#[async_trait]
impl<B: EntryBackend> CacheStore for VersionedCache<B> {
    async fn get<T: DeserializeOwned + Send>(
        &self,
        key: &str,
    ) -> CacheResult<Option<Cached<T>>> {
        let entry = within_deadline("get", self.backend.read(key)).await?;

        let Some(entry) = entry else {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        };

        let age = entry.age_millis(Utc::now().timestamp_millis());
        if age > self.staleness_millis() {
            tracing::debug!(key, age_ms = age, "Evicting stale cache entry");
            within_deadline("get", self.backend.remove(key)).await?;
            self.counters.stale_evictions.fetch_add(1, Ordering::Relaxed);
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        }

        let value: T =
            serde_json::from_slice(&entry.data).map_err(|e| CacheError::Deserialization {
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        self.counters.hits.fetch_add(1, Ordering::Relaxed);
        Ok(Some(Cached {
            written_at: entry.written_at(),
            value,
            etag: entry.etag,
            version: entry.version,
        }))
    }

    async fn set<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        expected_etag: Option<&str>,
        ttl: Ttl,
    ) -> CacheResult<String> {
        let data = serde_json::to_vec(value).map_err(|e| CacheError::Serialization {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

        let written_at_millis = Utc::now().timestamp_millis();
        let etag = compute_etag(&data, written_at_millis);
        // An empty expected etag means "no expectation".
        let expected_etag = expected_etag.filter(|e| !e.is_empty());

        let write = EntryWrite {
            data: &data,
            etag: &etag,
            written_at_millis,
            ttl: ttl.resolve(self.default_ttl),
            expected_etag,
        };

        match within_deadline("set", self.backend.write(key, write)).await? {
            WriteOutcome::Written { version } => {
                tracing::trace!(key, version, "Cache entry written");
                Ok(etag)
            }
            WriteOutcome::Conflict { current_etag } => {
                self.counters.conflicts.fetch_add(1, Ordering::Relaxed);
                Err(CacheError::EtagMismatch {
                    key: key.to_string(),
                    current_etag,
                })
            }
        }
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        within_deadline("delete", self.backend.remove(key)).await?;
        Ok(())
    }

    async fn invalidate_pattern(&self, pattern: &str) -> CacheResult<u64> {
        let removed = within_deadline(
            "invalidate_pattern",
            self.backend.remove_matching(pattern, self.scan_batch_size),
        )
        .await?;
        tracing::info!(pattern, removed, "Invalidated cache keys");
        Ok(removed)
    }

    async fn acquire_lock(&self, key: &str, ttl: Duration) -> CacheResult<LockId> {
        let lock_id = LockId::generate();
        let acquired = within_deadline(
            "acquire_lock",
            self.backend
                .set_if_absent(&lock_key(key), lock_id.as_str(), ttl),
        )
        .await?;

        if acquired {
            Ok(lock_id)
        } else {
            Err(CacheError::LockHeld {
                key: key.to_string(),
            })
        }
    }

    async fn release_lock(&self, key: &str, lock_id: &LockId) -> CacheResult<()> {
        let released = within_deadline(
            "release_lock",
            self.backend.remove_if_equals(&lock_key(key), lock_id.as_str()),
        )
        .await?;

        if released {
            Ok(())
        } else {
            tracing::warn!(key, lock_id = %lock_id, "Lock expired or taken over before release");
            Err(CacheError::LockNotHeld {
                key: key.to_string(),
            })
        }
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            stale_evictions: self.counters.stale_evictions.load(Ordering::Relaxed),
            conflicts: self.counters.conflicts.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::entry::CacheEntry;
    use crate::cache::memory::MemoryBackend;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Course {
        id: u32,
        title: String,
    }

    fn course(id: u32, title: &str) -> Course {
        Course {
            id,
            title: title.to_string(),
        }
    }

    fn store() -> VersionedCache<MemoryBackend> {
        VersionedCache::with_defaults(MemoryBackend::new())
    }

    #[tokio::test]
    async fn test_miss_is_none() {
        let cache = store();
        let read: Option<Cached<Course>> = cache.get("course:1").await.unwrap();
        assert!(read.is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn test_set_then_get_returns_value_and_etag() {
        let cache = store();
        let etag = cache
            .set("course:1", &course(1, "Algebra"), None, Ttl::Default)
            .await
            .unwrap();

        let read: Cached<Course> = cache.get("course:1").await.unwrap().unwrap();
        assert_eq!(read.value, course(1, "Algebra"));
        assert_eq!(read.etag, etag);
        assert_eq!(read.version, 1);
        assert_eq!(cache.stats().hits, 1);
    }

    #[tokio::test]
    async fn test_optimistic_concurrency() {
        let cache = store();
        let v1 = cache
            .set("course:1", &course(1, "v1"), None, Ttl::Default)
            .await
            .unwrap();

        // Writer A updates with the etag it read.
        let v2 = cache
            .set("course:1", &course(1, "v2"), Some(&v1), Ttl::Default)
            .await
            .unwrap();
        assert_ne!(v1, v2);

        // Writer B still holds v1 and must be told the current etag.
        let err = cache
            .set("course:1", &course(1, "v3"), Some(&v1), Ttl::Default)
            .await
            .unwrap_err();
        assert_eq!(err.current_etag(), Some(v2.as_str()));
        assert!(err.is_expected());

        let read: Cached<Course> = cache.get("course:1").await.unwrap().unwrap();
        assert_eq!(read.value.title, "v2");
        assert_eq!(read.version, 2);
        assert_eq!(cache.stats().conflicts, 1);
    }

    #[tokio::test]
    async fn test_empty_expected_etag_is_unconditional() {
        let cache = store();
        cache
            .set("course:1", &course(1, "v1"), None, Ttl::Default)
            .await
            .unwrap();
        cache
            .set("course:1", &course(1, "v2"), Some(""), Ttl::Default)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_expected_etag_without_entry_conflicts() {
        let cache = store();
        let err = cache
            .set("course:1", &course(1, "v1"), Some("abc"), Ttl::Default)
            .await
            .unwrap_err();
        assert_eq!(err.current_etag(), Some(""));
    }

    #[tokio::test]
    async fn test_stale_entry_is_evicted_on_read() {
        let cache = store();
        let day_and_an_hour_ago = Utc::now().timestamp_millis() - 25 * 60 * 60 * 1000;
        let data = serde_json::to_vec(&course(1, "old")).unwrap();
        cache
            .backend()
            .insert_entry(
                "course:1",
                CacheEntry {
                    etag: compute_etag(&data, day_and_an_hour_ago),
                    data,
                    written_at_millis: day_and_an_hour_ago,
                    version: 3,
                },
                None,
            )
            .unwrap();

        let read: Option<Cached<Course>> = cache.get("course:1").await.unwrap();
        assert!(read.is_none());
        assert!(!cache.backend().contains("course:1").unwrap());
        assert_eq!(cache.stats().stale_evictions, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_ttl_applies() {
        let config = CacheConfig::new().with_default_ttl(Duration::from_secs(60));
        let cache = VersionedCache::new(MemoryBackend::new(), &config);
        cache
            .set("course:1", &course(1, "v1"), None, Ttl::from(Duration::ZERO))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(cache.get::<Course>("course:1").await.unwrap().is_some());
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get::<Course>("course:1").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_after_ttl_uses_default() {
        let config = CacheConfig::new().with_default_ttl(Duration::from_secs(60));
        let cache = VersionedCache::new(MemoryBackend::new(), &config);
        cache
            .set("course:1", &course(1, "v1"), None, Ttl::After(Duration::ZERO))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(cache.get::<Course>("course:1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_deserialization_failure_is_an_error() {
        let cache = store();
        cache
            .set("course:1", &"not a course", None, Ttl::Default)
            .await
            .unwrap();
        let err = cache.get::<Course>("course:1").await.unwrap_err();
        assert!(matches!(err, CacheError::Deserialization { .. }));
    }

    #[tokio::test]
    async fn test_invalidate_pattern_spans_batches() {
        let config = CacheConfig::new().with_scan_batch_size(2);
        let cache = VersionedCache::new(MemoryBackend::new(), &config);
        for i in 0..5 {
            cache
                .set(&format!("course:{i}"), &course(i, "x"), None, Ttl::Default)
                .await
                .unwrap();
        }
        cache
            .set("courses:all", &Vec::<Course>::new(), None, Ttl::Default)
            .await
            .unwrap();

        assert_eq!(cache.invalidate_pattern("course:*").await.unwrap(), 5);
        assert!(cache.get::<Vec<Course>>("courses:all").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_lock_acquire_and_release() {
        let cache = store();
        let ttl = Duration::from_secs(30);
        let id = cache.acquire_lock("course:1", ttl).await.unwrap();
        assert!(cache.backend().contains("lock:course:1").unwrap());

        let err = cache.acquire_lock("course:1", ttl).await.unwrap_err();
        assert_eq!(
            err,
            CacheError::LockHeld {
                key: "course:1".to_string()
            }
        );

        let other = LockId::generate();
        assert!(matches!(
            cache.release_lock("course:1", &other).await,
            Err(CacheError::LockNotHeld { .. })
        ));

        cache.release_lock("course:1", &id).await.unwrap();
        cache.acquire_lock("course:1", ttl).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_lock_cannot_be_released_by_old_holder() {
        let cache = store();
        let a = cache
            .acquire_lock("course:1", Duration::from_secs(1))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(2)).await;
        let b = cache
            .acquire_lock("course:1", Duration::from_secs(30))
            .await
            .unwrap();

        assert!(cache.release_lock("course:1", &a).await.is_err());
        cache.release_lock("course:1", &b).await.unwrap();
    }
}
