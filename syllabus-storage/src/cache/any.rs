//! Runtime-selected cache store.
//!
//! [`CacheStore`] has generic methods and is not object safe, so the
//! configured backend is picked with enum dispatch.

use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use syllabus_core::CacheResult;

use super::config::{CacheBackendKind, CacheConfig};
use super::memory::MemoryBackend;
use super::noop::NoopCacheStore;
use super::redis_backend::{RedisBackend, RedisCacheError};
use super::traits::{CacheStats, CacheStore, Cached, LockId, Ttl};
use super::versioned::VersionedCache;

/// The cache store selected by [`CacheConfig::backend`].
#[derive(Debug)]
pub enum AnyCacheStore {
    Redis(VersionedCache<RedisBackend>),
    Memory(VersionedCache<MemoryBackend>),
    Disabled(NoopCacheStore),
}

impl AnyCacheStore {
    /// Build the configured store, connecting to Redis when selected.
    ///
    /// The memory backend gets a background sweeper running every
    /// `config.sweep_interval`; Redis expires keys itself.
    ///
    /// A Redis connection failure fails startup rather than silently
    /// disabling the cache.
    pub async fn from_config(config: &CacheConfig) -> Result<Self, RedisCacheError> {
        let store = match config.backend {
            CacheBackendKind::Redis => {
                let backend = RedisBackend::connect(&config.redis_url).await?;
                backend.ping().await?;
                Self::Redis(VersionedCache::new(backend, config))
            }
            CacheBackendKind::Memory => {
                let backend = MemoryBackend::new();
                backend.spawn_sweeper(config.sweep_interval);
                Self::Memory(VersionedCache::new(backend, config))
            }
            CacheBackendKind::Disabled => {
                tracing::warn!("Cache disabled; locks are not exclusive");
                Self::Disabled(NoopCacheStore)
            }
        };
        tracing::info!(backend = ?config.backend, "Cache store ready");
        Ok(store)
    }

    /// Which backend this store uses.
    pub fn kind(&self) -> CacheBackendKind {
        match self {
            Self::Redis(_) => CacheBackendKind::Redis,
            Self::Memory(_) => CacheBackendKind::Memory,
            Self::Disabled(_) => CacheBackendKind::Disabled,
        }
    }
}

macro_rules! dispatch {
    ($self:ident, $store:ident => $call:expr) => {
        match $self {
            AnyCacheStore::Redis($store) => $call,
            AnyCacheStore::Memory($store) => $call,
            AnyCacheStore::Disabled($store) => $call,
        }
    };
}

#[async_trait]
impl CacheStore for AnyCacheStore {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> CacheResult<Option<Cached<T>>> {
        dispatch!(self, s => s.get(key).await)
    }

    async fn set<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
        expected_etag: Option<&str>,
        ttl: Ttl,
    ) -> CacheResult<String> {
        dispatch!(self, s => s.set(key, value, expected_etag, ttl).await)
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        dispatch!(self, s => s.delete(key).await)
    }

    async fn invalidate_pattern(&self, pattern: &str) -> CacheResult<u64> {
        dispatch!(self, s => s.invalidate_pattern(pattern).await)
    }

    async fn acquire_lock(&self, key: &str, ttl: Duration) -> CacheResult<LockId> {
        dispatch!(self, s => s.acquire_lock(key, ttl).await)
    }

    async fn release_lock(&self, key: &str, lock_id: &LockId) -> CacheResult<()> {
        dispatch!(self, s => s.release_lock(key, lock_id).await)
    }

    fn stats(&self) -> CacheStats {
        dispatch!(self, s => s.stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_from_config() {
        let config = CacheConfig::new().with_backend(CacheBackendKind::Memory);
        let store = AnyCacheStore::from_config(&config).await.unwrap();
        assert_eq!(store.kind(), CacheBackendKind::Memory);

        store.set("course:1", &"algebra", None, Ttl::Default).await.unwrap();
        let read: Cached<String> = store.get("course:1").await.unwrap().unwrap();
        assert_eq!(read.value, "algebra");
    }

    #[tokio::test(start_paused = true)]
    async fn test_memory_store_sweeps_expired_entries() {
        let config = CacheConfig::new()
            .with_backend(CacheBackendKind::Memory)
            .with_sweep_interval(Duration::from_secs(10));
        let store = AnyCacheStore::from_config(&config).await.unwrap();

        for i in 0..100 {
            let key = format!("course:{i}");
            store
                .set(&key, &i, None, Ttl::After(Duration::from_secs(1)))
                .await
                .unwrap();
        }

        tokio::time::sleep(Duration::from_secs(15)).await;

        let AnyCacheStore::Memory(cache) = &store else {
            panic!("expected the memory backend");
        };
        assert_eq!(cache.backend().resident_len().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_disabled_store_from_config() {
        let config = CacheConfig::new().with_backend(CacheBackendKind::Disabled);
        let store = AnyCacheStore::from_config(&config).await.unwrap();
        assert_eq!(store.kind(), CacheBackendKind::Disabled);
    }
}
