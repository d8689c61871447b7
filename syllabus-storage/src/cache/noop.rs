//! Cache store used when caching is disabled.

use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use syllabus_core::CacheResult;

use super::traits::{CacheStats, CacheStore, Cached, LockId, Ttl};

/// Always-miss, always-succeed [`CacheStore`].
///
/// Writes return a fresh etag and are dropped. Locks are always granted, so
/// this store gives no mutual exclusion across processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCacheStore;

#[async_trait]
impl CacheStore for NoopCacheStore {
    async fn get<T: DeserializeOwned + Send>(
        &self,
        _key: &str,
    ) -> CacheResult<Option<Cached<T>>> {
        Ok(None)
    }

    async fn set<T: Serialize + Sync>(
        &self,
        _key: &str,
        _value: &T,
        _expected_etag: Option<&str>,
        _ttl: Ttl,
    ) -> CacheResult<String> {
        Ok(LockId::generate().to_string())
    }

    async fn delete(&self, _key: &str) -> CacheResult<()> {
        Ok(())
    }

    async fn invalidate_pattern(&self, _pattern: &str) -> CacheResult<u64> {
        Ok(0)
    }

    async fn acquire_lock(&self, _key: &str, _ttl: Duration) -> CacheResult<LockId> {
        Ok(LockId::generate())
    }

    async fn release_lock(&self, _key: &str, _lock_id: &LockId) -> CacheResult<()> {
        Ok(())
    }

    fn stats(&self) -> CacheStats {
        CacheStats::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_always_misses() {
        let store = NoopCacheStore;
        store.set("course:1", &42u32, None, Ttl::Default).await.unwrap();
        let read: Option<Cached<u32>> = store.get("course:1").await.unwrap();
        assert!(read.is_none());
        assert_eq!(store.invalidate_pattern("*").await.unwrap(), 0);
    }
}
