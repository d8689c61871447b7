//! Global cache facade for data resolvable before a tenant is known.
//!
//! Accepts only [`GlobalKey`] / [`GlobalPattern`], which are passed to the
//! store unmodified. Does not require a tenant context, but still honours
//! the request deadline.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use syllabus_core::{CacheError, CacheResult, GlobalKey, GlobalPattern, RequestContext};

use super::deadline::within;
use super::lock::LockManager;
use super::traits::{CacheStore, Cached, LockId, Ttl};

/// Un-prefixed cache facade.
#[derive(Debug)]
pub struct GlobalCache<S> {
    store: Arc<S>,
    locks: LockManager<S>,
}

impl<S> Clone for GlobalCache<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            locks: self.locks.clone(),
        }
    }
}

impl<S: CacheStore> GlobalCache<S> {
    /// Create a facade over a shared store.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            locks: LockManager::new(Arc::clone(&store)),
            store,
        }
    }

    pub async fn get<T: DeserializeOwned + Send>(
        &self,
        ctx: &RequestContext,
        key: &GlobalKey,
    ) -> CacheResult<Option<Cached<T>>> {
        within(ctx.deadline(), "get", self.store.get(key.as_str())).await
    }

    pub async fn set<T: Serialize + Sync>(
        &self,
        ctx: &RequestContext,
        key: &GlobalKey,
        value: &T,
        expected_etag: Option<&str>,
        ttl: Ttl,
    ) -> CacheResult<String> {
        within(
            ctx.deadline(),
            "set",
            self.store.set(key.as_str(), value, expected_etag, ttl),
        )
        .await
    }

    pub async fn delete(&self, ctx: &RequestContext, key: &GlobalKey) -> CacheResult<()> {
        within(ctx.deadline(), "delete", self.store.delete(key.as_str())).await
    }

    pub async fn invalidate_pattern(
        &self,
        ctx: &RequestContext,
        pattern: &GlobalPattern,
    ) -> CacheResult<u64> {
        within(
            ctx.deadline(),
            "invalidate_pattern",
            self.store.invalidate_pattern(pattern.as_str()),
        )
        .await
    }

    pub async fn acquire_lock(
        &self,
        ctx: &RequestContext,
        key: &GlobalKey,
        ttl: Duration,
    ) -> CacheResult<LockId> {
        self.locks.acquire(ctx, key.as_str(), ttl).await
    }

    pub async fn release_lock(
        &self,
        ctx: &RequestContext,
        key: &GlobalKey,
        lock_id: &LockId,
    ) -> CacheResult<()> {
        self.locks.release(ctx, key.as_str(), lock_id).await
    }

    pub async fn run_exclusive<F, Fut, T, E>(
        &self,
        ctx: &RequestContext,
        key: &GlobalKey,
        ttl: Duration,
        work: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        E: From<CacheError>,
    {
        self.locks.run_exclusive(ctx, key.as_str(), ttl, work).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::MemoryBackend;
    use crate::cache::versioned::VersionedCache;
    use syllabus_core::{keys, TenantId};

    fn cache() -> GlobalCache<VersionedCache<MemoryBackend>> {
        GlobalCache::new(Arc::new(VersionedCache::with_defaults(MemoryBackend::new())))
    }

    #[tokio::test]
    async fn test_works_without_tenant() {
        let cache = cache();
        let ctx = RequestContext::anonymous();
        let tenant = TenantId::now_v7();

        cache
            .set(&ctx, &keys::identity_tenant("auth0|abc"), &tenant, None, Ttl::Default)
            .await
            .unwrap();

        let read: Cached<TenantId> = cache
            .get(&ctx, &keys::identity_tenant("auth0|abc"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read.value, tenant);
        assert!(cache
            .store
            .backend()
            .contains("identity_tenant:auth0|abc")
            .unwrap());
    }

    #[tokio::test]
    async fn test_invalidate_identity_mappings() {
        let cache = cache();
        let ctx = RequestContext::anonymous();
        for identity in ["a", "b", "c"] {
            cache
                .set(&ctx, &keys::identity_tenant(identity), &identity, None, Ttl::Default)
                .await
                .unwrap();
        }
        assert_eq!(
            cache
                .invalidate_pattern(&ctx, &keys::all_identity_mappings())
                .await
                .unwrap(),
            3
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_deadline_is_a_timeout() {
        let cache = cache();
        let ctx = RequestContext::anonymous().with_deadline(tokio::time::Instant::now());
        tokio::time::advance(Duration::from_millis(1)).await;

        let err = cache
            .get::<u32>(&ctx, &keys::identity_tenant("a"))
            .await
            .unwrap_err();
        assert_eq!(err, CacheError::Timeout { operation: "get" });
    }
}
