//! Distributed lock manager.
//!
//! Locks are short-lived, non-blocking and TTL-bounded. Contention is an
//! expected outcome (`CacheError::LockHeld`) that the caller resolves, for
//! example by serving the previous value instead of recomputing it.
//!
//! Keys handed to [`LockManager`] are store keys; the tenant-scoped and
//! global caches derive them from typed keys before delegating here.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use syllabus_core::{CacheError, CacheResult, RequestContext};

use super::deadline::within;
use super::traits::{CacheStore, LockId};

/// Acquire/release and run-exclusively over a [`CacheStore`].
#[derive(Debug)]
pub struct LockManager<S> {
    store: Arc<S>,
}

impl<S> Clone for LockManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: CacheStore> LockManager<S> {
    /// Create a lock manager over a shared store.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Try to take the lock on `key` without waiting.
    pub async fn acquire(
        &self,
        ctx: &RequestContext,
        key: &str,
        ttl: Duration,
    ) -> CacheResult<LockId> {
        within(ctx.deadline(), "acquire_lock", self.store.acquire_lock(key, ttl)).await
    }

    /// Release the lock on `key` if `lock_id` still holds it.
    pub async fn release(
        &self,
        ctx: &RequestContext,
        key: &str,
        lock_id: &LockId,
    ) -> CacheResult<()> {
        within(ctx.deadline(), "release_lock", self.store.release_lock(key, lock_id)).await
    }

    /// Acquire the lock on `key`, run `work`, then release.
    ///
    /// Contention fails fast with `CacheError::LockHeld` and `work` is not
    /// run. Once acquired, the lock is released whatever `work` returns.
    /// The release is not bounded by the request deadline, and a failed
    /// release is logged and otherwise ignored: the TTL frees the lock and
    /// the caller gets the result of `work`.
    pub async fn run_exclusive<F, Fut, T, E>(
        &self,
        ctx: &RequestContext,
        key: &str,
        ttl: Duration,
        work: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        E: From<CacheError>,
    {
        let lock_id = self.acquire(ctx, key, ttl).await?;

        let result = work().await;

        let release = RequestContext::anonymous().scope(self.store.release_lock(key, &lock_id));
        if let Err(e) = release.await {
            tracing::warn!(
                key,
                lock_id = %lock_id,
                error = %e,
                "Failed to release lock after exclusive section"
            );
        }

        result
    }
}
