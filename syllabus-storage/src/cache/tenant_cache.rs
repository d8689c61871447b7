//! Tenant-scoped cache facade.
//!
//! Every store key is derived from the request's tenant id and a
//! [`TenantKey`], so two tenants using the same logical key never touch the
//! same entry. Invalidation patterns are scoped the same way and can only
//! reach the current tenant's keys.
//!
//! # Fail fast
//!
//! Calling any method without a tenant id in the [`RequestContext`] is a
//! programming error, not a runtime condition. The facade panics with an
//! [`IsolationViolation`] message before the store is touched, so the
//! mistake cannot be converted into a cache miss by `?`, `.ok()` or a
//! default value. Superadmin contexts are held to the same rule: the RLS
//! bypass does not extend to cache namespaces.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use syllabus_core::{
    CacheError, CacheResult, IsolationViolation, RequestContext, TenantId, TenantKey,
    TenantPattern,
};

use super::deadline::within;
use super::lock::LockManager;
use super::traits::{CacheStore, Cached, LockId, Ttl};

/// Cache facade that namespaces every key under the current tenant.
#[derive(Debug)]
pub struct TenantCache<S> {
    store: Arc<S>,
    locks: LockManager<S>,
}

impl<S> Clone for TenantCache<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            locks: self.locks.clone(),
        }
    }
}

fn require_tenant(ctx: &RequestContext, operation: &'static str) -> TenantId {
    match ctx.tenant_id() {
        Some(tenant_id) => tenant_id,
        None => {
            let violation = IsolationViolation { operation };
            tracing::error!(
                operation,
                superadmin = ctx.tenant().is_some_and(|t| t.is_superadmin()),
                "Tenant-scoped cache used without a tenant id"
            );
            panic!("{violation}");
        }
    }
}

impl<S: CacheStore> TenantCache<S> {
    /// Create a facade over a shared store.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            locks: LockManager::new(Arc::clone(&store)),
            store,
        }
    }

    /// Get a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn get<T: DeserializeOwned + Send>(
        &self,
        ctx: &RequestContext,
        key: &TenantKey,
    ) -> CacheResult<Option<Cached<T>>> {
        let tenant_id = require_tenant(ctx, "get");
        let store_key = key.scoped(tenant_id);
        within(ctx.deadline(), "get", self.store.get(&store_key)).await
    }

    /// Write a value for the current tenant. See [`CacheStore::set`].
    pub async fn set<T: Serialize + Sync>(
        &self,
        ctx: &RequestContext,
        key: &TenantKey,
        value: &T,
        expected_etag: Option<&str>,
        ttl: Ttl,
    ) -> CacheResult<String> {
        let tenant_id = require_tenant(ctx, "set");
        let store_key = key.scoped(tenant_id);
        within(
            ctx.deadline(),
            "set",
            self.store.set(&store_key, value, expected_etag, ttl),
        )
        .await
    }

    pub async fn delete(&self, ctx: &RequestContext, key: &TenantKey) -> CacheResult<()> {
        let tenant_id = require_tenant(ctx, "delete");
        let store_key = key.scoped(tenant_id);
        within(ctx.deadline(), "delete", self.store.delete(&store_key)).await
    }

    /// Delete the current tenant's keys matching `pattern`.
    pub async fn invalidate_pattern(
        &self,
        ctx: &RequestContext,
        pattern: &TenantPattern,
    ) -> CacheResult<u64> {
        let tenant_id = require_tenant(ctx, "invalidate_pattern");
        let store_pattern = pattern.scoped(tenant_id);
        within(
            ctx.deadline(),
            "invalidate_pattern",
            self.store.invalidate_pattern(&store_pattern),
        )
        .await
    }

    pub async fn acquire_lock(
        &self,
        ctx: &RequestContext,
        key: &TenantKey,
        ttl: Duration,
    ) -> CacheResult<LockId> {
        let tenant_id = require_tenant(ctx, "acquire_lock");
        self.locks.acquire(ctx, &key.scoped(tenant_id), ttl).await
    }

    pub async fn release_lock(
        &self,
        ctx: &RequestContext,
        key: &TenantKey,
        lock_id: &LockId,
    ) -> CacheResult<()> {
        let tenant_id = require_tenant(ctx, "release_lock");
        self.locks.release(ctx, &key.scoped(tenant_id), lock_id).await
    }

    /// Run `work` while holding the current tenant's lock on `key`.
    /// See [`LockManager::run_exclusive`].
    pub async fn run_exclusive<F, Fut, T, E>(
        &self,
        ctx: &RequestContext,
        key: &TenantKey,
        ttl: Duration,
        work: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
        E: From<CacheError>,
    {
        let tenant_id = require_tenant(ctx, "run_exclusive");
        self.locks
            .run_exclusive(ctx, &key.scoped(tenant_id), ttl, work)
            .await
    }
}
