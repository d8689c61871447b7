//! Shared service handles.
//!
//! [`CoreServices`] is built once at startup and cloned into whatever needs
//! it. There are no process-wide singletons: every component receives its
//! collaborators from here.

use std::sync::Arc;

use deadpool_postgres::Pool;
use syllabus_storage::{AnyCacheStore, CourseInvalidator, GlobalCache, LockManager, TenantCache};

use crate::config::ServiceConfig;
use crate::error::StartupResult;
use crate::rls::RlsGuard;

/// Cache store type used by services.
pub type ServiceStore = AnyCacheStore;

/// The tenancy core's components, wired together.
#[derive(Clone)]
pub struct CoreServices {
    /// Tenant-scoped database access.
    pub rls: RlsGuard,
    /// The store shared by every cache facade below.
    pub store: Arc<ServiceStore>,
    pub tenant_cache: TenantCache<ServiceStore>,
    pub global_cache: GlobalCache<ServiceStore>,
    pub locks: LockManager<ServiceStore>,
    pub courses: CourseInvalidator<ServiceStore>,
}

impl std::fmt::Debug for CoreServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreServices")
            .field("rls", &self.rls)
            .field("cache", &self.store.kind())
            .finish_non_exhaustive()
    }
}

impl CoreServices {
    /// Build the pool and cache store from `config` and wire them.
    pub async fn connect(config: &ServiceConfig) -> StartupResult<Self> {
        let pool = config.db.create_pool()?;
        let store = AnyCacheStore::from_config(&config.cache).await?;

        tracing::info!(
            db_host = %config.db.host,
            db_name = %config.db.dbname,
            pool_size = config.db.max_size,
            cache = ?store.kind(),
            "Core services ready"
        );

        Ok(Self::from_parts(pool, store))
    }

    /// Wire already-built parts.
    pub fn from_parts(pool: Pool, store: ServiceStore) -> Self {
        let store = Arc::new(store);
        let tenant_cache = TenantCache::new(Arc::clone(&store));
        Self {
            rls: RlsGuard::new(pool),
            global_cache: GlobalCache::new(Arc::clone(&store)),
            locks: LockManager::new(Arc::clone(&store)),
            courses: CourseInvalidator::new(tenant_cache.clone()),
            tenant_cache,
            store,
        }
    }
}
