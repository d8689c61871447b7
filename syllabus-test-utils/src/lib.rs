//! Syllabus Test Utilities
//!
//! Shared test infrastructure for the Syllabus workspace:
//! - Proptest generators for tenant ids, contexts and course keys
//! - Fixtures wiring in-memory cache stores
//! - Assertions for cache error outcomes

// Re-export core types for convenience
pub use syllabus_core::{
    keys, CacheError, CacheResult, RequestContext, TenantContext, TenantId, TenantKey,
    TenantPattern,
};
pub use syllabus_storage::{
    CacheConfig, Cached, GlobalCache, LockManager, MemoryBackend, TenantCache, Ttl,
    VersionedCache,
};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Minimal course projection used as a cached payload in tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseSummary {
    pub id: u64,
    pub title: String,
    pub status: String,
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for tenancy types.

    use super::*;
    use proptest::prelude::*;

    /// Generate a random UUID.
    pub fn arb_uuid() -> impl Strategy<Value = Uuid> {
        any::<[u8; 16]>().prop_map(Uuid::from_bytes)
    }

    /// Generate a random TenantId.
    pub fn arb_tenant_id() -> impl Strategy<Value = TenantId> {
        arb_uuid().prop_map(TenantId::from_uuid)
    }

    /// Generate two distinct tenant ids.
    pub fn arb_tenant_pair() -> impl Strategy<Value = (TenantId, TenantId)> {
        (arb_tenant_id(), arb_tenant_id()).prop_filter("tenants must differ", |(a, b)| a != b)
    }

    /// Generate a course status, including glob metacharacters.
    pub fn arb_status() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("draft".to_string()),
            Just("published".to_string()),
            Just("archived".to_string()),
            "[a-z*?\\[\\]]{1,12}",
        ]
    }

    /// Generate a tenant-scoped logical key from the key generators.
    pub fn arb_tenant_key() -> impl Strategy<Value = TenantKey> {
        prop_oneof![
            any::<u64>().prop_map(|id| keys::course(id)),
            Just(keys::courses_all()),
            arb_status().prop_map(|s| keys::courses_by_status(&s)),
            Just(keys::course_library_index()),
        ]
    }

    /// Generate a tenant-scoped invalidation pattern from the key generators.
    pub fn arb_tenant_pattern() -> impl Strategy<Value = TenantPattern> {
        prop_oneof![
            Just(keys::all_courses()),
            Just(keys::course_listings()),
            Just(keys::everything()),
            arb_status().prop_map(|s| keys::course_listing_for_status(&s)),
        ]
    }

    /// Generate a course payload.
    pub fn arb_course_summary() -> impl Strategy<Value = CourseSummary> {
        (any::<u64>(), "[A-Za-z ]{1,40}", arb_status()).prop_map(|(id, title, status)| {
            CourseSummary { id, title, status }
        })
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;
    use std::sync::Arc;

    /// In-memory store with default configuration.
    pub type MemoryStore = VersionedCache<MemoryBackend>;

    /// Create an in-memory versioned store.
    pub fn memory_store() -> Arc<MemoryStore> {
        Arc::new(VersionedCache::with_defaults(MemoryBackend::new()))
    }

    /// Create an in-memory versioned store with a custom configuration.
    pub fn memory_store_with(config: &CacheConfig) -> Arc<MemoryStore> {
        Arc::new(VersionedCache::new(MemoryBackend::new(), config))
    }

    /// Tenant-scoped and global facades over one fresh in-memory store.
    pub fn memory_caches() -> (TenantCache<MemoryStore>, GlobalCache<MemoryStore>) {
        let store = memory_store();
        (TenantCache::new(Arc::clone(&store)), GlobalCache::new(store))
    }

    /// Request context for a fresh tenant.
    pub fn tenant_request() -> (TenantId, RequestContext) {
        let id = TenantId::now_v7();
        (id, RequestContext::for_tenant(id))
    }

    /// Request context for a superadmin with no tenant of its own.
    pub fn superadmin_request() -> RequestContext {
        RequestContext::with_tenant(TenantContext::superadmin())
    }

    /// A course payload.
    pub fn course(id: u64, title: &str) -> CourseSummary {
        CourseSummary {
            id,
            title: title.to_string(),
            status: "draft".to_string(),
        }
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for cache outcomes.

    use super::*;

    /// Assert that a result is an etag conflict and return the current etag.
    #[track_caller]
    pub fn assert_etag_mismatch<T: std::fmt::Debug>(result: &CacheResult<T>) -> String {
        match result {
            Err(CacheError::EtagMismatch { current_etag, .. }) => current_etag.clone(),
            other => panic!("Expected EtagMismatch, got: {:?}", other),
        }
    }

    /// Assert that a result is lock contention.
    #[track_caller]
    pub fn assert_lock_held<T: std::fmt::Debug>(result: &CacheResult<T>) {
        match result {
            Err(CacheError::LockHeld { .. }) => {}
            other => panic!("Expected LockHeld, got: {:?}", other),
        }
    }
}
