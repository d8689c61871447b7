//! Property-Based Tests for Cache Tenant Isolation
//!
//! For any two distinct tenants and any logical key or pattern built by the
//! key generators, writes, reads and invalidations made under one tenant's
//! context SHALL NOT observe or affect the other tenant's entries.

use proptest::prelude::*;
use syllabus_core::RequestContext;
use syllabus_storage::{Cached, Ttl};
use syllabus_test_utils::assertions::assert_etag_mismatch;
use syllabus_test_utils::fixtures::{memory_caches, memory_store};
use syllabus_test_utils::generators::{
    arb_course_summary, arb_tenant_key, arb_tenant_pair, arb_tenant_pattern,
};
use syllabus_test_utils::{CourseSummary, TenantCache};
use tokio::runtime::Runtime;

// ============================================================================
// TEST CONFIGURATION
// ============================================================================

fn test_runtime() -> Result<Runtime, TestCaseError> {
    Runtime::new().map_err(|e| TestCaseError::fail(format!("Failed to create runtime: {}", e)))
}

fn fail(e: impl std::fmt::Display) -> TestCaseError {
    TestCaseError::fail(e.to_string())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// A value written under tenant A is never visible to tenant B.
    #[test]
    fn prop_writes_are_invisible_to_other_tenants(
        (a, b) in arb_tenant_pair(),
        key in arb_tenant_key(),
        course in arb_course_summary(),
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let (cache, _) = memory_caches();
            let ctx_a = RequestContext::for_tenant(a);
            let ctx_b = RequestContext::for_tenant(b);

            cache
                .set(&ctx_a, &key, &course, None, Ttl::Default)
                .await
                .map_err(fail)?;

            let seen_by_b: Option<Cached<CourseSummary>> =
                cache.get(&ctx_b, &key).await.map_err(fail)?;
            prop_assert!(seen_by_b.is_none());

            let seen_by_a: Option<Cached<CourseSummary>> =
                cache.get(&ctx_a, &key).await.map_err(fail)?;
            prop_assert_eq!(seen_by_a.map(Cached::into_value), Some(course));
            Ok::<(), TestCaseError>(())
        })?;
    }

    /// Invalidating any pattern under tenant A leaves tenant B's entry intact.
    #[test]
    fn prop_invalidation_never_crosses_tenants(
        (a, b) in arb_tenant_pair(),
        key in arb_tenant_key(),
        pattern in arb_tenant_pattern(),
        course in arb_course_summary(),
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let (cache, _) = memory_caches();
            let ctx_a = RequestContext::for_tenant(a);
            let ctx_b = RequestContext::for_tenant(b);

            cache
                .set(&ctx_a, &key, &course, None, Ttl::Default)
                .await
                .map_err(fail)?;
            cache.set(&ctx_b, &key, &course, None, Ttl::Default).await.map_err(fail)?;

            let removed = cache.invalidate_pattern(&ctx_a, &pattern).await.map_err(fail)?;
            prop_assert!(removed <= 1);

            let b_entry: Option<Cached<CourseSummary>> =
                cache.get(&ctx_b, &key).await.map_err(fail)?;
            prop_assert!(b_entry.is_some());
            Ok::<(), TestCaseError>(())
        })?;
    }

    /// A writer holding a superseded etag is always rejected with the
    /// current etag, and the stored value is left as the winner wrote it.
    #[test]
    fn prop_stale_etag_always_conflicts(
        (tenant, _) in arb_tenant_pair(),
        key in arb_tenant_key(),
        first in arb_course_summary(),
        second in arb_course_summary(),
        third in arb_course_summary(),
    ) {
        let rt = test_runtime()?;
        rt.block_on(async {
            let cache = TenantCache::new(memory_store());
            let ctx = RequestContext::for_tenant(tenant);

            let v1 = cache.set(&ctx, &key, &first, None, Ttl::Default).await.map_err(fail)?;
            let v2 = cache.set(&ctx, &key, &second, Some(&v1), Ttl::Default).await.map_err(fail)?;

            let stale = cache.set(&ctx, &key, &third, Some(&v1), Ttl::Default).await;
            // Identical payloads written in the same millisecond share an etag.
            if v1 != v2 {
                prop_assert_eq!(assert_etag_mismatch(&stale), v2.clone());
                let stored: Option<Cached<CourseSummary>> =
                    cache.get(&ctx, &key).await.map_err(fail)?;
                let stored = stored.ok_or_else(|| fail("entry missing"))?;
                prop_assert_eq!(stored.version, 2);
                prop_assert_eq!(stored.etag, v2);
                prop_assert_eq!(stored.value, second);
            }
            Ok::<(), TestCaseError>(())
        })?;
    }
}
