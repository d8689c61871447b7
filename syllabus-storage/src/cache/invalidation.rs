//! Course cache invalidation.
//!
//! Used by repositories after a write and by background job producers
//! after they change course data. All patterns come from the key
//! generators, so invalidation always matches the keys readers populate.

use std::fmt;

use syllabus_core::{keys, CacheResult, RequestContext};

use super::tenant_cache::TenantCache;
use super::traits::CacheStore;

/// Invalidates course entries for the current tenant.
#[derive(Debug)]
pub struct CourseInvalidator<S> {
    cache: TenantCache<S>,
}

impl<S> Clone for CourseInvalidator<S> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
        }
    }
}

impl<S: CacheStore> CourseInvalidator<S> {
    pub fn new(cache: TenantCache<S>) -> Self {
        Self { cache }
    }

    /// A course was created, updated or deleted: drop its entry, every
    /// listing, and the library index. Returns the number of keys removed.
    pub async fn course_changed(
        &self,
        ctx: &RequestContext,
        course_id: impl fmt::Display,
    ) -> CacheResult<u64> {
        self.cache.delete(ctx, &keys::course(course_id)).await?;
        let listings = self
            .cache
            .invalidate_pattern(ctx, &keys::course_listings())
            .await?;
        self.cache
            .delete(ctx, &keys::course_library_index())
            .await?;
        Ok(listings)
    }

    /// Drop the listing for one status only.
    pub async fn status_listing_changed(
        &self,
        ctx: &RequestContext,
        status: &str,
    ) -> CacheResult<u64> {
        self.cache
            .invalidate_pattern(ctx, &keys::course_listing_for_status(status))
            .await
    }

    /// Drop every course entry and listing, e.g. after a bulk import.
    pub async fn all_courses_changed(&self, ctx: &RequestContext) -> CacheResult<u64> {
        let courses = self.cache.invalidate_pattern(ctx, &keys::all_courses()).await?;
        let listings = self
            .cache
            .invalidate_pattern(ctx, &keys::course_listings())
            .await?;
        self.cache
            .delete(ctx, &keys::course_library_index())
            .await?;
        Ok(courses + listings)
    }

    /// Drop everything cached for the current tenant.
    pub async fn tenant_reset(&self, ctx: &RequestContext) -> CacheResult<u64> {
        let removed = self.cache.invalidate_pattern(ctx, &keys::everything()).await?;
        tracing::info!(tenant_id = ?ctx.tenant_id(), removed, "Reset tenant cache");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::MemoryBackend;
    use crate::cache::traits::{Cached, Ttl};
    use crate::cache::versioned::VersionedCache;
    use std::sync::Arc;
    use syllabus_core::TenantId;

    type Store = VersionedCache<MemoryBackend>;

    async fn seeded(ctx: &RequestContext) -> (TenantCache<Store>, CourseInvalidator<Store>) {
        let cache = TenantCache::new(Arc::new(VersionedCache::with_defaults(MemoryBackend::new())));
        for id in 1..=3u32 {
            cache
                .set(ctx, &keys::course(id), &id, None, Ttl::Default)
                .await
                .unwrap();
        }
        cache
            .set(ctx, &keys::courses_all(), &vec![1u32, 2, 3], None, Ttl::Default)
            .await
            .unwrap();
        cache
            .set(ctx, &keys::courses_by_status("draft"), &vec![2u32], None, Ttl::Default)
            .await
            .unwrap();
        cache
            .set(ctx, &keys::course_library_index(), &"index", None, Ttl::Default)
            .await
            .unwrap();
        let invalidator = CourseInvalidator::new(cache.clone());
        (cache, invalidator)
    }

    #[tokio::test]
    async fn test_course_changed() {
        let ctx = RequestContext::for_tenant(TenantId::now_v7());
        let (cache, invalidator) = seeded(&ctx).await;

        assert_eq!(invalidator.course_changed(&ctx, 2).await.unwrap(), 2);

        assert!(cache.get::<u32>(&ctx, &keys::course(2)).await.unwrap().is_none());
        assert!(cache.get::<u32>(&ctx, &keys::course(1)).await.unwrap().is_some());
        assert!(cache
            .get::<Vec<u32>>(&ctx, &keys::courses_all())
            .await
            .unwrap()
            .is_none());
        let index: Option<Cached<String>> =
            cache.get(&ctx, &keys::course_library_index()).await.unwrap();
        assert!(index.is_none());
    }

    #[tokio::test]
    async fn test_status_listing_changed() {
        let ctx = RequestContext::for_tenant(TenantId::now_v7());
        let (cache, invalidator) = seeded(&ctx).await;

        assert_eq!(invalidator.status_listing_changed(&ctx, "draft").await.unwrap(), 1);
        assert!(cache
            .get::<Vec<u32>>(&ctx, &keys::courses_all())
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_all_courses_changed_and_reset() {
        let ctx = RequestContext::for_tenant(TenantId::now_v7());
        let (_, invalidator) = seeded(&ctx).await;

        assert_eq!(invalidator.all_courses_changed(&ctx).await.unwrap(), 5);
        // The library index went with the courses.
        assert_eq!(invalidator.tenant_reset(&ctx).await.unwrap(), 0);
    }
}
