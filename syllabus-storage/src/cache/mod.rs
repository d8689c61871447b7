//! Versioned, tenant-isolated cache.
//!
//! # Layers
//!
//! - [`EntryBackend`]: atomic primitives of a shared key/value store
//!   ([`RedisBackend`] in production, [`MemoryBackend`] for tests and
//!   single-node development).
//! - [`VersionedCache`]: the [`CacheStore`] implementation. Entries carry a
//!   monotonic version, an ETag, a write timestamp and a TTL. Writes can be
//!   conditional on the ETag the caller last read, and entries older than
//!   the staleness window are evicted on read.
//! - [`TenantCache`] and [`GlobalCache`]: facades that derive store keys
//!   from typed keys. Tenant keys cannot be built without a tenant id, and
//!   a tenant-scoped call without one panics instead of missing.
//! - [`LockManager`]: non-blocking TTL locks with owner-checked release.
//!
//! # Example
//!
//! ```ignore
//! let ctx = RequestContext::for_tenant(tenant_id);
//! let listing = tenant_cache.get::<Vec<Course>>(&ctx, &keys::courses_all()).await?;
//!
//! // Write back only if nobody else did in the meantime.
//! let expected = listing.as_ref().map(|c| c.etag.as_str());
//! let etag = tenant_cache
//!     .set(&ctx, &keys::courses_all(), &courses, expected, Ttl::Default)
//!     .await?;
//! ```

pub mod any;
pub mod config;
mod deadline;
pub mod entry;
pub mod global_cache;
mod glob;
pub mod invalidation;
pub mod lock;
pub mod memory;
pub mod noop;
pub mod redis_backend;
pub mod tenant_cache;
pub mod traits;
pub mod versioned;

pub use any::AnyCacheStore;
pub use config::{CacheBackendKind, CacheConfig};
pub use entry::{compute_etag, CacheEntry};
pub use global_cache::GlobalCache;
pub use invalidation::CourseInvalidator;
pub use lock::LockManager;
pub use memory::MemoryBackend;
pub use noop::NoopCacheStore;
pub use redis_backend::{RedisBackend, RedisCacheError};
pub use tenant_cache::TenantCache;
pub use traits::{
    CacheStats, CacheStore, Cached, EntryBackend, EntryWrite, LockId, Ttl, WriteOutcome,
};
pub use versioned::VersionedCache;
