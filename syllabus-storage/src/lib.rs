//! Syllabus Storage - Versioned Cache and Locks
//!
//! The shared cache layered on the tenant boundary: a versioned store with
//! optimistic concurrency over Redis or memory, tenant-scoped and global
//! facades, and a distributed lock manager.

pub mod cache;

pub use cache::{
    AnyCacheStore, CacheBackendKind, CacheConfig, CacheStats, CacheStore, Cached,
    CourseInvalidator, EntryBackend, GlobalCache, LockId, LockManager, MemoryBackend,
    NoopCacheStore, RedisBackend, RedisCacheError, TenantCache, Ttl, VersionedCache,
};
