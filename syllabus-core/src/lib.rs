//! Syllabus Core - Tenancy Types
//!
//! Pure data structures shared by the storage and API crates: tenant
//! identity, the per-request context, typed cache keys, and the error
//! taxonomy. No I/O lives here.

pub mod context;
pub mod error;
pub mod identity;
pub mod keys;

pub use context::{RequestContext, TenantContext};
pub use error::{
    CacheError, CacheResult, ConfigError, DatabaseError, IsolationViolation, SyllabusError,
    SyllabusResult,
};
pub use identity::TenantId;
pub use keys::{GlobalKey, GlobalPattern, TenantKey, TenantPattern};
