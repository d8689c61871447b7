//! Typed cache keys and the generator functions that build them.
//!
//! Tenant data and global data use distinct key types so one can never be
//! passed where the other is expected:
//!
//! - [`TenantKey`] / [`TenantPattern`] are accepted only by the tenant-scoped
//!   cache, which prefixes them with `tenant:{tenant_id}:`.
//! - [`GlobalKey`] / [`GlobalPattern`] are accepted only by the global cache,
//!   which passes them through unmodified.
//!
//! Keys and patterns can only be constructed by the generators in this module,
//! so point lookups and bulk invalidation always agree on the key shape.

use std::fmt;

use crate::identity::TenantId;

/// Prefix for tenant-scoped store keys.
pub const TENANT_PREFIX: &str = "tenant";

/// Prefix for distributed lock store keys.
pub const LOCK_PREFIX: &str = "lock";

// ============================================================================
// KEY TYPES
// ============================================================================

/// Logical key for tenant-owned data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantKey(String);

/// Glob pattern over tenant-owned logical keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantPattern(String);

/// Logical key for system-wide data resolvable before a tenant is known.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GlobalKey(String);

/// Glob pattern over global logical keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GlobalPattern(String);

impl TenantKey {
    /// The logical (unprefixed) key.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The store key for this logical key under `tenant_id`.
    pub fn scoped(&self, tenant_id: TenantId) -> String {
        format!("{}{}", tenant_prefix(tenant_id), self.0)
    }
}

impl TenantPattern {
    /// The logical (unprefixed) pattern.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The store-level glob for this pattern under `tenant_id`.
    pub fn scoped(&self, tenant_id: TenantId) -> String {
        format!("{}{}", tenant_prefix(tenant_id), self.0)
    }
}

impl GlobalKey {
    /// The store key, identical to the logical key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl GlobalPattern {
    /// The store-level glob, identical to the logical pattern.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for GlobalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `tenant:{tenant_id}:`
pub fn tenant_prefix(tenant_id: TenantId) -> String {
    format!("{}:{}:", TENANT_PREFIX, tenant_id)
}

/// The store key of the lock guarding `store_key`.
pub fn lock_key(store_key: &str) -> String {
    format!("{}:{}", LOCK_PREFIX, store_key)
}

/// Escape Redis glob metacharacters in a dynamic key segment.
pub fn escape_glob(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for c in segment.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// ============================================================================
// TENANT KEY GENERATORS
// ============================================================================

/// `course:{id}`
pub fn course(course_id: impl fmt::Display) -> TenantKey {
    TenantKey(format!("course:{}", course_id))
}

/// `courses:all`
pub fn courses_all() -> TenantKey {
    TenantKey("courses:all".to_string())
}

/// `courses:status:{status}`
pub fn courses_by_status(status: &str) -> TenantKey {
    TenantKey(format!("courses:status:{}", status))
}

/// `course_library:index`, the expensive derived value rebuilt under a lock.
pub fn course_library_index() -> TenantKey {
    TenantKey("course_library:index".to_string())
}

/// Every single-course entry: `course:*`
pub fn all_courses() -> TenantPattern {
    TenantPattern("course:*".to_string())
}

/// Every course listing (`courses:all`, `courses:status:*`): `courses:*`
pub fn course_listings() -> TenantPattern {
    TenantPattern("courses:*".to_string())
}

/// Listings for one status: `courses:status:{status}`, escaped.
pub fn course_listing_for_status(status: &str) -> TenantPattern {
    TenantPattern(format!("courses:status:{}", escape_glob(status)))
}

/// Everything cached for a tenant: `*`
pub fn everything() -> TenantPattern {
    TenantPattern("*".to_string())
}

// ============================================================================
// GLOBAL KEY GENERATORS
// ============================================================================

/// `identity_tenant:{identity}`, mapping an external identity to its tenant.
pub fn identity_tenant(identity: &str) -> GlobalKey {
    GlobalKey(format!("identity_tenant:{}", identity))
}

/// Every identity mapping: `identity_tenant:*`
pub fn all_identity_mappings() -> GlobalPattern {
    GlobalPattern("identity_tenant:*".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_tenant_key_scoping() {
        let tenant = TenantId::from_uuid(Uuid::nil());
        assert_eq!(
            courses_all().scoped(tenant),
            "tenant:00000000-0000-0000-0000-000000000000:courses:all"
        );
    }

    #[test]
    fn test_generators_shape() {
        assert_eq!(course(42).as_str(), "course:42");
        assert_eq!(courses_by_status("draft").as_str(), "courses:status:draft");
        assert_eq!(identity_tenant("auth0|abc").as_str(), "identity_tenant:auth0|abc");
    }

    #[test]
    fn test_lock_key() {
        assert_eq!(lock_key("course_library:index"), "lock:course_library:index");
    }

    #[test]
    fn test_escape_glob() {
        assert_eq!(escape_glob("a*b?[c]\\"), "a\\*b\\?\\[c\\]\\\\");
        assert_eq!(escape_glob("published"), "published");
    }

    #[test]
    fn test_listing_pattern_escapes_status() {
        assert_eq!(
            course_listing_for_status("x*").as_str(),
            "courses:status:x\\*"
        );
    }

    #[test]
    fn test_same_logical_key_different_tenants() {
        let a = TenantId::now_v7();
        let b = TenantId::now_v7();
        assert_ne!(courses_all().scoped(a), courses_all().scoped(b));
    }
}
