//! Tenant context carrier.
//!
//! A [`TenantContext`] is resolved once per unit of work (by the auth layer,
//! outside this crate) and travels inside a [`RequestContext`] together with
//! the caller's deadline. Both are immutable once built.
//!
//! Explicit threading (`&RequestContext` parameters) is the primary way to
//! propagate the context. [`RequestContext::scope`] additionally installs it
//! as a task-local for code that cannot take the parameter.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::identity::TenantId;

tokio::task_local! {
    static CURRENT_REQUEST: RequestContext;
}

/// The tenant identity attached to a unit of work.
///
/// Fields are private: a normal context always carries a tenant id, and only
/// superadmin contexts may lack one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TenantContext {
    tenant_id: Option<TenantId>,
    is_superadmin: bool,
}

impl TenantContext {
    /// A regular unit of work for one tenant.
    pub fn for_tenant(tenant_id: TenantId) -> Self {
        Self {
            tenant_id: Some(tenant_id),
            is_superadmin: false,
        }
    }

    /// A superadmin unit of work with no tenant of its own.
    pub fn superadmin() -> Self {
        Self {
            tenant_id: None,
            is_superadmin: true,
        }
    }

    /// A superadmin unit of work acting on behalf of a specific tenant.
    ///
    /// Row-level security is still bypassed; the tenant id only selects the
    /// cache namespace.
    pub fn superadmin_acting_as(tenant_id: TenantId) -> Self {
        Self {
            tenant_id: Some(tenant_id),
            is_superadmin: true,
        }
    }

    /// The tenant id, if one is attached.
    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    /// Whether row-level tenant filtering is bypassed.
    pub fn is_superadmin(&self) -> bool {
        self.is_superadmin
    }
}

/// Per-unit-of-work context: optional tenant identity plus optional deadline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    tenant: Option<TenantContext>,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// A context with no tenant established (e.g. before login).
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A context carrying the given tenant identity.
    pub fn with_tenant(tenant: TenantContext) -> Self {
        Self {
            tenant: Some(tenant),
            deadline: None,
        }
    }

    /// Shorthand for `with_tenant(TenantContext::for_tenant(id))`.
    pub fn for_tenant(tenant_id: TenantId) -> Self {
        Self::with_tenant(TenantContext::for_tenant(tenant_id))
    }

    /// Attach an absolute deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Attach a deadline relative to now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// The tenant identity, or `None` when no tenant has been established.
    ///
    /// Absence is distinct from any tenant id value.
    pub fn tenant(&self) -> Option<&TenantContext> {
        self.tenant.as_ref()
    }

    /// The tenant id used to namespace tenant-scoped storage, if any.
    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant.and_then(|t| t.tenant_id())
    }

    /// The caller's deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline. `None` means unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Run `fut` with this context installed as the task-local current request.
    pub async fn scope<F: Future>(self, fut: F) -> F::Output {
        CURRENT_REQUEST.scope(self, fut).await
    }

    /// The context installed by [`RequestContext::scope`], if any.
    pub fn try_current() -> Option<RequestContext> {
        CURRENT_REQUEST.try_with(Clone::clone).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normal_context_always_has_tenant() {
        let id = TenantId::now_v7();
        let ctx = TenantContext::for_tenant(id);
        assert_eq!(ctx.tenant_id(), Some(id));
        assert!(!ctx.is_superadmin());
    }

    #[test]
    fn test_superadmin_without_tenant() {
        let ctx = TenantContext::superadmin();
        assert!(ctx.is_superadmin());
        assert_eq!(ctx.tenant_id(), None);
    }

    #[test]
    fn test_anonymous_is_absent_not_zero() {
        let ctx = RequestContext::anonymous();
        assert!(ctx.tenant().is_none());
        assert!(ctx.tenant_id().is_none());
        assert!(ctx.deadline().is_none());
        assert!(ctx.remaining().is_none());
    }

    #[test]
    fn test_nil_tenant_is_still_present() {
        let ctx = RequestContext::for_tenant(TenantId::from_uuid(uuid::Uuid::nil()));
        assert!(ctx.tenant().is_some());
        assert_eq!(ctx.tenant_id(), Some(TenantId::from_uuid(uuid::Uuid::nil())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_counts_down() {
        let ctx = RequestContext::anonymous().with_timeout(Duration::from_secs(5));
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(ctx.remaining(), Some(Duration::from_secs(3)));
        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(ctx.remaining(), Some(Duration::ZERO));
    }

    #[tokio::test]
    async fn test_task_local_scope() {
        assert!(RequestContext::try_current().is_none());

        let id = TenantId::now_v7();
        let seen = RequestContext::for_tenant(id)
            .scope(async { RequestContext::try_current().and_then(|c| c.tenant_id()) })
            .await;
        assert_eq!(seen, Some(id));

        assert!(RequestContext::try_current().is_none());
    }
}
