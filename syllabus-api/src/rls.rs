//! Row-level security transaction guard.
//!
//! Every tenant-visible query runs inside a transaction whose first
//! statements copy the request's tenant identity into transaction-local
//! session variables. Database policies filter rows on those variables, so
//! the guard is the only place tenant identity crosses into the database.
//!
//! `set_config(name, value, true)` scopes the variable to the transaction:
//! it is gone after commit or rollback, and a pooled connection never
//! carries one tenant's identity into the next checkout.

use std::future::Future;

use deadpool_postgres::{Pool, Transaction};
use futures_util::future::BoxFuture;
use syllabus_core::{DatabaseError, RequestContext};
use tokio::time::Instant;

use crate::db::{pool_error, query_error};

/// Session variable holding the current tenant id.
pub const TENANT_VAR: &str = "app.tenant_id";

/// Session variable that bypasses tenant filtering when `'true'`.
pub const SUPERADMIN_VAR: &str = "app.is_superadmin";

// ============================================================================
// SESSION VARIABLE PLAN
// ============================================================================

/// One transaction-local variable assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionVar {
    pub name: &'static str,
    pub value: String,
}

impl SessionVar {
    /// Parameterized statement assigning this variable for the transaction.
    pub fn statement(&self) -> String {
        format!("SELECT set_config('{}', $1, true)", self.name)
    }
}

/// The variables a transaction sets for a given request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionVars(Vec<SessionVar>);

impl SessionVars {
    /// Plan the assignments for `ctx`:
    ///
    /// - no tenant context: nothing is set, and policies see no tenant;
    /// - a regular tenant: `app.tenant_id` is set to its id;
    /// - a superadmin: only `app.is_superadmin = 'true'` is set.
    pub fn for_context(ctx: &RequestContext) -> Self {
        let Some(tenant) = ctx.tenant() else {
            return Self::default();
        };

        if tenant.is_superadmin() {
            return Self(vec![SessionVar {
                name: SUPERADMIN_VAR,
                value: "true".to_string(),
            }]);
        }

        match tenant.tenant_id() {
            Some(id) => Self(vec![SessionVar {
                name: TENANT_VAR,
                value: id.to_string(),
            }]),
            None => Self::default(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &SessionVar> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ============================================================================
// GUARD
// ============================================================================

/// Runs caller logic inside a tenant-scoped transaction.
#[derive(Clone)]
pub struct RlsGuard {
    pool: Pool,
}

impl std::fmt::Debug for RlsGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RlsGuard")
            .field("pool", &self.pool.status())
            .finish()
    }
}

impl RlsGuard {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Get a reference to the pool.
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    /// Run `work` in a tenant-scoped transaction and discard its value.
    pub async fn run_in_transaction<F, E>(&self, ctx: &RequestContext, work: F) -> Result<(), E>
    where
        F: for<'c> FnOnce(&'c Transaction<'c>) -> BoxFuture<'c, Result<(), E>> + Send,
        E: From<DatabaseError> + Send,
    {
        self.run_in_transaction_with_result(ctx, work).await
    }

    /// Run `work` in a tenant-scoped transaction and return its value.
    ///
    /// 1. Check out a connection and begin a transaction.
    /// 2. Apply [`SessionVars::for_context`].
    /// 3. Run `work`.
    /// 4. Commit if everything succeeded, roll back otherwise.
    ///
    /// Steps 1 to 3 are bounded by the request deadline. On expiry the
    /// transaction is dropped, which rolls it back, and
    /// `DatabaseError::Timeout` is returned. The commit is not bounded: once
    /// `COMMIT` is sent its outcome is awaited, so a transaction that the
    /// server committed is never reported as timed out.
    pub async fn run_in_transaction_with_result<T, F, E>(
        &self,
        ctx: &RequestContext,
        work: F,
    ) -> Result<T, E>
    where
        T: Send,
        F: for<'c> FnOnce(&'c Transaction<'c>) -> BoxFuture<'c, Result<T, E>> + Send,
        E: From<DatabaseError> + Send,
    {
        let deadline = ctx.deadline();

        let mut client = bounded(deadline, self.pool.get())
            .await
            .ok_or_else(|| timed_out::<E>(ctx))?
            .map_err(|e| E::from(pool_error(e)))?;
        let tx = bounded(deadline, client.transaction())
            .await
            .ok_or_else(|| timed_out::<E>(ctx))?
            .map_err(|e| E::from(query_error(e)))?;

        // Returning early drops `tx`, which rolls it back without waiting
        // for a statement still running on the server.
        let outcome = bounded(deadline, async {
            for var in SessionVars::for_context(ctx).iter() {
                if let Err(e) = tx.execute(var.statement().as_str(), &[&var.value]).await {
                    return Err(E::from(DatabaseError::SessionVariable {
                        variable: var.name,
                        reason: e.to_string(),
                    }));
                }
            }
            work(&tx).await
        })
        .await
        .ok_or_else(|| timed_out::<E>(ctx))?;

        match outcome {
            Ok(value) => {
                tx.commit().await.map_err(|e| DatabaseError::Commit {
                    reason: e.to_string(),
                })?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(
                        error = %rollback_err,
                        "Rollback failed; connection will discard the transaction"
                    );
                }
                Err(e)
            }
        }
    }
}

/// Run one phase of the transaction. `None` means the deadline passed first.
async fn bounded<Fut: Future>(deadline: Option<Instant>, phase: Fut) -> Option<Fut::Output> {
    match deadline {
        Some(at) if Instant::now() >= at => None,
        Some(at) => tokio::time::timeout_at(at, phase).await.ok(),
        None => Some(phase.await),
    }
}

fn timed_out<E: From<DatabaseError>>(ctx: &RequestContext) -> E {
    tracing::warn!(
        tenant_id = ?ctx.tenant_id(),
        "Transaction exceeded request deadline; rolled back"
    );
    E::from(DatabaseError::Timeout)
}
