//! Database Connection Pool Module
//!
//! PostgreSQL connection pooling using deadpool-postgres. Tenant-scoped
//! access goes through [`RlsGuard`](crate::rls::RlsGuard); this module only
//! owns configuration, pool construction and error mapping.

use deadpool_postgres::{
    Config, ManagerConfig, Pool, PoolConfig, PoolError, RecyclingMethod, Runtime, Timeouts,
};
use std::time::Duration;
use syllabus_core::DatabaseError;
use tokio_postgres::NoTls;

// ============================================================================
// CONNECTION POOL CONFIGURATION
// ============================================================================

/// Database connection pool configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// PostgreSQL host
    pub host: String,
    /// PostgreSQL port
    pub port: u16,
    /// Database name
    pub dbname: String,
    /// Database user
    pub user: String,
    /// Database password
    pub password: String,
    /// Maximum pool size
    pub max_size: usize,
    /// Connection timeout
    pub timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            dbname: "syllabus".to_string(),
            user: "postgres".to_string(),
            password: "".to_string(),
            max_size: 16,
            timeout: Duration::from_secs(30),
        }
    }
}

impl DbConfig {
    /// Create a new database configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("SYLLABUS_DB_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("SYLLABUS_DB_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5432),
            dbname: std::env::var("SYLLABUS_DB_NAME").unwrap_or_else(|_| "syllabus".to_string()),
            user: std::env::var("SYLLABUS_DB_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: std::env::var("SYLLABUS_DB_PASSWORD").unwrap_or_default(),
            max_size: std::env::var("SYLLABUS_DB_POOL_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(16),
            timeout: Duration::from_secs(
                std::env::var("SYLLABUS_DB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }

    /// Set the maximum pool size.
    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size.max(1);
        self
    }

    /// Create a connection pool from this configuration.
    ///
    /// Connections are opened lazily, so this succeeds without a reachable
    /// server.
    pub fn create_pool(&self) -> Result<Pool, DatabaseError> {
        let mut cfg = Config::new();
        cfg.host = Some(self.host.clone());
        cfg.port = Some(self.port);
        cfg.dbname = Some(self.dbname.clone());
        cfg.user = Some(self.user.clone());
        cfg.password = Some(self.password.clone());

        cfg.manager = Some(ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        });
        cfg.pool = Some(PoolConfig {
            max_size: self.max_size,
            timeouts: Timeouts {
                wait: Some(self.timeout),
                create: Some(self.timeout),
                recycle: Some(self.timeout),
            },
            ..Default::default()
        });

        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| DatabaseError::Pool {
                reason: format!("Failed to create pool: {}", e),
            })
    }
}

// ============================================================================
// ERROR MAPPING
// ============================================================================

/// Map a pool checkout failure.
pub fn pool_error(err: PoolError) -> DatabaseError {
    tracing::error!("Connection pool error: {:?}", err);

    let reason = match err {
        PoolError::Timeout(_) => "connection pool exhausted".to_string(),
        PoolError::Closed => "connection pool is closed".to_string(),
        other => other.to_string(),
    };
    DatabaseError::Pool { reason }
}

/// Map a query or protocol failure.
pub fn query_error(err: tokio_postgres::Error) -> DatabaseError {
    tracing::error!("Database error: {:?}", err);
    DatabaseError::Query {
        reason: err.to_string(),
    }
}
