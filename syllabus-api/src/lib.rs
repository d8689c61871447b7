//! Syllabus API - Service Composition
//!
//! Wires the tenancy core for services: PostgreSQL pooling, the row-level
//! security transaction guard, environment configuration, tracing, and the
//! [`CoreServices`] bundle handed to request handlers.

pub mod config;
pub mod db;
pub mod error;
pub mod rls;
pub mod state;
pub mod telemetry;

pub use config::ServiceConfig;
pub use db::DbConfig;
pub use error::{StartupError, StartupResult};
pub use rls::{RlsGuard, SessionVar, SessionVars, SUPERADMIN_VAR, TENANT_VAR};
pub use state::{CoreServices, ServiceStore};
pub use telemetry::{init_tracing, LogFormat, TelemetryConfig};
