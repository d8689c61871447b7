use syllabus_api::{DbConfig, RlsGuard};

/// Guard over a pool of `max_size` connections to the database described by
/// the `SYLLABUS_DB_*` variables.
pub fn test_guard(max_size: usize) -> RlsGuard {
    let pool = DbConfig::from_env()
        .with_max_size(max_size)
        .create_pool()
        .expect("Failed to create database pool");
    RlsGuard::new(pool)
}
