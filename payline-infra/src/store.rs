//! Postgres pool setup and Store error helpers.
//!
//! Queries are written with runtime binding (no compile-time checked
//! macros); schemas live in each service's `schema.sql` and migrations are
//! managed outside the services.

use std::time::Duration;

use anyhow::Context as _;
use sqlx::postgres::{PgPool, PgPoolOptions};

/// Default connection pool size per service.
const MAX_CONNECTIONS: u32 = 10;
/// How long to wait for a pooled connection before giving up.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connect a service's Store pool. The pool is the one process-wide
/// singleton each service owns for its database.
pub async fn connect(database_url: &str) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(database_url)
        .await
        .context("Could not connect to Postgres")
}

/// Whether this Store error is a Postgres unique constraint violation
/// (SQLSTATE 23505), i.e. an idempotency conflict. These are absorbed, not
/// retried.
pub fn is_unique_violation(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db_err) =>
            db_err.code().as_deref() == Some("23505"),
        _ => false,
    }
}
