//! # Database Persistence Layer
//!
//! PostgreSQL backing for the registry catalog via SQLx. The database is
//! optional: without `DATABASE_URL` the catalog is kept in JSON files under
//! `DATA_DIR` instead.

pub mod kv;

pub use kv::PgKv;

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};

/// Pool sizing for the catalog; traffic is a handful of small JSON rows
/// per request.
const MAX_CONNECTIONS: u32 = 8;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connect to `url` and bring the `kv_documents` schema up to date.
pub async fn init_pool(url: &str) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(url)
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!(max_connections = MAX_CONNECTIONS, "catalog database ready");
    Ok(pool)
}
