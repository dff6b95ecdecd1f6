//! kba-db
//!
//! Storage side of the ingestion core: the [`Storage`] / [`SchemaManager`]
//! contracts, their Postgres implementations, and connection helpers.

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;

pub mod pg;
pub mod schema;
pub mod storage;

pub use pg::PgStorage;
pub use schema::{ensure_tables, PgSchema, SchemaManager, TableDef};
pub use sqlx::PgPool;
pub use storage::{quote_ident, Row, Storage, StorageError};

pub const ENV_DB_URL: &str = "KBA_DATABASE_URL";

/// Connect to Postgres using the URL in env var `url_env`.
pub async fn connect_from_env_var(url_env: &str, max_connections: u32) -> Result<PgPool> {
    let url = std::env::var(url_env).with_context(|| format!("missing env var {url_env}"))?;
    connect(&url, max_connections).await
}

/// Connect to Postgres using KBA_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    connect_from_env_var(ENV_DB_URL, 10).await
}

pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;
    Ok(pool)
}

/// Connectivity plus how many of the expected tables are missing.
pub async fn status(pool: &PgPool, schema: &dyn SchemaManager) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let missing = schema
        .missing_tables()
        .await
        .context("status missing-tables query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        missing_tables: missing,
    })
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub missing_tables: Vec<String>,
}
