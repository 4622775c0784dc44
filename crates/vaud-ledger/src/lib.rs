//! Relational audit ledger.
//!
//! Holds a mirrored row per job and the append-only request log. Nothing
//! here is read to decide job state.

pub mod config;
pub mod error;
pub mod models;
pub mod repositories;

use sqlx::postgres::PgPoolOptions;
use tracing::info;

pub use config::LedgerConfig;
pub use error::{LedgerError, LedgerResult};
pub use models::{JobRow, RequestLog};
pub use repositories::{JobRowRepo, RequestLogRepo};

pub type DbPool = sqlx::PgPool;

/// Create a connection pool.
pub async fn create_pool(config: &LedgerConfig) -> LedgerResult<DbPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(&config.database_url)
        .await?;
    info!("Connected to ledger database");
    Ok(pool)
}

/// Apply pending schema migrations.
pub async fn run_migrations(pool: &DbPool) -> LedgerResult<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
