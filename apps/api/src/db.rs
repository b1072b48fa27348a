use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Connection pool for the version record store. Acquire waits are capped
/// well below the reconciler's data-call timeout so pool exhaustion surfaces
/// as an error instead of eating the whole save window.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
        .context("connecting to the version record store")?;

    info!("database pool ready");
    Ok(pool)
}
