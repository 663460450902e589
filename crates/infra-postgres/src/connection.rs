// Postgres Connection Pool Setup

use goflow_core::error::{AppError, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// Create the Postgres connection pool.
///
/// # Configuration
/// - `GOFLOW_POOL_SIZE`: Max connections (default: 20)
/// - `GOFLOW_POOL_TIMEOUT`: Acquire timeout in seconds (default: 5)
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    let max_connections: u32 = std::env::var("GOFLOW_POOL_SIZE")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(20);

    let acquire_timeout_secs: u64 = std::env::var("GOFLOW_POOL_TIMEOUT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(5);

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(acquire_timeout_secs))
        .connect(database_url)
        .await
        .map_err(|e| AppError::Database(format!("pool creation failed: {e}")))?;

    Ok(pool)
}
