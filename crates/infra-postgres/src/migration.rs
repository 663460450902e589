// Migration Runner

use goflow_core::error::{AppError, Result};
use sqlx::PgPool;
use tracing::info;

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    info!("Running database migrations...");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version BIGINT PRIMARY KEY,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(db_err)?;

    let current_version: i64 =
        sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
            .fetch_one(pool)
            .await
            .map_err(db_err)?;

    info!(version = current_version, "Current schema version");

    if current_version < 1 {
        info!("Applying migration 001: jobs table");
        apply_migration(pool, 1, include_str!("../migrations/001_jobs.sql")).await?;
    }

    info!("All migrations applied successfully");
    Ok(())
}

/// Apply a single migration file and record its version, atomically
async fn apply_migration(pool: &PgPool, version: i64, sql: &str) -> Result<()> {
    let mut tx = pool.begin().await.map_err(db_err)?;

    for statement in sql.split(';') {
        let clean_statement: String = statement
            .lines()
            .filter(|line| !line.trim().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string();

        if !clean_statement.is_empty() {
            sqlx::query(&clean_statement)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }
    }

    sqlx::query("INSERT INTO schema_version (version) VALUES ($1)")
        .bind(version)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

    tx.commit().await.map_err(db_err)?;
    Ok(())
}

fn db_err(err: sqlx::Error) -> AppError {
    AppError::Database(format!("migration failed: {err}"))
}
