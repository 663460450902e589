// Postgres JobStore Implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use goflow_core::domain::{Job, JobId, JobPayload, JobStatus, NewJob};
use goflow_core::error::{AppError, Result};
use goflow_core::port::{AttemptOutcome, JobStore, TimeProvider};
use sqlx::PgPool;
use std::sync::Arc;

// Helper to convert sqlx::Error to AppError with structured information
fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => {
            if let Some(code) = db_err.code() {
                let code_str = code.as_ref();

                // Postgres error codes: https://www.postgresql.org/docs/current/errcodes-appendix.html
                match code_str {
                    "23505" => AppError::Database(format!(
                        "Unique constraint violation: {} ({})",
                        db_err.message(),
                        code_str
                    )),
                    "23503" => AppError::Database(format!(
                        "Foreign key constraint violation: {} ({})",
                        db_err.message(),
                        code_str
                    )),
                    "40001" | "40P01" => AppError::Database(format!(
                        "Transaction conflict ({}): {}",
                        code_str,
                        db_err.message()
                    )),
                    "53300" => {
                        AppError::Database(format!("Too many connections: {}", db_err.message()))
                    }
                    _ => AppError::Database(format!(
                        "Database error [{}]: {}",
                        code_str,
                        db_err.message()
                    )),
                }
            } else {
                AppError::Database(format!("Database error: {}", db_err.message()))
            }
        }
        sqlx::Error::RowNotFound => AppError::Database("Row not found".to_string()),
        sqlx::Error::ColumnNotFound(col) => {
            AppError::Database(format!("Column not found: {col}"))
        }
        _ => AppError::Database(err.to_string()),
    }
}

pub struct PgJobStore {
    pool: PgPool,
    time: Arc<dyn TimeProvider>,
}

impl PgJobStore {
    pub fn new(pool: PgPool, time: Arc<dyn TimeProvider>) -> Self {
        Self { pool, time }
    }

    /// A zero-row conditional update means the row either vanished or
    /// already left `processing` (sweeper reclaim or terminal state).
    /// Distinguish the two for the caller.
    async fn reject_transition(&self, id: JobId, to: &str) -> AppError {
        let current: std::result::Result<Option<String>, sqlx::Error> =
            sqlx::query_scalar("SELECT status FROM jobs WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await;

        match current {
            Ok(None) => AppError::NotFound(format!("job {id} not found")),
            Ok(Some(status)) => AppError::InvalidState(format!(
                "cannot update job {id} from {status} to {to}"
            )),
            Err(e) => map_sqlx_error(e),
        }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn insert(&self, new_job: NewJob) -> Result<Job> {
        let now = self.time.now();

        let row = sqlx::query_as::<_, JobRow>(
            r#"
            INSERT INTO jobs (type, payload, status, retry_count, run_at, created_at, updated_at)
            VALUES ($1, $2, 'pending', 0, $3, $4, $4)
            RETURNING *
            "#,
        )
        .bind(&new_job.job_type)
        .bind(&new_job.payload)
        .bind(new_job.run_at)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.into_job()
    }

    async fn find_by_id(&self, id: JobId) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(JobRow::into_job).transpose()
    }

    async fn list_all(&self) -> Result<Vec<Job>> {
        let rows: Vec<JobRow> = sqlx::query_as("SELECT * FROM jobs ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobRow::into_job).collect()
    }

    async fn claim_next(&self, max_retries: i32) -> Result<Option<JobId>> {
        let now = self.time.now();

        // One statement claim: lowest ready id, skip-locked so concurrent
        // agents never block on (or double-claim) the same row
        let id: Option<JobId> = sqlx::query_scalar(
            r#"
            UPDATE jobs
            SET status = 'processing',
                updated_at = $1
            WHERE id = (
                SELECT id FROM jobs
                WHERE status = 'pending'
                  AND retry_count < $2
                  AND run_at <= $1
                ORDER BY id
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id
            "#,
        )
        .bind(now)
        .bind(max_retries)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(id)
    }

    async fn complete(&self, id: JobId, outcome: &AttemptOutcome) -> Result<()> {
        let now = self.time.now();

        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'completed',
                response_status = $2,
                response_body = $3,
                execution_time_ms = $4,
                last_error = NULL,
                updated_at = $5
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(id)
        .bind(outcome.status_code)
        .bind(&outcome.body)
        .bind(outcome.duration_ms)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(self.reject_transition(id, "completed").await);
        }
        Ok(())
    }

    async fn record_failure(
        &self,
        id: JobId,
        error: &str,
        outcome: &AttemptOutcome,
    ) -> Result<()> {
        let now = self.time.now();

        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET last_error = $2,
                response_status = $3,
                response_body = $4,
                execution_time_ms = $5,
                updated_at = $6
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(outcome.status_code)
        .bind(&outcome.body)
        .bind(outcome.duration_ms)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(self.reject_transition(id, "processing").await);
        }
        Ok(())
    }

    async fn retry_count(&self, id: JobId) -> Result<i32> {
        let count: Option<i32> = sqlx::query_scalar("SELECT retry_count FROM jobs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        count.ok_or_else(|| AppError::NotFound(format!("job {id} not found")))
    }

    async fn schedule_retry(&self, id: JobId, run_at: DateTime<Utc>) -> Result<()> {
        let now = self.time.now();

        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'pending',
                retry_count = retry_count + 1,
                run_at = $2,
                updated_at = $3
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(id)
        .bind(run_at)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(self.reject_transition(id, "pending").await);
        }
        Ok(())
    }

    async fn mark_failed(&self, id: JobId) -> Result<()> {
        let now = self.time.now();

        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'failed',
                retry_count = retry_count + 1,
                updated_at = $2
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(self.reject_transition(id, "failed").await);
        }
        Ok(())
    }

    async fn release_expired(&self, older_than: chrono::Duration) -> Result<u64> {
        let now = self.time.now();
        let cutoff = now - older_than;

        // Crashed workers do not consume an attempt: retry_count untouched
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'pending',
                updated_at = $1
            WHERE status = 'processing'
              AND updated_at < $2
            "#,
        )
        .bind(now)
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(result.rows_affected())
    }

    async fn count_by_status(&self, status: JobStatus) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE status = $1")
            .bind(status.to_string())
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(count)
    }
}

/// Postgres row representation
#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: i64,
    #[sqlx(rename = "type")]
    job_type: String,
    payload: Option<serde_json::Value>,
    status: String,
    retry_count: i32,
    run_at: DateTime<Utc>,
    last_error: Option<String>,
    response_status: Option<i32>,
    response_body: Option<serde_json::Value>,
    execution_time_ms: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl JobRow {
    fn into_job(self) -> Result<Job> {
        let status = JobStatus::parse(&self.status).ok_or_else(|| {
            AppError::Database(format!("job {} has unknown status '{}'", self.id, self.status))
        })?;

        Ok(Job {
            id: self.id,
            job_type: self.job_type,
            payload: JobPayload::new(self.payload.unwrap_or(serde_json::Value::Null)),
            status,
            retry_count: self.retry_count,
            run_at: self.run_at,
            last_error: self.last_error,
            response_status: self.response_status,
            response_body: self.response_body,
            execution_time_ms: self.execution_time_ms,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations};
    use goflow_core::port::time_provider::SystemTimeProvider;

    async fn setup_store() -> PgJobStore {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a test db");
        let pool = create_pool(&url).await.unwrap();
        run_migrations(&pool).await.unwrap();
        PgJobStore::new(pool, Arc::new(SystemTimeProvider))
    }

    fn a_job() -> NewJob {
        NewJob {
            job_type: "http_request".to_string(),
            payload: serde_json::json!({"url": "http://example.com"}),
            run_at: Utc::now(),
        }
    }

    // Requires a running Postgres; run with:
    //   DATABASE_URL=postgres://... cargo test -p goflow-infra-postgres -- --ignored
    #[tokio::test]
    #[ignore]
    async fn insert_claim_complete_round_trip() {
        let store = setup_store().await;

        let job = store.insert(a_job()).await.unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.retry_count, 0);

        let claimed = store.claim_next(3).await.unwrap();
        assert_eq!(claimed, Some(job.id));

        let outcome = AttemptOutcome {
            status_code: Some(200),
            body: Some(serde_json::json!({"ok": true})),
            duration_ms: 12,
        };
        store.complete(job.id, &outcome).await.unwrap();

        let stored = store.find_by_id(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
        assert_eq!(stored.response_status, Some(200));
    }

    #[tokio::test]
    #[ignore]
    async fn terminal_rows_reject_updates() {
        let store = setup_store().await;

        let job = store.insert(a_job()).await.unwrap();
        store.claim_next(3).await.unwrap();
        store.mark_failed(job.id).await.unwrap();

        let err = store
            .complete(
                job.id,
                &AttemptOutcome {
                    status_code: Some(200),
                    body: None,
                    duration_ms: 1,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidState(_)));
    }
}
