// Job Store Port (Interface)

use crate::domain::{Job, JobId, JobStatus, NewJob};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

/// Diagnostic fields recorded after one dispatch attempt
#[derive(Debug, Clone)]
pub struct AttemptOutcome {
    pub status_code: Option<i32>,
    pub body: Option<serde_json::Value>,
    pub duration_ms: i64,
}

/// Repository interface for job persistence.
///
/// The mutation methods encode the state machine: `complete`,
/// `record_failure`, `schedule_retry` and `mark_failed` only apply to a
/// `processing` row and return `AppError::InvalidState` otherwise, so a
/// row that left `processing` underneath a worker (sweeper reclaim, or a
/// terminal row) is never silently overwritten.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new pending job and return the stored row
    async fn insert(&self, new_job: NewJob) -> Result<Job>;

    /// Find job by ID
    async fn find_by_id(&self, id: JobId) -> Result<Option<Job>>;

    /// All jobs ordered by id ascending
    async fn list_all(&self) -> Result<Vec<Job>>;

    /// Atomically claim the lowest-id ready job: flip it to `processing`,
    /// stamp the lease, and return its id. Rows locked by a concurrent
    /// claim are skipped, never waited on.
    async fn claim_next(&self, max_retries: i32) -> Result<Option<JobId>>;

    /// `processing -> completed`; persists the attempt outcome and clears
    /// `last_error`
    async fn complete(&self, id: JobId, outcome: &AttemptOutcome) -> Result<()>;

    /// Persist failure diagnostics without leaving `processing`
    async fn record_failure(&self, id: JobId, error: &str, outcome: &AttemptOutcome)
        -> Result<()>;

    /// Attempts already consumed (the count before the in-flight attempt)
    async fn retry_count(&self, id: JobId) -> Result<i32>;

    /// `processing -> pending` at `run_at`; consumes one attempt
    async fn schedule_retry(&self, id: JobId, run_at: DateTime<Utc>) -> Result<()>;

    /// `processing -> failed`; consumes the final attempt
    async fn mark_failed(&self, id: JobId) -> Result<()>;

    /// Release every `processing` row whose lease (`updated_at`) is older
    /// than `older_than` back to `pending`. `retry_count` is untouched.
    /// Returns the number of released rows.
    async fn release_expired(&self, older_than: Duration) -> Result<u64>;

    /// Count jobs by status
    async fn count_by_status(&self, status: JobStatus) -> Result<i64>;
}

// ============================================================================
// Mock Implementation for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::JobPayload;
    use crate::error::AppError;
    use crate::port::TimeProvider;
    use std::collections::BTreeMap;
    use std::sync::{Arc, Mutex};

    /// In-memory job store honoring the same claim and guard semantics as
    /// the Postgres adapter. The single mutex stands in for row locks:
    /// a claim observes-and-flips atomically, so no two claimants can see
    /// the same pending row.
    pub struct InMemoryJobStore {
        time: Arc<dyn TimeProvider>,
        state: Mutex<State>,
    }

    struct State {
        next_id: JobId,
        jobs: BTreeMap<JobId, Job>,
    }

    impl InMemoryJobStore {
        pub fn new(time: Arc<dyn TimeProvider>) -> Self {
            Self {
                time,
                state: Mutex::new(State {
                    next_id: 1,
                    jobs: BTreeMap::new(),
                }),
            }
        }

        fn with_job<T>(
            &self,
            id: JobId,
            f: impl FnOnce(&mut Job, DateTime<Utc>) -> Result<T>,
        ) -> Result<T> {
            let now = self.time.now();
            let mut state = self.state.lock().unwrap();
            let job = state
                .jobs
                .get_mut(&id)
                .ok_or_else(|| AppError::NotFound(format!("job {id} not found")))?;
            f(job, now)
        }
    }

    fn guard(err: crate::domain::DomainError) -> AppError {
        AppError::InvalidState(err.to_string())
    }

    #[async_trait]
    impl JobStore for InMemoryJobStore {
        async fn insert(&self, new_job: NewJob) -> Result<Job> {
            let now = self.time.now();
            let mut state = self.state.lock().unwrap();
            let id = state.next_id;
            state.next_id += 1;

            let job = Job::new(
                id,
                new_job.job_type,
                JobPayload::new(new_job.payload),
                new_job.run_at,
                now,
            );
            state.jobs.insert(id, job.clone());
            Ok(job)
        }

        async fn find_by_id(&self, id: JobId) -> Result<Option<Job>> {
            let state = self.state.lock().unwrap();
            Ok(state.jobs.get(&id).cloned())
        }

        async fn list_all(&self) -> Result<Vec<Job>> {
            let state = self.state.lock().unwrap();
            Ok(state.jobs.values().cloned().collect())
        }

        async fn claim_next(&self, max_retries: i32) -> Result<Option<JobId>> {
            let now = self.time.now();
            let mut state = self.state.lock().unwrap();
            // BTreeMap iteration order gives id-ascending claim order
            for job in state.jobs.values_mut() {
                if job.is_ready(now, max_retries) {
                    job.start(now).map_err(guard)?;
                    return Ok(Some(job.id));
                }
            }
            Ok(None)
        }

        async fn complete(&self, id: JobId, outcome: &AttemptOutcome) -> Result<()> {
            self.with_job(id, |job, now| {
                job.complete(now).map_err(guard)?;
                job.response_status = outcome.status_code;
                job.response_body = outcome.body.clone();
                job.execution_time_ms = Some(outcome.duration_ms);
                Ok(())
            })
        }

        async fn record_failure(
            &self,
            id: JobId,
            error: &str,
            outcome: &AttemptOutcome,
        ) -> Result<()> {
            self.with_job(id, |job, now| {
                if job.status != JobStatus::Processing {
                    return Err(AppError::InvalidState(format!(
                        "cannot record failure for job {id} in status {}",
                        job.status
                    )));
                }
                job.last_error = Some(error.to_string());
                job.response_status = outcome.status_code;
                job.response_body = outcome.body.clone();
                job.execution_time_ms = Some(outcome.duration_ms);
                job.updated_at = now;
                Ok(())
            })
        }

        async fn retry_count(&self, id: JobId) -> Result<i32> {
            self.with_job(id, |job, _| Ok(job.retry_count))
        }

        async fn schedule_retry(&self, id: JobId, run_at: DateTime<Utc>) -> Result<()> {
            self.with_job(id, |job, now| job.reschedule(run_at, now).map_err(guard))
        }

        async fn mark_failed(&self, id: JobId) -> Result<()> {
            self.with_job(id, |job, now| job.fail(now).map_err(guard))
        }

        async fn release_expired(&self, older_than: Duration) -> Result<u64> {
            let now = self.time.now();
            let cutoff = now - older_than;
            let mut state = self.state.lock().unwrap();
            let mut released = 0u64;
            for job in state.jobs.values_mut() {
                if job.status == JobStatus::Processing && job.updated_at < cutoff {
                    job.release(now).map_err(guard)?;
                    released += 1;
                }
            }
            Ok(released)
        }

        async fn count_by_status(&self, status: JobStatus) -> Result<i64> {
            let state = self.state.lock().unwrap();
            Ok(state.jobs.values().filter(|j| j.status == status).count() as i64)
        }
    }
}
