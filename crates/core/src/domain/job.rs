// Job Domain Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Job ID (server-assigned, monotonically increasing)
pub type JobId = i64;

/// Job Status
///
/// Legal transitions:
/// - `Pending -> Processing` (worker claim)
/// - `Processing -> Completed` (handler succeeded)
/// - `Processing -> Pending` (retry reschedule, or sweeper release)
/// - `Processing -> Failed` (attempts exhausted)
///
/// `Completed` and `Failed` are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Parse the lowercase storage representation
    pub fn parse(s: &str) -> Option<JobStatus> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "processing" => Some(JobStatus::Processing),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Job Payload (opaque JSON tree, owned by the handler for the job's type)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPayload(serde_json::Value);

impl JobPayload {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn into_value(self) -> serde_json::Value {
        self.0
    }
}

/// Insert shape for a new job (id and timestamps are store-assigned)
#[derive(Debug, Clone)]
pub struct NewJob {
    pub job_type: String,
    pub payload: serde_json::Value,
    pub run_at: DateTime<Utc>,
}

/// Job Entity
///
/// `updated_at` doubles as the in-flight lease timestamp: a `processing`
/// row whose `updated_at` is older than the processing timeout may be
/// released back to `pending` by the recovery sweeper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    #[serde(rename = "type")]
    pub job_type: String,
    pub payload: JobPayload,
    pub status: JobStatus,
    pub retry_count: i32,
    pub run_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub response_status: Option<i32>,
    pub response_body: Option<serde_json::Value>,
    pub execution_time_ms: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a new pending job with explicit id and timestamp
    pub fn new(
        id: JobId,
        job_type: impl Into<String>,
        payload: JobPayload,
        run_at: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            job_type: job_type.into(),
            payload,
            status: JobStatus::Pending,
            retry_count: 0,
            run_at,
            last_error: None,
            response_status: None,
            response_body: None,
            execution_time_ms: None,
            created_at,
            updated_at: created_at,
        }
    }

    /// Whether a worker may claim this job at `now`
    pub fn is_ready(&self, now: DateTime<Utc>, max_retries: i32) -> bool {
        self.status == JobStatus::Pending && self.retry_count < max_retries && self.run_at <= now
    }

    /// Transition to Processing (worker claim); stamps the lease
    pub fn start(&mut self, now: DateTime<Utc>) -> crate::domain::error::Result<()> {
        if self.status != JobStatus::Pending {
            return Err(self.bad_transition(JobStatus::Processing));
        }
        self.status = JobStatus::Processing;
        self.updated_at = now;
        Ok(())
    }

    /// Transition to Completed
    pub fn complete(&mut self, now: DateTime<Utc>) -> crate::domain::error::Result<()> {
        if self.status != JobStatus::Processing {
            return Err(self.bad_transition(JobStatus::Completed));
        }
        self.status = JobStatus::Completed;
        self.last_error = None;
        self.updated_at = now;
        Ok(())
    }

    /// Transition back to Pending for a retry; consumes one attempt
    pub fn reschedule(
        &mut self,
        run_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> crate::domain::error::Result<()> {
        if self.status != JobStatus::Processing {
            return Err(self.bad_transition(JobStatus::Pending));
        }
        self.status = JobStatus::Pending;
        self.retry_count += 1;
        self.run_at = run_at;
        self.updated_at = now;
        Ok(())
    }

    /// Transition to Failed (attempts exhausted); consumes one attempt
    pub fn fail(&mut self, now: DateTime<Utc>) -> crate::domain::error::Result<()> {
        if self.status != JobStatus::Processing {
            return Err(self.bad_transition(JobStatus::Failed));
        }
        self.status = JobStatus::Failed;
        self.retry_count += 1;
        self.updated_at = now;
        Ok(())
    }

    /// Recovery edge: release an expired in-flight lease back to Pending.
    /// Does NOT consume an attempt (a crashed worker is not the job's fault).
    pub fn release(&mut self, now: DateTime<Utc>) -> crate::domain::error::Result<()> {
        if self.status != JobStatus::Processing {
            return Err(self.bad_transition(JobStatus::Pending));
        }
        self.status = JobStatus::Pending;
        self.updated_at = now;
        Ok(())
    }

    fn bad_transition(&self, to: JobStatus) -> crate::domain::DomainError {
        crate::domain::DomainError::InvalidStatusTransition {
            from: self.status.to_string(),
            to: to.to_string(),
        }
    }
}
