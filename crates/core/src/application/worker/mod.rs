// Worker - Job execution loop

pub mod constants;
mod shutdown;

use constants::*;
pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::retry::{RetryDecision, RetryPolicy};
use crate::domain::{Job, JobId};
use crate::error::{AppError, Result};
use crate::port::{
    AttemptOutcome, HandlerError, HandlerRegistry, HandlerResult, JobStore, TerminalNotifier,
    TimeProvider,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Worker agent: repeatedly claims, executes and records one job at a time.
/// The pool runs several agents concurrently; the store's claim guarantees
/// no two of them ever hold the same job in flight.
pub struct Worker {
    worker_id: usize,
    store: Arc<dyn JobStore>,
    registry: Arc<HandlerRegistry>,
    retry_policy: Arc<RetryPolicy>,
    notifier: Arc<dyn TerminalNotifier>,
    time: Arc<dyn TimeProvider>,
}

impl Worker {
    pub fn new(
        worker_id: usize,
        store: Arc<dyn JobStore>,
        registry: Arc<HandlerRegistry>,
        retry_policy: Arc<RetryPolicy>,
        notifier: Arc<dyn TerminalNotifier>,
        time: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            worker_id,
            store,
            registry,
            retry_policy,
            notifier,
            time,
        }
    }

    /// Run worker loop with graceful shutdown support.
    ///
    /// Cancellation is cooperative and only consulted between iterations:
    /// an in-flight dispatch always finishes (the handler's own timeout
    /// bounds it).
    pub async fn run(&self, mut shutdown: ShutdownToken) -> Result<()> {
        info!(worker_id = self.worker_id, "Worker started");
        loop {
            if shutdown.is_shutdown() {
                break;
            }
            match self.process_next_job().await {
                Ok(true) => {}
                Ok(false) => {
                    // No job ready; poll again shortly
                    tokio::select! {
                        _ = sleep(IDLE_POLL) => {}
                        _ = shutdown.wait() => break,
                    }
                }
                Err(e) => {
                    error!(worker_id = self.worker_id, error = %e, "Worker error");
                    tokio::select! {
                        _ = sleep(ERROR_BACKOFF) => {}
                        _ = shutdown.wait() => break,
                    }
                }
            }
        }
        info!(worker_id = self.worker_id, "Worker stopped");
        Ok(())
    }

    /// Claim and process the next ready job (returns true if one was found)
    pub async fn process_next_job(&self) -> Result<bool> {
        let id = match self
            .store
            .claim_next(self.retry_policy.max_retries())
            .await?
        {
            Some(id) => id,
            None => return Ok(false),
        };

        self.process_job(id).await?;
        Ok(true)
    }

    async fn process_job(&self, id: JobId) -> Result<()> {
        let job = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("job {id} vanished after claim")))?;

        info!(
            worker_id = self.worker_id,
            job_id = id,
            job_type = %job.job_type,
            "Executing job"
        );

        let started = Instant::now();
        let result = self.dispatch(&job).await;
        let duration_ms = started.elapsed().as_millis() as i64;

        match result {
            Ok(output) => {
                let outcome = AttemptOutcome {
                    status_code: Some(output.status_code),
                    body: ensure_json_body(output.body),
                    duration_ms,
                };
                self.store.complete(id, &outcome).await?;
                info!(
                    worker_id = self.worker_id,
                    job_id = id,
                    duration_ms,
                    "Job completed"
                );
                self.notify_terminal(id, &job).await;
            }
            Err(err) => {
                let outcome = AttemptOutcome {
                    status_code: err.status_code,
                    body: ensure_json_body(err.body.clone()),
                    duration_ms,
                };
                // Diagnostics are recorded even when the attempt failed
                self.store
                    .record_failure(id, &err.to_string(), &outcome)
                    .await?;

                let retry_count = self.store.retry_count(id).await?;
                match self.retry_policy.decide(retry_count) {
                    RetryDecision::Retry(delay) => {
                        let run_at = self.time.now() + delay;
                        warn!(
                            worker_id = self.worker_id,
                            job_id = id,
                            retry_count = retry_count,
                            delay_secs = delay.num_seconds(),
                            error = %err,
                            "Retrying job after failure"
                        );
                        self.store.schedule_retry(id, run_at).await?;
                    }
                    RetryDecision::Exhausted => {
                        error!(
                            worker_id = self.worker_id,
                            job_id = id,
                            error = %err,
                            "Job failed after max retries"
                        );
                        self.store.mark_failed(id).await?;
                        self.notify_terminal(id, &job).await;
                    }
                }
            }
        }

        Ok(())
    }

    /// Invoke the handler on its own task so a panicking handler is
    /// recorded as a failed attempt instead of killing the agent
    async fn dispatch(&self, job: &Job) -> HandlerResult {
        let registry = Arc::clone(&self.registry);
        let job_type = job.job_type.clone();
        let payload = job.payload.as_value().clone();

        let handle =
            tokio::task::spawn(async move { registry.dispatch(&job_type, &payload).await });

        match handle.await {
            Ok(result) => result,
            Err(join_err) if join_err.is_panic() => {
                Err(HandlerError::internal("handler panicked"))
            }
            Err(join_err) => Err(HandlerError::internal(format!(
                "handler task aborted: {join_err}"
            ))),
        }
    }

    /// Callback delivery failures never alter the job's terminal status
    async fn notify_terminal(&self, id: JobId, job: &Job) {
        if let Err(e) = self.notifier.notify(id, job.payload.as_value()).await {
            warn!(job_id = id, error = %e, "Terminal callback delivery failed");
        }
    }
}

/// Response bytes must persist as valid JSON: anything that does not parse
/// is wrapped as {"raw": "<string>"}. Empty responses store as NULL.
fn ensure_json_body(bytes: Option<Vec<u8>>) -> Option<serde_json::Value> {
    let bytes = bytes?;
    if bytes.is_empty() {
        return None;
    }
    match serde_json::from_slice(&bytes) {
        Ok(value) => Some(value),
        Err(_) => Some(serde_json::json!({
            "raw": String::from_utf8_lossy(&bytes).into_owned(),
        })),
    }
}
