// Cron continuation producer

use crate::{parse_payload, NextJob};
use async_trait::async_trait;
use cron::Schedule;
use goflow_core::domain::NewJob;
use goflow_core::port::{
    HandlerError, HandlerOutput, HandlerResult, JobHandler, JobStore, TimeProvider,
};
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Deserialize)]
struct CronSchedulePayload {
    cron: String,
    job: NextJob,
}

/// `cron_schedule`: computes the next UTC occurrence of a 5-field POSIX
/// cron expression and inserts two rows at that instant - the underlying
/// job, and a copy of this very job so the schedule perpetuates itself.
/// Windows missed while the service was down are not caught up.
pub struct CronScheduleHandler {
    store: Arc<dyn JobStore>,
    time: Arc<dyn TimeProvider>,
}

impl CronScheduleHandler {
    pub fn new(store: Arc<dyn JobStore>, time: Arc<dyn TimeProvider>) -> Self {
        Self { store, time }
    }
}

#[async_trait]
impl JobHandler for CronScheduleHandler {
    async fn handle(&self, payload: &serde_json::Value) -> HandlerResult {
        let params: CronSchedulePayload = parse_payload("cron_schedule", payload)?;

        let schedule = parse_cron(&params.cron)?;
        let now = self.time.now();
        let next_run = schedule
            .after(&now)
            .next()
            .ok_or_else(|| HandlerError::validation("cron expression has no future occurrence"))?;

        self.store
            .insert(NewJob {
                job_type: params.job.job_type.clone(),
                payload: params.job.payload,
                run_at: next_run,
            })
            .await
            .map_err(|e| HandlerError::upstream(format!("failed to schedule job: {e}")))?;

        // Re-enqueue the full schedule payload so the next firing repeats it
        self.store
            .insert(NewJob {
                job_type: "cron_schedule".to_string(),
                payload: payload.clone(),
                run_at: next_run,
            })
            .await
            .map_err(|e| HandlerError::upstream(format!("failed to re-enqueue schedule: {e}")))?;

        info!(
            cron = %params.cron,
            next_run_at = %next_run,
            scheduled_job_type = %params.job.job_type,
            "Scheduled cron occurrence"
        );

        Ok(HandlerOutput::json(
            200,
            &serde_json::json!({
                "next_run_at": next_run.to_rfc3339(),
                "scheduled_job_type": params.job.job_type,
            }),
        ))
    }
}

/// Parse a 5-field POSIX expression (minute hour day-of-month month
/// day-of-week) by pinning the seconds field to zero
fn parse_cron(expr: &str) -> Result<Schedule, HandlerError> {
    let trimmed = expr.trim();
    if trimmed.split_whitespace().count() != 5 {
        return Err(HandlerError::validation(format!(
            "cron expression must have 5 fields: '{expr}'"
        )));
    }
    Schedule::from_str(&format!("0 {trimmed}"))
        .map_err(|e| HandlerError::validation(format!("invalid cron expression '{expr}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike, Utc};
    use goflow_core::domain::JobStatus;
    use goflow_core::port::job_store::mocks::InMemoryJobStore;
    use goflow_core::port::time_provider::mocks::ManualClock;
    use goflow_core::port::HandlerErrorKind;

    #[test]
    fn five_field_expressions_parse() {
        assert!(parse_cron("*/5 * * * *").is_ok());
        assert!(parse_cron("0 12 * * 1").is_ok());
        assert!(parse_cron("bogus").is_err());
        assert!(parse_cron("* * * * * *").is_err());
    }

    #[test]
    fn next_occurrence_lands_on_the_minute() {
        let schedule = parse_cron("*/5 * * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 10, 3, 20).unwrap();
        let next = schedule.after(&now).next().unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 1, 10, 5, 0).unwrap());
        assert_eq!(next.second(), 0);
    }

    #[tokio::test]
    async fn inserts_job_and_self_perpetuating_copy() {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 30).unwrap(),
        ));
        let store = Arc::new(InMemoryJobStore::new(clock.clone()));
        let handler = CronScheduleHandler::new(store.clone(), clock.clone());

        let payload = serde_json::json!({
            "cron": "*/1 * * * *",
            "job": {"type": "http_request", "payload": {"url": "http://x"}},
        });
        let out = handler.handle(&payload).await.unwrap();
        assert_eq!(out.status_code, 200);

        let jobs = store.list_all().await.unwrap();
        assert_eq!(jobs.len(), 2);

        let expected_run = Utc.with_ymd_and_hms(2024, 3, 1, 10, 1, 0).unwrap();
        assert_eq!(jobs[0].job_type, "http_request");
        assert_eq!(jobs[0].run_at, expected_run);
        assert_eq!(jobs[0].status, JobStatus::Pending);

        assert_eq!(jobs[1].job_type, "cron_schedule");
        assert_eq!(jobs[1].run_at, expected_run);
        // The copy carries the full original payload
        assert_eq!(jobs[1].payload.as_value(), &payload);
    }

    #[tokio::test]
    async fn rejects_malformed_expression() {
        let clock = Arc::new(ManualClock::new(Utc.timestamp_opt(0, 0).unwrap()));
        let store = Arc::new(InMemoryJobStore::new(clock.clone()));
        let handler = CronScheduleHandler::new(store, clock);

        let err = handler
            .handle(&serde_json::json!({
                "cron": "61 * * * *",
                "job": {"type": "noop", "payload": {}},
            }))
            .await
            .unwrap_err();
        assert_eq!(err.kind, HandlerErrorKind::Validation);
    }
}
