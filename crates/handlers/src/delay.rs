// Delay continuation producer

use crate::{parse_payload, NextJob};
use async_trait::async_trait;
use goflow_core::domain::NewJob;
use goflow_core::port::{
    HandlerError, HandlerOutput, HandlerResult, JobHandler, JobStore, TimeProvider,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Deserialize)]
struct DelayPayload {
    seconds: i64,
    next_job: NextJob,
}

/// `delay`: inserts the wrapped job as a new pending row `seconds` in the
/// future. The delay job itself completes immediately.
pub struct DelayHandler {
    store: Arc<dyn JobStore>,
    time: Arc<dyn TimeProvider>,
}

impl DelayHandler {
    pub fn new(store: Arc<dyn JobStore>, time: Arc<dyn TimeProvider>) -> Self {
        Self { store, time }
    }
}

#[async_trait]
impl JobHandler for DelayHandler {
    async fn handle(&self, payload: &serde_json::Value) -> HandlerResult {
        let params: DelayPayload = parse_payload("delay", payload)?;

        let run_at = self.time.now() + chrono::Duration::seconds(params.seconds);
        let scheduled = self
            .store
            .insert(NewJob {
                job_type: params.next_job.job_type.clone(),
                payload: params.next_job.payload,
                run_at,
            })
            .await
            .map_err(|e| HandlerError::upstream(format!("failed to schedule next job: {e}")))?;

        info!(
            next_job_id = scheduled.id,
            next_job_type = %params.next_job.job_type,
            seconds = params.seconds,
            "Scheduled delayed continuation"
        );

        Ok(HandlerOutput::json(
            200,
            &serde_json::json!({
                "scheduled_in_seconds": params.seconds,
                "next_job_type": params.next_job.job_type,
            }),
        ))
    }
}
