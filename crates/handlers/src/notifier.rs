// Automatic terminal callback (the TerminalNotifier implementation)

use crate::signing::{sign_sha256, SIGNATURE_HEADER};
use async_trait::async_trait;
use goflow_core::domain::JobId;
use goflow_core::error::{AppError, Result};
use goflow_core::port::{JobStore, TerminalNotifier};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const CALLBACK_TIMEOUT: Duration = Duration::from_secs(10);

/// Fires one signed POST per terminal transition for jobs whose payload
/// carries a non-empty `callback_url`. Delivery is fire-and-forget: a
/// failure is logged by the worker and never retried here (submit an
/// explicit `callback` job for retried delivery).
pub struct HttpCallbackNotifier {
    store: Arc<dyn JobStore>,
    client: Client,
}

impl HttpCallbackNotifier {
    pub fn new(store: Arc<dyn JobStore>, client: Client) -> Self {
        Self { store, client }
    }
}

#[async_trait]
impl TerminalNotifier for HttpCallbackNotifier {
    async fn notify(&self, job_id: JobId, payload: &Value) -> Result<()> {
        let Some(url) = payload
            .get("callback_url")
            .and_then(Value::as_str)
            .filter(|u| !u.is_empty())
        else {
            return Ok(());
        };
        let secret = payload
            .get("callback_secret")
            .and_then(Value::as_str)
            .unwrap_or("");

        // Read the just-written row so the report reflects the terminal state
        let job = self
            .store
            .find_by_id(job_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("job {job_id} not found")))?;

        let mut body = serde_json::json!({
            "job_id": job_id,
            "status": job.status,
        });
        if let Some(response) = job.response_body {
            body["response"] = response;
        }
        if let Some(error) = job.last_error {
            body["error"] = Value::String(error);
        }
        let body_bytes = body.to_string().into_bytes();

        let mut request = self
            .client
            .post(url)
            .timeout(CALLBACK_TIMEOUT)
            .header(CONTENT_TYPE, "application/json");
        if !secret.is_empty() {
            request = request.header(SIGNATURE_HEADER, sign_sha256(secret, &body_bytes));
        }

        let response = request
            .body(body_bytes)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("callback send failed: {e}")))?;

        info!(
            job_id = job_id,
            callback_status = response.status().as_u16(),
            "Terminal callback sent"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use goflow_core::port::job_store::mocks::InMemoryJobStore;
    use goflow_core::port::time_provider::mocks::ManualClock;

    #[tokio::test]
    async fn missing_callback_url_is_a_noop() {
        let clock = Arc::new(ManualClock::new(Utc.timestamp_opt(0, 0).unwrap()));
        let store = Arc::new(InMemoryJobStore::new(clock));
        let notifier = HttpCallbackNotifier::new(store, Client::new());

        // No URL configured: returns Ok without touching the store or network
        notifier
            .notify(1, &serde_json::json!({"other": "field"}))
            .await
            .unwrap();
        notifier
            .notify(1, &serde_json::json!({"callback_url": ""}))
            .await
            .unwrap();
    }
}
