// Status callback handler (explicit, retryable callback delivery)

use crate::parse_payload;
use crate::signing::{sign_sha256, SIGNATURE_HEADER};
use async_trait::async_trait;
use goflow_core::port::{HandlerError, HandlerOutput, HandlerResult, JobHandler, JobStore};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct CallbackPayload {
    url: String,
    job_id: i64,
    #[serde(default)]
    include_response: bool,
    secret: Option<String>,
}

/// `callback`: reads the referenced job row and POSTs a status report.
/// Unlike the automatic terminal callback, this runs as a job of its own,
/// so failed deliveries go through the normal retry machinery.
pub struct CallbackHandler {
    store: Arc<dyn JobStore>,
    client: Client,
}

impl CallbackHandler {
    pub fn new(store: Arc<dyn JobStore>, client: Client) -> Self {
        Self { store, client }
    }
}

#[async_trait]
impl JobHandler for CallbackHandler {
    async fn handle(&self, payload: &serde_json::Value) -> HandlerResult {
        let params: CallbackPayload = parse_payload("callback", payload)?;
        if params.url.is_empty() {
            return Err(HandlerError::validation("missing 'url'"));
        }

        let job = self
            .store
            .find_by_id(params.job_id)
            .await
            .map_err(|e| HandlerError::upstream(format!("job lookup failed: {e}")))?
            .ok_or_else(|| {
                HandlerError::validation(format!("job {} not found", params.job_id))
            })?;

        let mut body = serde_json::json!({
            "job_id": params.job_id,
            "status": job.status,
        });
        if params.include_response {
            body["response"] = job.response_body.unwrap_or(Value::Null);
        }
        if let Some(error) = job.last_error {
            body["error"] = Value::String(error);
        }
        let body_bytes = body.to_string().into_bytes();

        let mut request = self
            .client
            .post(&params.url)
            .timeout(REQUEST_TIMEOUT)
            .header(CONTENT_TYPE, "application/json");
        if let Some(secret) = params.secret.as_deref().filter(|s| !s.is_empty()) {
            request = request.header(SIGNATURE_HEADER, sign_sha256(secret, &body_bytes));
        }

        let response = request
            .body(body_bytes)
            .send()
            .await
            .map_err(|e| HandlerError::upstream(format!("callback send failed: {e}")))?;

        let status = response.status().as_u16() as i32;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| HandlerError::upstream(format!("failed to read response: {e}")))?
            .to_vec();

        if status >= 400 {
            return Err(HandlerError::upstream_with_response(
                format!("callback returned status {status}"),
                status,
                Some(bytes),
            ));
        }

        Ok(HandlerOutput::new(status, Some(bytes)))
    }
}
