// Signed webhook delivery handler

use crate::parse_payload;
use crate::signing::{sign_sha256, SIGNATURE_HEADER};
use async_trait::async_trait;
use goflow_core::port::{HandlerError, HandlerOutput, HandlerResult, JobHandler};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    url: String,
    event: String,
    #[serde(default)]
    data: serde_json::Value,
    secret: String,
}

/// `webhook_delivery`: POSTs `{event, data}` with an HMAC-SHA256
/// signature over the exact body bytes
pub struct WebhookDeliveryHandler {
    client: Client,
}

impl WebhookDeliveryHandler {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl JobHandler for WebhookDeliveryHandler {
    async fn handle(&self, payload: &serde_json::Value) -> HandlerResult {
        let params: WebhookPayload = parse_payload("webhook_delivery", payload)?;

        let body = serde_json::json!({
            "event": params.event,
            "data": params.data,
        });
        let body_bytes = body.to_string().into_bytes();
        let signature = sign_sha256(&params.secret, &body_bytes);

        let response = self
            .client
            .post(&params.url)
            .timeout(REQUEST_TIMEOUT)
            .header(CONTENT_TYPE, "application/json")
            .header(SIGNATURE_HEADER, signature)
            .body(body_bytes)
            .send()
            .await
            .map_err(|e| HandlerError::upstream(format!("delivery failed: {e}")))?;

        let status = response.status().as_u16() as i32;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| HandlerError::upstream(format!("failed to read response: {e}")))?
            .to_vec();

        if status >= 400 {
            return Err(HandlerError::upstream_with_response(
                format!("http status {status}"),
                status,
                Some(bytes),
            ));
        }

        Ok(HandlerOutput::new(status, Some(bytes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use goflow_core::port::HandlerErrorKind;

    #[tokio::test]
    async fn rejects_payload_without_secret() {
        let handler = WebhookDeliveryHandler::new(Client::new());
        let err = handler
            .handle(&serde_json::json!({
                "url": "http://example.com/hook",
                "event": "user.created",
                "data": {"id": 7},
            }))
            .await
            .unwrap_err();
        assert_eq!(err.kind, HandlerErrorKind::Validation);
        assert!(err.message.contains("secret"));
    }
}
