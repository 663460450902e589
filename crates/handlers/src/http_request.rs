// Outbound HTTP request handler

use crate::parse_payload;
use async_trait::async_trait;
use goflow_core::port::{HandlerError, HandlerOutput, HandlerResult, JobHandler};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method};
use serde::Deserialize;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct HttpRequestPayload {
    url: String,
    method: Option<String>,
    body: Option<serde_json::Value>,
}

/// `http_request`: `{url, method?="GET", body?}`
pub struct HttpRequestHandler {
    client: Client,
}

impl HttpRequestHandler {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl JobHandler for HttpRequestHandler {
    async fn handle(&self, payload: &serde_json::Value) -> HandlerResult {
        let params: HttpRequestPayload = parse_payload("http_request", payload)?;

        let method_str = params.method.as_deref().unwrap_or("GET");
        let method = Method::from_bytes(method_str.to_uppercase().as_bytes())
            .map_err(|_| HandlerError::validation(format!("invalid method: {method_str}")))?;

        let mut request = self
            .client
            .request(method, &params.url)
            .timeout(REQUEST_TIMEOUT)
            .header(CONTENT_TYPE, "application/json");
        if let Some(body) = &params.body {
            request = request.body(body.to_string());
        }

        let response = request
            .send()
            .await
            .map_err(|e| HandlerError::upstream(format!("request failed: {e}")))?;

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
