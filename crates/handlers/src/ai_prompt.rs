// LLM prompt dispatch handler

use crate::parse_payload;
use async_trait::async_trait;
use goflow_core::port::{HandlerError, HandlerOutput, HandlerResult, JobHandler};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(25);
const ANTHROPIC_VERSION: &str = "2023-06-01";
const ANTHROPIC_MAX_TOKENS: u32 = 1024;

#[derive(Debug, Deserialize)]
struct AiPromptPayload {
    provider: String,
    api_key: String,
    model: String,
    prompt: String,
    #[serde(default)]
    extract_content: bool,
}

/// `ai_prompt`: dispatches a single-turn prompt to one of the supported
/// providers. With `extract_content` the provider-specific response is
/// reduced to `{"content": "<text>"}`.
pub struct AiPromptHandler {
    client: Client,
}

impl AiPromptHandler {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl JobHandler for AiPromptHandler {
    async fn handle(&self, payload: &serde_json::Value) -> HandlerResult {
        let params: AiPromptPayload = parse_payload("ai_prompt", payload)?;
        for (field, value) in [
            ("provider", &params.provider),
            ("api_key", &params.api_key),
            ("model", &params.model),
            ("prompt", &params.prompt),
        ] {
            if value.is_empty() {
                return Err(HandlerError::validation(format!("missing '{field}'")));
            }
        }

        let (endpoint, body) = match params.provider.as_str() {
            "openai" => (
                "https://api.openai.com/v1/chat/completions".to_string(),
                openai_request(&params.model, &params.prompt),
            ),
            "groq" => (
                "https://api.groq.com/openai/v1/chat/completions".to_string(),
                openai_request(&params.model, &params.prompt),
            ),
            "anthropic" => (
                "https://api.anthropic.com/v1/messages".to_string(),
                anthropic_request(&params.model, &params.prompt),
            ),
            "gemini" => (
                format!(
                    "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
                    params.model, params.api_key
                ),
                gemini_request(&params.prompt),
            ),
            other => {
                return Err(HandlerError::validation(format!(
                    "unsupported provider: {other}"
                )))
            }
        };

        let mut request = self
            .client
            .post(&endpoint)
            .timeout(REQUEST_TIMEOUT)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string());
        if params.provider != "gemini" {
            request = request.bearer_auth(&params.api_key);
        }
        if params.provider == "anthropic" {
            request = request.header("anthropic-version", ANTHROPIC_VERSION);
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
                format!("provider returned status {status}"),
                status,
                Some(bytes),
            ));
        }

        if params.extract_content {
            let content = extract_provider_content(&params.provider, &bytes)?;
            return Ok(HandlerOutput::json(200, &json!({"content": content})));
        }

        Ok(HandlerOutput::new(status, Some(bytes)))
    }
}

fn openai_request(model: &str, prompt: &str) -> Value {
    json!({
        "model": model,
        "messages": [{"role": "user", "content": prompt}],
    })
}

fn anthropic_request(model: &str, prompt: &str) -> Value {
    json!({
        "model": model,
        "max_tokens": ANTHROPIC_MAX_TOKENS,
        "messages": [{"role": "user", "content": prompt}],
    })
}

fn gemini_request(prompt: &str) -> Value {
    json!({
        "contents": [{"parts": [{"text": prompt}]}],
    })
}

fn extract_provider_content(provider: &str, response: &[u8]) -> Result<String, HandlerError> {
    let parsed: Value = serde_json::from_slice(response)
        .map_err(|e| HandlerError::upstream(format!("unparseable {provider} response: {e}")))?;

    let pointer = match provider {
        "openai" | "groq" => "/choices/0/message/content",
        "anthropic" => "/content/0/text",
        "gemini" => "/candidates/0/content/parts/0/text",
        _ => {
            return Err(HandlerError::validation(format!(
                "unsupported provider for extraction: {provider}"
            )))
        }
    };

    parsed
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| HandlerError::upstream(format!("unexpected {provider} response shape")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use goflow_core::port::HandlerErrorKind;

    #[tokio::test]
    async fn rejects_unsupported_provider() {
        let handler = AiPromptHandler::new(Client::new());
        let err = handler
            .handle(&json!({
                "provider": "cohere",
                "api_key": "k",
                "model": "m",
                "prompt": "p",
            }))
            .await
            .unwrap_err();
        assert_eq!(err.kind, HandlerErrorKind::Validation);
        assert_eq!(err.message, "unsupported provider: cohere");
    }

    #[tokio::test]
    async fn rejects_empty_prompt() {
        let handler = AiPromptHandler::new(Client::new());
        let err = handler
            .handle(&json!({
                "provider": "openai",
                "api_key": "k",
                "model": "m",
                "prompt": "",
            }))
            .await
            .unwrap_err();
        assert_eq!(err.message, "missing 'prompt'");
    }

    #[test]
    fn extracts_openai_content() {
        let response = json!({
            "choices": [{"message": {"role": "assistant", "content": "hello"}}],
        });
        let content =
            extract_provider_content("openai", response.to_string().as_bytes()).unwrap();
        assert_eq!(content, "hello");
    }

    #[test]
    fn extracts_anthropic_content() {
        let response = json!({
            "content": [{"type": "text", "text": "hi there"}],
        });
        let content =
            extract_provider_content("anthropic", response.to_string().as_bytes()).unwrap();
        assert_eq!(content, "hi there");
    }

    #[test]
    fn extracts_gemini_content() {
        let response = json!({
            "candidates": [{"content": {"parts": [{"text": "bonjour"}]}}],
        });
        let content =
            extract_provider_content("gemini", response.to_string().as_bytes()).unwrap();
        assert_eq!(content, "bonjour");
    }

    #[test]
    fn unexpected_shape_is_an_upstream_error() {
        let err = extract_provider_content("openai", br#"{"choices": []}"#).unwrap_err();
        assert_eq!(err.kind, HandlerErrorKind::Upstream);
    }
}
