// HTML extraction handler

use crate::parse_payload;
use async_trait::async_trait;
use goflow_core::port::{HandlerError, HandlerOutput, HandlerResult, JobHandler};
use reqwest::Client;
use scraper::{Html, Selector};
use serde::Deserialize;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ExtractMode {
    #[default]
    Text,
    Html,
    Attr,
}

#[derive(Debug, Deserialize)]
struct DataExtractPayload {
    url: String,
    selector: String,
    #[serde(default)]
    extract: ExtractMode,
    attr: Option<String>,
}

/// `data_extract`: fetch a page and pull text/html/attribute values out
/// of every element matching a CSS selector
pub struct DataExtractHandler {
    client: Client,
}

impl DataExtractHandler {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl JobHandler for DataExtractHandler {
    async fn handle(&self, payload: &serde_json::Value) -> HandlerResult {
        let params: DataExtractPayload = parse_payload("data_extract", payload)?;
        if params.selector.is_empty() {
            return Err(HandlerError::validation("missing 'selector'"));
        }
        let attr = match params.extract {
            ExtractMode::Attr => match params.attr.as_deref() {
                Some(a) if !a.is_empty() => Some(a.to_string()),
                _ => {
                    return Err(HandlerError::validation(
                        "missing 'attr' for attr extract type",
                    ))
                }
            },
            _ => None,
        };

        let response = self
            .client
            .get(&params.url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|e| HandlerError::upstream(format!("request failed: {e}")))?;

        let status = response.status().as_u16() as i32;
        if status >= 400 {
            return Err(HandlerError::upstream_with_response(
                format!("http status {status}"),
                status,
                None,
            ));
        }

        let html = response
            .text()
            .await
            .map_err(|e| HandlerError::upstream(format!("failed to read body: {e}")))?;

        // Html is not Send, so parsing stays inside a sync helper
        let results = extract_matches(&html, &params.selector, params.extract, attr.as_deref())?;

        Ok(HandlerOutput::json(
            200,
            &serde_json::json!({
                "url": params.url,
                "selector": params.selector,
                "count": results.len(),
                "results": results,
            }),
        ))
    }
}

fn extract_matches(
    html: &str,
    selector: &str,
    mode: ExtractMode,
    attr: Option<&str>,
) -> Result<Vec<String>, HandlerError> {
    let document = Html::parse_document(html);
    let selector = Selector::parse(selector)
        .map_err(|e| HandlerError::validation(format!("invalid selector: {e}")))?;

    let mut results = Vec::new();
    for element in document.select(&selector) {
        match mode {
            ExtractMode::Text => results.push(element.text().collect::<String>()),
            ExtractMode::Html => results.push(element.inner_html()),
            ExtractMode::Attr => {
                if let Some(value) = attr.and_then(|name| element.value().attr(name)) {
                    results.push(value.to_string());
                }
            }
        }
    }
    Ok(results)
}
