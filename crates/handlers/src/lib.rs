// GoFlow Handlers - the type-specific job executors
// Each handler owns its payload schema and its own timeout.

mod ai_prompt;
mod callback;
mod cron_schedule;
mod data_extract;
mod db_query;
mod delay;
mod http_request;
mod notifier;
mod send_email;
pub mod signing;
mod webhook;

pub use ai_prompt::AiPromptHandler;
pub use callback::CallbackHandler;
pub use cron_schedule::CronScheduleHandler;
pub use data_extract::DataExtractHandler;
pub use db_query::DbQueryHandler;
pub use delay::DelayHandler;
pub use http_request::HttpRequestHandler;
pub use notifier::HttpCallbackNotifier;
pub use send_email::{SendEmailHandler, SmtpConfig};
pub use webhook::WebhookDeliveryHandler;

use goflow_core::error::{AppError, Result};
use goflow_core::port::{HandlerError, HandlerRegistry, JobStore, TimeProvider};
use serde::de::DeserializeOwned;
use sqlx::PgPool;
use std::sync::Arc;

/// The registry of every supported job type. This is the single routing
/// table: a tag missing here is an unknown type, full stop.
pub fn standard_registry(
    store: Arc<dyn JobStore>,
    pool: PgPool,
    time: Arc<dyn TimeProvider>,
    smtp: &SmtpConfig,
) -> Result<HandlerRegistry> {
    let client = reqwest::Client::builder()
        .build()
        .map_err(|e| AppError::Config(format!("failed to build http client: {e}")))?;

    let mut registry = HandlerRegistry::new();
    registry.register(
        "http_request",
        Arc::new(HttpRequestHandler::new(client.clone())),
    );
    registry.register("send_email", Arc::new(SendEmailHandler::new(smtp)?));
    registry.register(
        "webhook_delivery",
        Arc::new(WebhookDeliveryHandler::new(client.clone())),
    );
    registry.register("db_query", Arc::new(DbQueryHandler::new(pool)));
    registry.register(
        "data_extract",
        Arc::new(DataExtractHandler::new(client.clone())),
    );
    registry.register("ai_prompt", Arc::new(AiPromptHandler::new(client.clone())));
    registry.register(
        "delay",
        Arc::new(DelayHandler::new(Arc::clone(&store), Arc::clone(&time))),
    );
    registry.register(
        "cron_schedule",
        Arc::new(CronScheduleHandler::new(Arc::clone(&store), time)),
    );
    registry.register("callback", Arc::new(CallbackHandler::new(store, client)));

    Ok(registry)
}

/// Deserialize a payload into the handler's typed shape
pub(crate) fn parse_payload<T: DeserializeOwned>(
    job_type: &str,
    payload: &serde_json::Value,
) -> std::result::Result<T, HandlerError> {
    serde_json::from_value(payload.clone())
        .map_err(|e| HandlerError::validation(format!("invalid {job_type} payload: {e}")))
}

/// The `{type, payload}` shape shared by the continuation producers
#[derive(Debug, Clone, serde::Deserialize)]
pub(crate) struct NextJob {
    #[serde(rename = "type")]
    pub job_type: String,
    pub payload: serde_json::Value,
}
