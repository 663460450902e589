// API request shapes

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// `POST /jobs` body. A missing `run_at` means "now"; the payload is
/// passed through opaquely (handlers own their schemas).
#[derive(Debug, Deserialize)]
pub struct SubmitJobRequest {
    #[serde(rename = "type")]
    pub job_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub run_at: Option<DateTime<Utc>>,
}
