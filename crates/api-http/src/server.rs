// Router and handlers

use crate::error::ApiError;
use crate::types::SubmitJobRequest;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use goflow_core::domain::{Job, NewJob};
use goflow_core::error::Result;
use goflow_core::port::{JobStore, TimeProvider};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn JobStore>,
    pub time: Arc<dyn TimeProvider>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/jobs", post(submit_job).get(list_jobs))
        .route("/health", get(health))
        .with_state(state)
}

/// Bind and serve until the shutdown future resolves
pub async fn serve(
    addr: SocketAddr,
    state: ApiState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| goflow_core::AppError::Config(format!("failed to bind {addr}: {e}")))?;

    info!(addr = %addr, "HTTP API listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| goflow_core::AppError::Internal(format!("http server error: {e}")))
}

async fn submit_job(
    State(state): State<ApiState>,
    Json(req): Json<SubmitJobRequest>,
) -> std::result::Result<Json<Job>, ApiError> {
    if req.job_type.is_empty() {
        return Err(ApiError::BadRequest("job type cannot be empty".to_string()));
    }

    let run_at = req.run_at.unwrap_or_else(|| state.time.now());
    let job = state
        .store
        .insert(NewJob {
            job_type: req.job_type,
            payload: req.payload,
            run_at,
        })
        .await?;

    info!(job_id = job.id, job_type = %job.job_type, "Job submitted");
    Ok(Json(job))
}

async fn list_jobs(State(state): State<ApiState>) -> std::result::Result<Json<Vec<Job>>, ApiError> {
    let jobs = state.store.list_all().await?;
    Ok(Json(jobs))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}
