// GoFlow HTTP API - thin submission/listing facade over the job store

mod error;
mod server;
mod types;

pub use error::ApiError;
pub use server::{router, serve, ApiState};
pub use types::SubmitJobRequest;
