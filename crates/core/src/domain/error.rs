// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid job status transition: {from} -> {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("Job not found: {0}")]
    JobNotFound(i64),
}

pub type Result<T> = std::result::Result<T, DomainError>;
