// Port Layer - Interfaces for external dependencies

pub mod handler;
pub mod job_store;
pub mod notifier;
pub mod time_provider;

// Re-exports
pub use handler::{
    HandlerError, HandlerErrorKind, HandlerOutput, HandlerRegistry, HandlerResult, JobHandler,
};
pub use job_store::{AttemptOutcome, JobStore};
pub use notifier::TerminalNotifier;
pub use time_provider::TimeProvider;
