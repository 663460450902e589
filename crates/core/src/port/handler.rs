// Job Handler Port
// Abstraction over the type-specific job executors (HTTP, SMTP, cron, ...)

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Successful dispatch: a numeric outcome code plus optional raw response
/// bytes. Bytes that are not valid JSON are wrapped by the worker before
/// persistence, so handlers may return whatever the upstream produced.
#[derive(Debug, Clone)]
pub struct HandlerOutput {
    pub status_code: i32,
    pub body: Option<Vec<u8>>,
}

impl HandlerOutput {
    pub fn new(status_code: i32, body: Option<Vec<u8>>) -> Self {
        Self { status_code, body }
    }

    /// Outcome with a JSON body
    pub fn json(status_code: i32, body: &serde_json::Value) -> Self {
        Self {
            status_code,
            body: Some(body.to_string().into_bytes()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerErrorKind {
    /// No handler registered for the job's type tag
    UnknownType,
    /// Payload is missing or has malformed fields for the chosen handler
    Validation,
    /// The upstream system rejected or failed the operation
    Upstream,
    /// The handler itself blew up (panic, poisoned state)
    Internal,
}

/// Failed dispatch. Carries the upstream status code and response bytes
/// when available so failure diagnostics land in the job row.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    pub kind: HandlerErrorKind,
    pub message: String,
    pub status_code: Option<i32>,
    pub body: Option<Vec<u8>>,
}

impl HandlerError {
    pub fn unknown_type(job_type: &str) -> Self {
        Self {
            kind: HandlerErrorKind::UnknownType,
            message: format!("unknown job type: {job_type}"),
            status_code: None,
            body: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            kind: HandlerErrorKind::Validation,
            message: message.into(),
            status_code: None,
            body: None,
        }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self {
            kind: HandlerErrorKind::Upstream,
            message: message.into(),
            status_code: None,
            body: None,
        }
    }

    /// Upstream failure that still produced a response worth persisting
    pub fn upstream_with_response(
        message: impl Into<String>,
        status_code: i32,
        body: Option<Vec<u8>>,
    ) -> Self {
        Self {
            kind: HandlerErrorKind::Upstream,
            message: message.into(),
            status_code: Some(status_code),
            body,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: HandlerErrorKind::Internal,
            message: message.into(),
            status_code: None,
            body: None,
        }
    }
}

pub type HandlerResult = std::result::Result<HandlerOutput, HandlerError>;

/// A type-specific job executor.
///
/// Contract:
/// - enforce your own timeout, strictly below the processing timeout
/// - tolerate repeated invocations for the same logical job
///   (delivery is at-least-once)
/// - never mutate your own job row; inserting new rows is allowed
///   (continuation producers)
/// - a returned error means "attempt failed, subject to retry"; an
///   `Ok` with any status code is success as far as the core cares
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, payload: &serde_json::Value) -> HandlerResult;
}

/// Static mapping from job-type tag to handler. Built once at startup and
/// read-only afterwards.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, job_type: impl Into<String>, handler: Arc<dyn JobHandler>) {
        self.handlers.insert(job_type.into(), handler);
    }

    pub fn contains(&self, job_type: &str) -> bool {
        self.handlers.contains_key(job_type)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Route a payload to the handler registered for `job_type`
    pub async fn dispatch(&self, job_type: &str, payload: &serde_json::Value) -> HandlerResult {
        match self.handlers.get(job_type) {
            Some(handler) => handler.handle(payload).await,
            None => Err(HandlerError::unknown_type(job_type)),
        }
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Mock handler behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Always succeed with this status code and body
        Success(i32, Option<Vec<u8>>),
        /// Always fail with this error
        Fail(HandlerError),
        /// Panic with message (for panic isolation testing)
        Panic(String),
    }

    /// Mock job handler for testing
    pub struct MockHandler {
        behavior: MockBehavior,
        call_count: AtomicUsize,
    }

    impl MockHandler {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior,
                call_count: AtomicUsize::new(0),
            }
        }

        pub fn new_success() -> Self {
            Self::new(MockBehavior::Success(
                200,
                Some(br#"{"ok":true}"#.to_vec()),
            ))
        }

        pub fn new_success_with_body(status_code: i32, body: &[u8]) -> Self {
            Self::new(MockBehavior::Success(status_code, Some(body.to_vec())))
        }

        pub fn new_fail(error: HandlerError) -> Self {
            Self::new(MockBehavior::Fail(error))
        }

        pub fn new_panic(message: impl Into<String>) -> Self {
            Self::new(MockBehavior::Panic(message.into()))
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl JobHandler for MockHandler {
        async fn handle(&self, _payload: &serde_json::Value) -> HandlerResult {
            self.call_count.fetch_add(1, Ordering::SeqCst);

            match &self.behavior {
                MockBehavior::Success(status_code, body) => {
                    Ok(HandlerOutput::new(*status_code, body.clone()))
                }
                MockBehavior::Fail(err) => Err(err.clone()),
                MockBehavior::Panic(msg) => panic!("{}", msg),
            }
        }
    }
}
