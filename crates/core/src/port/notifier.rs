// Terminal Notifier Port
// Fired once per terminal transition (completed or failed)

use crate::domain::JobId;
use crate::error::Result;
use async_trait::async_trait;

/// Outbound notification hook consulted by the worker after every terminal
/// transition. Implementations decide from the payload whether anything is
/// configured (a missing `callback_url` is a no-op) and must never touch
/// the job row: delivery failures are the caller's to log and forget.
#[async_trait]
pub trait TerminalNotifier: Send + Sync {
    async fn notify(&self, job_id: JobId, payload: &serde_json::Value) -> Result<()>;
}

/// Notifier that does nothing (for deployments without callbacks)
pub struct NoopNotifier;

#[async_trait]
impl TerminalNotifier for NoopNotifier {
    async fn notify(&self, _job_id: JobId, _payload: &serde_json::Value) -> Result<()> {
        Ok(())
    }
}

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Records every notification for at-most-once assertions
    #[derive(Default)]
    pub struct RecordingNotifier {
        notified: Mutex<Vec<JobId>>,
    }

    impl RecordingNotifier {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn notified(&self) -> Vec<JobId> {
            self.notified.lock().unwrap().clone()
        }

        pub fn count_for(&self, job_id: JobId) -> usize {
            self.notified
                .lock()
                .unwrap()
                .iter()
                .filter(|id| **id == job_id)
                .count()
        }
    }

    #[async_trait]
    impl TerminalNotifier for RecordingNotifier {
        async fn notify(&self, job_id: JobId, _payload: &serde_json::Value) -> Result<()> {
            self.notified.lock().unwrap().push(job_id);
            Ok(())
        }
    }
}
