// Crash recovery: releases expired in-flight leases back to the queue

use crate::application::worker::ShutdownToken;
use crate::error::Result;
use crate::port::JobStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Recovery sweeper.
///
/// A `processing` row is leased: its `updated_at` stamp must stay within
/// `processing_timeout` of now. Rows whose lease expired belong to a
/// crashed or wedged worker and are flipped back to `pending` so another
/// agent can pick them up. The crash does not consume one of the job's
/// attempts.
pub struct RecoverySweeper {
    store: Arc<dyn JobStore>,
    processing_timeout: chrono::Duration,
    sweep_interval: Duration,
}

impl RecoverySweeper {
    pub fn new(
        store: Arc<dyn JobStore>,
        processing_timeout: chrono::Duration,
        sweep_interval: Duration,
    ) -> Self {
        Self {
            store,
            processing_timeout,
            sweep_interval,
        }
    }

    /// One sweep pass; also called eagerly at startup so rows stranded by
    /// a previous crashed instance are claimable before any worker starts
    pub async fn sweep_once(&self) -> Result<u64> {
        let released = self.store.release_expired(self.processing_timeout).await?;
        if released > 0 {
            info!(recovered = released, "Recovered stuck jobs");
        }
        Ok(released)
    }

    /// Periodic sweep loop with graceful shutdown support
    pub async fn run(&self, mut shutdown: ShutdownToken) {
        info!(
            interval_secs = self.sweep_interval.as_secs(),
            timeout_secs = self.processing_timeout.num_seconds(),
            "Recovery sweeper started"
        );

        let mut tick = tokio::time::interval(self.sweep_interval);
        // The immediate first tick duplicates the supervisor's eager sweep
        tick.tick().await;

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        error!(error = %e, "Recovery sweep failed");
                    }
                }
                _ = shutdown.wait() => {
                    info!("Recovery sweeper shutting down");
                    break;
                }
            }
        }
    }
}
