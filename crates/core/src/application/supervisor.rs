// Supervisor - starts the sweeper and the worker pool, owns shutdown

use crate::application::recovery::RecoverySweeper;
use crate::application::retry::RetryPolicy;
use crate::application::worker::constants::{
    DEFAULT_PROCESSING_TIMEOUT_SECS, DEFAULT_SWEEP_INTERVAL, DEFAULT_WORKER_COUNT,
};
use crate::application::worker::{shutdown_channel, ShutdownSender, Worker};
use crate::error::Result;
use crate::port::{HandlerRegistry, JobStore, TerminalNotifier, TimeProvider};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{error, info};

/// Pool-level tuning knobs
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub worker_count: usize,
    pub processing_timeout: chrono::Duration,
    pub sweep_interval: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            processing_timeout: chrono::Duration::seconds(DEFAULT_PROCESSING_TIMEOUT_SECS),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}

/// Starts the recovery sweeper and a fixed pool of worker agents, and
/// coordinates their cooperative shutdown.
pub struct Supervisor {
    config: SupervisorConfig,
    store: Arc<dyn JobStore>,
    registry: Arc<HandlerRegistry>,
    retry_policy: Arc<RetryPolicy>,
    notifier: Arc<dyn TerminalNotifier>,
    time: Arc<dyn TimeProvider>,
}

impl Supervisor {
    pub fn new(
        config: SupervisorConfig,
        store: Arc<dyn JobStore>,
        registry: Arc<HandlerRegistry>,
        retry_policy: Arc<RetryPolicy>,
        notifier: Arc<dyn TerminalNotifier>,
        time: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            config,
            store,
            registry,
            retry_policy,
            notifier,
            time,
        }
    }

    /// Run the eager recovery sweep, then spawn the sweeper and the pool
    pub async fn start(self) -> Result<SupervisorHandle> {
        let sweeper = Arc::new(RecoverySweeper::new(
            Arc::clone(&self.store),
            self.config.processing_timeout,
            self.config.sweep_interval,
        ));

        // Rows left `processing` by a previous crashed instance must be
        // claimable before the first worker runs
        let recovered = sweeper.sweep_once().await?;
        info!(recovered = recovered, "Startup recovery sweep complete");

        let (shutdown_tx, shutdown_rx) = shutdown_channel();
        let mut tasks = JoinSet::new();

        {
            let sweeper = Arc::clone(&sweeper);
            let token = shutdown_rx.clone();
            tasks.spawn(async move { sweeper.run(token).await });
        }

        for worker_id in 1..=self.config.worker_count {
            let worker = Worker::new(
                worker_id,
                Arc::clone(&self.store),
                Arc::clone(&self.registry),
                Arc::clone(&self.retry_policy),
                Arc::clone(&self.notifier),
                Arc::clone(&self.time),
            );
            let token = shutdown_rx.clone();
            tasks.spawn(async move {
                if let Err(e) = worker.run(token).await {
                    error!(worker_id = worker_id, error = %e, "Worker exited with error");
                }
            });
        }

        info!(
            worker_count = self.config.worker_count,
            "Supervisor started"
        );

        Ok(SupervisorHandle { shutdown_tx, tasks })
    }
}

/// Handle to a running pool
pub struct SupervisorHandle {
    shutdown_tx: ShutdownSender,
    tasks: JoinSet<()>,
}

impl SupervisorHandle {
    /// Signal shutdown and wait for every agent and the sweeper to drain.
    /// No deadline: in-flight dispatches are bounded by handler timeouts.
    pub async fn shutdown_and_drain(mut self) {
        info!("Shutting down worker pool");
        self.shutdown_tx.shutdown();
        while self.tasks.join_next().await.is_some() {}
        info!("Worker pool drained");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobStatus, NewJob};
    use crate::port::handler::mocks::MockHandler;
    use crate::port::job_store::mocks::InMemoryJobStore;
    use crate::port::notifier::NoopNotifier;
    use crate::port::time_provider::SystemTimeProvider;

    #[tokio::test]
    async fn pool_processes_seeded_jobs_and_drains() {
        let time: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
        let store = Arc::new(InMemoryJobStore::new(Arc::clone(&time)));

        let mut registry = HandlerRegistry::new();
        registry.register("noop", Arc::new(MockHandler::new_success()));

        for _ in 0..5 {
            store
                .insert(NewJob {
                    job_type: "noop".to_string(),
                    payload: serde_json::json!({}),
                    run_at: time.now(),
                })
                .await
                .unwrap();
        }

        let supervisor = Supervisor::new(
            SupervisorConfig {
                worker_count: 3,
                ..Default::default()
            },
            store.clone(),
            Arc::new(registry),
            Arc::new(RetryPolicy::default()),
            Arc::new(NoopNotifier),
            time,
        );
        let handle = supervisor.start().await.unwrap();

        // Workers drain the queue quickly; poll instead of guessing a sleep
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let done = store.count_by_status(JobStatus::Completed).await.unwrap();
            if done == 5 {
                break;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "jobs not processed in time"
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        tokio::time::timeout(Duration::from_secs(2), handle.shutdown_and_drain())
            .await
            .expect("pool should drain promptly");
    }
}
