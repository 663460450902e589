//! GoFlow Daemon - Main Entry Point
//! Worker pool + recovery sweeper + HTTP submission API over one Postgres store

mod config;

use anyhow::{anyhow, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use goflow_api_http::ApiState;
use goflow_core::application::{RetryPolicy, Supervisor, SupervisorConfig};
use goflow_core::port::time_provider::SystemTimeProvider;
use goflow_core::port::{JobStore, TerminalNotifier, TimeProvider};
use goflow_handlers::{standard_registry, HttpCallbackNotifier};
use goflow_infra_postgres::{create_pool, run_migrations, PgJobStore};

const HTTP_SHUTDOWN_DEADLINE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize logging (JSON format for production)
    let log_format = std::env::var("GOFLOW_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("goflow=info"))
        .expect("Failed to create env filter");

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }

    info!("GoFlow v{} starting...", goflow_core::VERSION);

    // 2. Load configuration (missing DATABASE_URL / SMTP creds are fatal)
    let config = Config::from_env().map_err(|e| anyhow!("configuration error: {e}"))?;

    // 3. Initialize database
    info!("Initializing database...");
    let pool = create_pool(&config.database_url)
        .await
        .map_err(|e| anyhow!("DB pool creation failed: {e}"))?;
    run_migrations(&pool)
        .await
        .map_err(|e| anyhow!("Migration failed: {e}"))?;

    // 4. Setup dependencies (DI wiring)
    let time: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let store: Arc<dyn JobStore> = Arc::new(PgJobStore::new(pool.clone(), Arc::clone(&time)));

    let registry = Arc::new(
        standard_registry(Arc::clone(&store), pool, Arc::clone(&time), &config.smtp)
            .map_err(|e| anyhow!("handler registry setup failed: {e}"))?,
    );

    let callback_client = reqwest::Client::builder()
        .build()
        .map_err(|e| anyhow!("callback client setup failed: {e}"))?;
    let notifier: Arc<dyn TerminalNotifier> = Arc::new(HttpCallbackNotifier::new(
        Arc::clone(&store),
        callback_client,
    ));

    let retry_policy = Arc::new(RetryPolicy::new(config.max_retries, config.base_delay_secs));

    // 5. Start supervisor (eager recovery sweep, sweeper, worker pool)
    let supervisor = Supervisor::new(
        SupervisorConfig {
            worker_count: config.worker_count,
            processing_timeout: config.processing_timeout,
            sweep_interval: config.sweep_interval,
        },
        Arc::clone(&store),
        registry,
        retry_policy,
        notifier,
        Arc::clone(&time),
    );
    let pool_handle = supervisor
        .start()
        .await
        .map_err(|e| anyhow!("supervisor start failed: {e}"))?;

    // 6. Start HTTP API
    let api_state = ApiState { store, time };
    let (http_shutdown_tx, http_shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let http_addr = config.http_addr;
    let server = tokio::spawn(async move {
        goflow_api_http::serve(http_addr, api_state, async {
            let _ = http_shutdown_rx.await;
        })
        .await
    });

    info!("System ready. Waiting for jobs...");

    // 7. Wait for shutdown signal
    shutdown_signal().await;
    info!("Shutdown signal received");

    // 8. Graceful shutdown: drain workers (no deadline; handler timeouts
    //    bound the wait) while the HTTP server stops under a 5s deadline
    let _ = http_shutdown_tx.send(());
    let stop_http = async {
        match tokio::time::timeout(HTTP_SHUTDOWN_DEADLINE, server).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => warn!(error = %e, "HTTP server exited with error"),
            Ok(Err(e)) => warn!(error = %e, "HTTP server task panicked"),
            Err(_) => warn!("HTTP server did not stop within deadline"),
        }
    };
    tokio::join!(pool_handle.shutdown_and_drain(), stop_http);

    info!("Graceful shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut terminate =
            signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
