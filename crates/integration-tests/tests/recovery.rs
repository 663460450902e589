// Stuck-job recovery: expired leases go back to the queue unharmed

use chrono::{Duration, TimeZone, Utc};
use goflow_core::application::{RecoverySweeper, RetryPolicy, Worker};
use goflow_core::domain::{JobStatus, NewJob};
use goflow_core::port::handler::mocks::MockHandler;
use goflow_core::port::job_store::mocks::InMemoryJobStore;
use goflow_core::port::notifier::mocks::RecordingNotifier;
use goflow_core::port::time_provider::mocks::ManualClock;
use goflow_core::port::{HandlerError, HandlerRegistry, JobStore, TimeProvider};
use std::sync::Arc;

const PROCESSING_TIMEOUT: Duration = Duration::seconds(30);

fn setup() -> (Arc<ManualClock>, Arc<InMemoryJobStore>, RecoverySweeper) {
    let clock = Arc::new(ManualClock::new(
        Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
    ));
    let store = Arc::new(InMemoryJobStore::new(clock.clone()));
    let sweeper = RecoverySweeper::new(
        store.clone(),
        PROCESSING_TIMEOUT,
        std::time::Duration::from_secs(15),
    );
    (clock, store, sweeper)
}

fn worker(store: Arc<InMemoryJobStore>, clock: Arc<ManualClock>) -> Worker {
    let mut registry = HandlerRegistry::new();
    registry.register("http_request", Arc::new(MockHandler::new_success()));
    Worker::new(
        1,
        store,
        Arc::new(registry),
        Arc::new(RetryPolicy::default()),
        Arc::new(RecordingNotifier::new()),
        clock,
    )
}

#[tokio::test]
async fn crashed_worker_job_is_released_and_reprocessed() {
    let (clock, store, sweeper) = setup();

    let job = store
        .insert(NewJob {
            job_type: "http_request".to_string(),
            payload: serde_json::json!({"url": "http://x"}),
            run_at: clock.now(),
        })
        .await
        .unwrap();

    // Simulate a worker that claimed the row and died mid-dispatch
    assert_eq!(store.claim_next(3).await.unwrap(), Some(job.id));

    // Lease still live: sweeping is a no-op
    assert_eq!(sweeper.sweep_once().await.unwrap(), 0);
    assert_eq!(
        store.find_by_id(job.id).await.unwrap().unwrap().status,
        JobStatus::Processing
    );

    // Past the timeout the row comes back, attempt budget untouched
    clock.advance(PROCESSING_TIMEOUT + Duration::seconds(1));
    assert_eq!(sweeper.sweep_once().await.unwrap(), 1);

    let released = store.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(released.status, JobStatus::Pending);
    assert_eq!(released.retry_count, 0);

    // A healthy agent now claims and finishes it; the crash cost nothing
    let worker = worker(store.clone(), clock.clone());
    assert!(worker.process_next_job().await.unwrap());

    let done = store.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.retry_count, 0);
}

#[tokio::test]
async fn recovery_preserves_retry_count_of_partially_retried_jobs() {
    let (clock, store, sweeper) = setup();

    let mut registry = HandlerRegistry::new();
    registry.register(
        "http_request",
        Arc::new(MockHandler::new_fail(HandlerError::upstream("boom"))),
    );
    let failing_worker = Worker::new(
        1,
        store.clone(),
        Arc::new(registry),
        Arc::new(RetryPolicy::default()),
        Arc::new(RecordingNotifier::new()),
        clock.clone(),
    );

    let job = store
        .insert(NewJob {
            job_type: "http_request".to_string(),
            payload: serde_json::json!({}),
            run_at: clock.now(),
        })
        .await
        .unwrap();

    // One real failure consumes one attempt
    failing_worker.process_next_job().await.unwrap();
    assert_eq!(
        store.find_by_id(job.id).await.unwrap().unwrap().retry_count,
        1
    );

    // The retried row gets claimed and the worker crashes this time
    clock.advance(Duration::seconds(5));
    assert_eq!(store.claim_next(3).await.unwrap(), Some(job.id));
    clock.advance(PROCESSING_TIMEOUT + Duration::seconds(1));
    assert_eq!(sweeper.sweep_once().await.unwrap(), 1);

    let released = store.find_by_id(job.id).await.unwrap().unwrap();
    assert_eq!(released.status, JobStatus::Pending);
    assert_eq!(released.retry_count, 1);
}

#[tokio::test]
async fn sweeper_loop_honors_shutdown() {
    let (_clock, store, _sweeper) = setup();
    let sweeper = Arc::new(RecoverySweeper::new(
        store,
        PROCESSING_TIMEOUT,
        std::time::Duration::from_millis(50),
    ));

    let (shutdown_tx, shutdown_rx) = goflow_core::application::shutdown_channel();
    let handle = {
        let sweeper = Arc::clone(&sweeper);
        tokio::spawn(async move { sweeper.run(shutdown_rx).await })
    };

    tokio::time::sleep(std::time::Duration::from_millis(120)).await;
    shutdown_tx.shutdown();

    tokio::time::timeout(std::time::Duration::from_secs(2), handle)
        .await
        .expect("sweeper should stop promptly")
        .unwrap();
}
