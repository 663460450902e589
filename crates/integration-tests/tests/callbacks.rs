// Terminal callbacks: exactly one notification attempt per terminal transition

use chrono::{Duration, TimeZone, Utc};
use goflow_core::application::{RetryPolicy, Worker};
use goflow_core::domain::{JobStatus, NewJob};
use goflow_core::port::handler::mocks::MockHandler;
use goflow_core::port::job_store::mocks::InMemoryJobStore;
use goflow_core::port::notifier::mocks::RecordingNotifier;
use goflow_core::port::time_provider::mocks::ManualClock;
use goflow_core::port::{HandlerError, HandlerRegistry, JobStore, TimeProvider};
use std::sync::Arc;

struct Harness {
    clock: Arc<ManualClock>,
    store: Arc<InMemoryJobStore>,
    notifier: Arc<RecordingNotifier>,
    worker: Worker,
}

fn harness(registry: HandlerRegistry) -> Harness {
    let clock = Arc::new(ManualClock::new(
        Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
    ));
    let store = Arc::new(InMemoryJobStore::new(clock.clone()));
    let notifier = Arc::new(RecordingNotifier::new());
    let worker = Worker::new(
        1,
        store.clone(),
        Arc::new(registry),
        Arc::new(RetryPolicy::default()),
        notifier.clone(),
        clock.clone(),
    );
    Harness {
        clock,
        store,
        notifier,
        worker,
    }
}

fn callback_payload() -> serde_json::Value {
    serde_json::json!({
        "url": "http://x",
        "callback_url": "http://callbacks.local/hook",
        "callback_secret": "s3cr3t",
    })
}

#[tokio::test]
async fn completed_job_notifies_exactly_once() {
    let mut registry = HandlerRegistry::new();
    registry.register("http_request", Arc::new(MockHandler::new_success()));
    let h = harness(registry);

    let job = h
        .store
        .insert(NewJob {
            job_type: "http_request".to_string(),
            payload: callback_payload(),
            run_at: h.clock.now(),
        })
        .await
        .unwrap();

    h.worker.process_next_job().await.unwrap();

    assert_eq!(
        h.store.find_by_id(job.id).await.unwrap().unwrap().status,
        JobStatus::Completed
    );
    assert_eq!(h.notifier.count_for(job.id), 1);
}

#[tokio::test]
async fn retried_job_notifies_only_at_the_terminal_transition() {
    let mut registry = HandlerRegistry::new();
    registry.register(
        "http_request",
        Arc::new(MockHandler::new_fail(HandlerError::upstream(
            "http status 500",
        ))),
    );
    let h = harness(registry);

    let job = h
        .store
        .insert(NewJob {
            job_type: "http_request".to_string(),
            payload: callback_payload(),
            run_at: h.clock.now(),
        })
        .await
        .unwrap();

    // Two rescheduled attempts: no callback yet
    h.worker.process_next_job().await.unwrap();
    assert_eq!(h.notifier.count_for(job.id), 0);
    h.clock.advance(Duration::seconds(5));
    h.worker.process_next_job().await.unwrap();
    assert_eq!(h.notifier.count_for(job.id), 0);

    // Terminal failure fires the single callback
    h.clock.advance(Duration::seconds(10));
    h.worker.process_next_job().await.unwrap();
    assert_eq!(
        h.store.find_by_id(job.id).await.unwrap().unwrap().status,
        JobStatus::Failed
    );
    assert_eq!(h.notifier.count_for(job.id), 1);

    // Nothing more to process, nothing more to notify
    h.clock.advance(Duration::seconds(60));
    assert!(!h.worker.process_next_job().await.unwrap());
    assert_eq!(h.notifier.count_for(job.id), 1);
}

#[tokio::test]
async fn every_terminal_job_gets_its_own_notification() {
    let mut registry = HandlerRegistry::new();
    registry.register("http_request", Arc::new(MockHandler::new_success()));
    let h = harness(registry);

    let mut ids = Vec::new();
    for _ in 0..3 {
        let job = h
            .store
            .insert(NewJob {
                job_type: "http_request".to_string(),
                payload: callback_payload(),
                run_at: h.clock.now(),
            })
            .await
            .unwrap();
        ids.push(job.id);
    }

    while h.worker.process_next_job().await.unwrap() {}

    for id in ids {
        assert_eq!(h.notifier.count_for(id), 1);
    }
    assert_eq!(h.notifier.notified().len(), 3);
}
