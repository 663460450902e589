// Worker constants (no magic values in the loop bodies)

use std::time::Duration;

/// Sleep between claim attempts when no job is ready (200ms)
pub const IDLE_POLL: Duration = Duration::from_millis(200);

/// Sleep after a store error before the loop continues (500ms)
pub const ERROR_BACKOFF: Duration = Duration::from_millis(500);

/// Default size of the worker agent pool
pub const DEFAULT_WORKER_COUNT: usize = 5;

/// Default attempt budget per job
pub const DEFAULT_MAX_RETRIES: i32 = 3;

/// Default backoff base: first retry lands 5s after the failure
pub const DEFAULT_BASE_DELAY_SECS: i64 = 5;

/// Default in-flight lease length. Must exceed the longest handler
/// timeout or a still-running job could be double-dispatched.
pub const DEFAULT_PROCESSING_TIMEOUT_SECS: i64 = 30;

/// Default recovery sweeper period
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(15);
