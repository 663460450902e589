// Application Layer - Scheduler/worker loop and its policies

pub mod recovery;
pub mod retry;
pub mod supervisor;
pub mod worker;

pub use recovery::RecoverySweeper;
pub use retry::{RetryDecision, RetryPolicy};
pub use supervisor::{Supervisor, SupervisorConfig, SupervisorHandle};
pub use worker::{shutdown_channel, ShutdownSender, ShutdownToken, Worker};
