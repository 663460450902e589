// GoFlow Infrastructure - Postgres Adapter
// Implements: JobStore over sqlx with skip-locked claims

mod connection;
mod job_store;
mod migration;

pub use connection::create_pool;
pub use job_store::PgJobStore;
pub use migration::run_migrations;

// Note: sqlx::Error conversion is handled by wrapping in helper functions
// due to Rust's orphan rules (cannot implement From<sqlx::Error> for AppError here)
