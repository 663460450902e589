// Daemon configuration (environment-sourced)

use goflow_core::application::worker::constants::{
    DEFAULT_BASE_DELAY_SECS, DEFAULT_MAX_RETRIES, DEFAULT_PROCESSING_TIMEOUT_SECS,
    DEFAULT_SWEEP_INTERVAL, DEFAULT_WORKER_COUNT,
};
use goflow_core::error::{AppError, Result};
use goflow_handlers::SmtpConfig;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
const DEFAULT_SMTP_PORT: u16 = 587;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub http_addr: SocketAddr,
    pub worker_count: usize,
    pub max_retries: i32,
    pub base_delay_secs: i64,
    pub processing_timeout: chrono::Duration,
    pub sweep_interval: Duration,
    pub smtp: SmtpConfig,
}

impl Config {
    /// Read the full configuration. Missing required variables
    /// (`DATABASE_URL`, `SMTP_USER`, `SMTP_PASS`) are a startup error.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            http_addr: parsed("GOFLOW_HTTP_ADDR", DEFAULT_HTTP_ADDR.parse().map_err(
                |e| AppError::Config(format!("bad default http addr: {e}")),
            )?)?,
            worker_count: parsed("GOFLOW_WORKER_COUNT", DEFAULT_WORKER_COUNT)?,
            max_retries: parsed("GOFLOW_MAX_RETRIES", DEFAULT_MAX_RETRIES)?,
            base_delay_secs: parsed("GOFLOW_BASE_DELAY_SECS", DEFAULT_BASE_DELAY_SECS)?,
            processing_timeout: chrono::Duration::seconds(parsed(
                "GOFLOW_PROCESSING_TIMEOUT_SECS",
                DEFAULT_PROCESSING_TIMEOUT_SECS,
            )?),
            sweep_interval: Duration::from_secs(parsed(
                "GOFLOW_SWEEP_INTERVAL_SECS",
                DEFAULT_SWEEP_INTERVAL.as_secs(),
            )?),
            smtp: SmtpConfig {
                host: var_or("SMTP_HOST", DEFAULT_SMTP_HOST),
                port: parsed("SMTP_PORT", DEFAULT_SMTP_PORT)?,
                user: required("SMTP_USER")?,
                pass: required("SMTP_PASS")?,
            },
        })
    }
}

fn required(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| AppError::Config(format!("{name} must be set")))
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parsed<T: FromStr>(name: &str, default: T) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| AppError::Config(format!("{name} has invalid value '{raw}'"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsed_falls_back_to_default() {
        let value: usize = parsed("GOFLOW_TEST_UNSET_VAR", 5).unwrap();
        assert_eq!(value, 5);
    }

    #[test]
    fn parsed_rejects_garbage() {
        std::env::set_var("GOFLOW_TEST_GARBAGE_VAR", "not-a-number");
        let result: Result<usize> = parsed("GOFLOW_TEST_GARBAGE_VAR", 5);
        assert!(result.is_err());
        std::env::remove_var("GOFLOW_TEST_GARBAGE_VAR");
    }

    #[test]
    fn missing_required_var_is_a_config_error() {
        let err = required("GOFLOW_TEST_MISSING_VAR").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
