use crate::services::sync_scheduler::{DEFAULT_POLL_INTERVAL, FailurePolicy};
use std::env;
use std::time::Duration;

const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/api";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub failure_policy: FailurePolicy,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        // a missing .env is fine, the defaults cover local development
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let poll_interval_ms: u64 = match var("DASHBOARD_POLL_INTERVAL_MS") {
            Some(v) => v.trim().parse()?,
            None => DEFAULT_POLL_INTERVAL.as_millis() as u64,
        };
        if poll_interval_ms == 0 {
            anyhow::bail!("DASHBOARD_POLL_INTERVAL_MS must be greater than zero");
        }

        let request_timeout_secs: u64 = match var("DASHBOARD_REQUEST_TIMEOUT_SECS") {
            Some(v) => v.trim().parse()?,
            None => DEFAULT_REQUEST_TIMEOUT_SECS,
        };
        if request_timeout_secs == 0 {
            anyhow::bail!("DASHBOARD_REQUEST_TIMEOUT_SECS must be greater than zero");
        }

        let failure_policy = match var("DASHBOARD_FAILURE_POLICY") {
            Some(v) => v
                .parse::<FailurePolicy>()
                .map_err(|e| anyhow::anyhow!(e))?,
            None => FailurePolicy::default(),
        };

        Ok(Config {
            api_base_url: var("DASHBOARD_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            poll_interval: Duration::from_millis(poll_interval_ms),
            request_timeout: Duration::from_secs(request_timeout_secs),
            failure_policy,
        })
    }
}
