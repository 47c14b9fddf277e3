//! Configuration loaded from environment variables.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

/// Communication mode for the request pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommMode {
    /// Publish envelopes onto the broker; responses arrive via the sink.
    Event,
    /// Run agent turns inline and call the delivery engine directly.
    Direct,
}

/// Request manager configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address.
    pub addr: SocketAddr,
    /// SQLite database URL.
    pub database_url: String,
    /// Broker ingest endpoint.
    pub broker_url: String,
    /// Agent runtime base URL.
    pub agent_runtime_url: String,
    /// Agent directory base URL.
    pub agent_directory_url: String,
    /// Delivery engine base URL (direct mode).
    pub delivery_engine_url: String,
    /// Default ("router") agent id.
    pub default_agent: String,
    /// Communication mode.
    pub comm_mode: CommMode,
    /// Ingress rate limit minimum interval.
    pub rate_limit_interval: Duration,
    /// Per-turn agent runtime timeout.
    pub agent_turn_timeout: Duration,
    /// Default timeout for synchronous requests.
    pub sync_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `REQUEST_API_ADDR` | Server bind address | `127.0.0.1:8700` |
    /// | `SQLITE_PATH` | SQLite database URL | `sqlite:helpdesk.db?mode=rwc` |
    /// | `BROKER_URL` | Broker ingest endpoint | `http://127.0.0.1:8780/events` |
    /// | `AGENT_RUNTIME_URL` | Agent runtime base URL | `http://127.0.0.1:8710` |
    /// | `AGENT_DIRECTORY_URL` | Agent directory base URL | `http://127.0.0.1:8710` |
    /// | `DELIVERY_ENGINE_URL` | Delivery engine base URL | `http://127.0.0.1:8720` |
    /// | `DEFAULT_AGENT` | Default router agent id | `router` |
    /// | `COMM_MODE` | `event` or `direct` | `event` |
    /// | `RATE_LIMIT_MS` | Ingress min interval (ms) | `1000` |
    /// | `AGENT_TURN_TIMEOUT_SECS` | Agent turn timeout | `120` |
    /// | `SYNC_TIMEOUT_SECS` | Default sync wait | `30` |
    pub fn from_env() -> Result<Self, ConfigError> {
        let addr = env::var("REQUEST_API_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8700".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidAddr)?;

        let database_url = env::var("SQLITE_PATH")
            .unwrap_or_else(|_| "sqlite:helpdesk.db?mode=rwc".to_string());

        let broker_url = env::var("BROKER_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8780/events".to_string());

        let agent_runtime_url = env::var("AGENT_RUNTIME_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8710".to_string());

        let agent_directory_url =
            env::var("AGENT_DIRECTORY_URL").unwrap_or_else(|_| agent_runtime_url.clone());

        let delivery_engine_url = env::var("DELIVERY_ENGINE_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8720".to_string());

        let default_agent = env::var("DEFAULT_AGENT").unwrap_or_else(|_| "router".to_string());

        let comm_mode = match env::var("COMM_MODE").as_deref() {
            Ok("direct") => CommMode::Direct,
            Ok("event") | Err(_) => CommMode::Event,
            Ok(other) => return Err(ConfigError::InvalidCommMode(other.to_string())),
        };

        let rate_limit_interval = Duration::from_millis(parse_env("RATE_LIMIT_MS", 1000)?);
        let agent_turn_timeout =
            Duration::from_secs(parse_env("AGENT_TURN_TIMEOUT_SECS", 120)?);
        let sync_timeout = Duration::from_secs(parse_env("SYNC_TIMEOUT_SECS", 30)?);

        Ok(Self {
            addr,
            database_url,
            broker_url,
            agent_runtime_url,
            agent_directory_url,
            delivery_engine_url,
            default_agent,
            comm_mode,
            rate_limit_interval,
            agent_turn_timeout,
            sync_timeout,
        })
    }
}

fn parse_env(name: &str, default: u64) -> Result<u64, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidNumber(name.to_string())),
        Err(_) => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid REQUEST_API_ADDR format")]
    InvalidAddr,

    #[error("Invalid COMM_MODE: {0} (expected 'event' or 'direct')")]
    InvalidCommMode(String),

    #[error("Invalid numeric value for {0}")]
    InvalidNumber(String),
}
