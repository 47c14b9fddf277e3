//! Configuration loaded from environment variables.

use std::env;
use std::net::SocketAddr;

/// Delivery engine configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address.
    pub addr: SocketAddr,
    /// SQLite database URL.
    pub database_url: String,
    /// Slack bot token; the Slack handler is stubbed when absent.
    pub slack_bot_token: Option<String>,
    /// SMTP settings; the email handler is stubbed when absent.
    pub smtp: Option<SmtpConfig>,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `DELIVERY_API_ADDR` | Server bind address | `127.0.0.1:8720` |
    /// | `SQLITE_PATH` | SQLite database URL | `sqlite:helpdesk.db?mode=rwc` |
    /// | `SLACK_BOT_TOKEN` | Slack bot token | unset |
    /// | `SMTP_HOST` | SMTP relay host | unset |
    /// | `SMTP_PORT` | SMTP relay port | `587` |
    /// | `SMTP_USERNAME` | SMTP username | unset |
    /// | `SMTP_PASSWORD` | SMTP password | unset |
    /// | `SMTP_FROM` | From address | unset |
    ///
    /// Slack requires `SLACK_BOT_TOKEN`; email requires `SMTP_HOST`,
    /// `SMTP_USERNAME`, `SMTP_PASSWORD`, and `SMTP_FROM`. Unconfigured
    /// channels fall back to an in-memory stub handler.
    pub fn from_env() -> Result<Self, ConfigError> {
        let addr = env::var("DELIVERY_API_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8720".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidAddr)?;

        let database_url = env::var("SQLITE_PATH")
            .unwrap_or_else(|_| "sqlite:helpdesk.db?mode=rwc".to_string());

        let slack_bot_token = env::var("SLACK_BOT_TOKEN").ok().filter(|t| !t.is_empty());

        let smtp = match (
            env::var("SMTP_HOST").ok(),
            env::var("SMTP_USERNAME").ok(),
            env::var("SMTP_PASSWORD").ok(),
            env::var("SMTP_FROM").ok(),
        ) {
            (Some(host), Some(username), Some(password), Some(from_address)) => {
                let port = match env::var("SMTP_PORT") {
                    Ok(value) => value.parse().map_err(|_| ConfigError::InvalidSmtpPort)?,
                    Err(_) => 587,
                };
                Some(SmtpConfig {
                    host,
                    port,
                    username,
                    password,
                    from_address,
                })
            }
            _ => None,
        };

        Ok(Self {
            addr,
            database_url,
            slack_bot_token,
            smtp,
        })
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid DELIVERY_API_ADDR format")]
    InvalidAddr,

    #[error("Invalid SMTP_PORT value")]
    InvalidSmtpPort,
}
