//! Integration handlers: the closed set of delivery channel kinds.

use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    transport::smtp::authentication::Credentials, AsyncSmtpTransport, AsyncTransport, Message,
    Tokio1Executor,
};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::DeliveryError;

/// The closed set of delivery channel kinds. Adding a kind is a
/// compile-checked change: every `match` over this enum must handle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryKind {
    Slack,
    Email,
    Webhook,
    Test,
}

impl DeliveryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Slack => "slack",
            Self::Email => "email",
            Self::Webhook => "webhook",
            Self::Test => "test",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "slack" => Some(Self::Slack),
            "email" => Some(Self::Email),
            "webhook" => Some(Self::Webhook),
            "test" => Some(Self::Test),
            _ => None,
        }
    }
}

/// Terminal outcome of one delivery attempt. The engine derives the stored
/// delivery status from `success`, `retry_after`, and the attempt count.
#[derive(Debug, Clone)]
pub struct DeliveryOutcome {
    pub success: bool,
    pub message: String,
    /// Channel-reported metadata (message ts, SMTP id, ...).
    pub metadata: Option<Value>,
    /// Hint that a retry after this delay may succeed.
    pub retry_after: Option<Duration>,
}

impl DeliveryOutcome {
    pub fn delivered(message: &str, metadata: Option<Value>) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            metadata,
            retry_after: None,
        }
    }

    pub fn failed(message: &str, retry_after: Option<Duration>) -> Self {
        Self {
            success: false,
            message: message.to_string(),
            metadata: None,
            retry_after,
        }
    }
}

/// One delivery channel implementation.
#[async_trait]
pub trait IntegrationHandler: Send + Sync {
    /// Deliver rendered content using the user's stored config for this
    /// channel. Errors become failed outcomes in the engine; handlers
    /// report transient conditions via `retry_after`.
    async fn deliver(
        &self,
        config: &Value,
        subject: Option<&str>,
        content: &str,
    ) -> Result<DeliveryOutcome, DeliveryError>;

    async fn health_check(&self) -> bool;
}

fn config_str<'a>(config: &'a Value, key: &str) -> Result<&'a str, DeliveryError> {
    config
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| DeliveryError::Config(format!("missing {key}")))
}

/// Posts messages to a Slack channel via `chat.postMessage`.
pub struct SlackHandler {
    http: Client,
    api_base: String,
    bot_token: String,
}

impl SlackHandler {
    pub fn new(bot_token: String) -> Self {
        Self::with_api_base(bot_token, "https://slack.com/api".to_string())
    }

    pub fn with_api_base(bot_token: String, api_base: String) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            http,
            api_base,
            bot_token,
        }
    }
}

#[async_trait]
impl IntegrationHandler for SlackHandler {
    async fn deliver(
        &self,
        config: &Value,
        _subject: Option<&str>,
        content: &str,
    ) -> Result<DeliveryOutcome, DeliveryError> {
        let channel = config_str(config, "channel_id")?;
        let mut body = json!({ "channel": channel, "text": content });
        if let Some(thread_ts) = config.get("thread_ts").and_then(Value::as_str) {
            body["thread_ts"] = Value::String(thread_ts.to_string());
        }

        let resp = self
            .http
            .post(format!("{}/chat.postMessage", self.api_base))
            .bearer_auth(&self.bot_token)
            .json(&body)
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs);
            return Ok(DeliveryOutcome::failed("slack rate limited", retry_after));
        }

        let payload: Value = resp.json().await?;
        if payload.get("ok").and_then(Value::as_bool).unwrap_or(false) {
            debug!(channel = %channel, "Slack message posted");
            Ok(DeliveryOutcome::delivered(
                "posted",
                payload.get("ts").map(|ts| json!({ "ts": ts })),
            ))
        } else {
            let err = payload
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            Ok(DeliveryOutcome::failed(&format!("slack: {err}"), None))
        }
    }

    async fn health_check(&self) -> bool {
        self.http
            .post(format!("{}/auth.test", self.api_base))
            .bearer_auth(&self.bot_token)
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }
}

/// Sends email over SMTP.
pub struct EmailHandler {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl EmailHandler {
    pub fn new(
        smtp_host: &str,
        smtp_port: u16,
        username: String,
        password: String,
        from_address: String,
    ) -> Result<Self, DeliveryError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(smtp_host)
            .map_err(|e| DeliveryError::Smtp(e.to_string()))?
            .port(smtp_port)
            .credentials(Credentials::new(username, password))
            .build();

        Ok(Self {
            transport,
            from_address,
        })
    }
}

#[async_trait]
impl IntegrationHandler for EmailHandler {
    async fn deliver(
        &self,
        config: &Value,
        subject: Option<&str>,
        content: &str,
    ) -> Result<DeliveryOutcome, DeliveryError> {
        let to = config_str(config, "email_address")?;

        let message = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|e| DeliveryError::InvalidAddress(format!("From: {e}")))?,
            )
            .to(to
                .parse()
                .map_err(|e| DeliveryError::InvalidAddress(format!("To '{to}': {e}")))?)
            .subject(subject.unwrap_or("Update on your request"))
            .body(content.to_string())
            .map_err(|e| DeliveryError::BuildMessage(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| DeliveryError::Smtp(e.to_string()))?;

        info!(to = %to, "Email sent");
        Ok(DeliveryOutcome::delivered("sent", None))
    }

    async fn health_check(&self) -> bool {
        self.transport.test_connection().await.unwrap_or(false)
    }
}

/// Posts the response as JSON to a user-configured URL.
pub struct WebhookHandler {
    http: Client,
}

impl WebhookHandler {
    pub fn new() -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { http }
    }
}

impl Default for WebhookHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IntegrationHandler for WebhookHandler {
    async fn deliver(
        &self,
        config: &Value,
        subject: Option<&str>,
        content: &str,
    ) -> Result<DeliveryOutcome, DeliveryError> {
        let url = config_str(config, "url")?;

        let resp = self
            .http
            .post(url)
            .json(&json!({ "subject": subject, "content": content }))
            .send()
            .await?;

        if resp.status().is_success() {
            Ok(DeliveryOutcome::delivered(
                "posted",
                Some(json!({ "status": resp.status().as_u16() })),
            ))
        } else if resp.status().is_server_error() {
            Ok(DeliveryOutcome::failed(
                &format!("webhook returned {}", resp.status()),
                Some(Duration::from_secs(60)),
            ))
        } else {
            Ok(DeliveryOutcome::failed(
                &format!("webhook returned {}", resp.status()),
                None,
            ))
        }
    }

    async fn health_check(&self) -> bool {
        // Stateless; nothing to probe without a user URL.
        true
    }
}

/// In-memory handler for tests and staging smoke checks.
#[derive(Default)]
pub struct TestHandler {
    pub sent: std::sync::Mutex<Vec<(Option<String>, String)>>,
    /// When set, every delivery fails with this message.
    pub fail_with: Option<String>,
}

impl TestHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(message: &str) -> Self {
        Self {
            sent: std::sync::Mutex::new(Vec::new()),
            fail_with: Some(message.to_string()),
        }
    }
}

#[async_trait]
impl IntegrationHandler for TestHandler {
    async fn deliver(
        &self,
        _config: &Value,
        subject: Option<&str>,
        content: &str,
    ) -> Result<DeliveryOutcome, DeliveryError> {
        if let Some(message) = &self.fail_with {
            return Ok(DeliveryOutcome::failed(message, None));
        }
        self.sent
            .lock()
            .unwrap()
            .push((subject.map(str::to_string), content.to_string()));
        Ok(DeliveryOutcome::delivered("recorded", None))
    }

    async fn health_check(&self) -> bool {
        true
    }
}
