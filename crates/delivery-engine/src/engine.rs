//! The dispatch engine.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use serde_json::Value;
use tracing::{info, warn};

use database::{
    delivery_log, integration_config, Database, DeliveryStatus, NewDeliveryLog,
    UserIntegrationConfig,
};
use events::AgentResponse;

use crate::error::DeliveryError;
use crate::handler::{DeliveryKind, DeliveryOutcome, IntegrationHandler};
use crate::retry::RetryScheduler;
use crate::template::TemplateEngine;

/// How long a failed delivery stays retryable.
const RETRY_HORIZON_HOURS: i64 = 24;

/// Default per-kind template when the user config carries none.
const DEFAULT_TEMPLATE: &str = "{{content}}";

/// What the engine delivers: a rendered-down view of a finished response
/// (or a short acknowledgment notice).
#[derive(Debug, Clone)]
pub struct DeliveryRequest {
    pub request_id: String,
    pub session_id: String,
    pub user_id: String,
    pub subject: Option<String>,
    pub content: String,
}

impl DeliveryRequest {
    pub fn from_response(response: &AgentResponse) -> Self {
        Self {
            request_id: response.request_id.clone(),
            session_id: response.session_id.clone(),
            user_id: response.user_id.clone(),
            subject: None,
            content: response.content.clone(),
        }
    }

    /// Short "we got it" notice sent when a request is first accepted.
    pub fn acknowledgment(request_id: &str, session_id: &str, user_id: &str) -> Self {
        Self {
            request_id: request_id.to_string(),
            session_id: session_id.to_string(),
            user_id: user_id.to_string(),
            subject: Some("Request received".to_string()),
            content: "Your request has been received and is being processed.".to_string(),
        }
    }
}

/// Result of dispatching to one integration.
#[derive(Debug, Clone)]
pub struct DeliveryResult {
    pub integration_type: String,
    pub delivery_log_id: i64,
    pub status: DeliveryStatus,
    pub attempts: i64,
    pub error: Option<String>,
}

/// The full handler set, one per [`DeliveryKind`]. Selection is an
/// exhaustive match, so a new kind cannot be forgotten here.
pub struct Handlers {
    pub slack: Box<dyn IntegrationHandler>,
    pub email: Box<dyn IntegrationHandler>,
    pub webhook: Box<dyn IntegrationHandler>,
    pub test: Box<dyn IntegrationHandler>,
}

impl Handlers {
    pub fn get(&self, kind: DeliveryKind) -> &dyn IntegrationHandler {
        match kind {
            DeliveryKind::Slack => self.slack.as_ref(),
            DeliveryKind::Email => self.email.as_ref(),
            DeliveryKind::Webhook => self.webhook.as_ref(),
            DeliveryKind::Test => self.test.as_ref(),
        }
    }

    /// Probe every handler; used by the health endpoint.
    pub async fn health_checks(&self) -> Vec<(DeliveryKind, bool)> {
        let mut checks = Vec::new();
        for kind in [
            DeliveryKind::Slack,
            DeliveryKind::Email,
            DeliveryKind::Webhook,
            DeliveryKind::Test,
        ] {
            checks.push((kind, self.get(kind).health_check().await));
        }
        checks
    }
}

/// Fans one delivery request out to every enabled integration of the user.
pub struct DeliveryEngine {
    db: Database,
    handlers: Handlers,
    templates: TemplateEngine,
    scheduler: Arc<dyn RetryScheduler>,
}

impl DeliveryEngine {
    pub fn new(db: Database, handlers: Handlers, scheduler: Arc<dyn RetryScheduler>) -> Self {
        Self {
            db,
            handlers,
            templates: TemplateEngine::new(),
            scheduler,
        }
    }

    pub fn handlers(&self) -> &Handlers {
        &self.handlers
    }

    /// Dispatch to every enabled integration, highest priority first.
    ///
    /// Integrations are fully isolated: a failure on one never blocks or
    /// alters the attempts of any other.
    pub async fn dispatch(
        &self,
        request: &DeliveryRequest,
    ) -> Result<Vec<DeliveryResult>, DeliveryError> {
        let configs =
            integration_config::list_enabled_for_user(self.db.pool(), &request.user_id).await?;

        if configs.is_empty() {
            info!(user_id = %request.user_id, "No enabled integrations, nothing to deliver");
            return Ok(Vec::new());
        }

        let mut results = Vec::with_capacity(configs.len());
        for config in &configs {
            match self.dispatch_single(request, config).await {
                Ok(result) => results.push(result),
                Err(e) => {
                    // Bookkeeping failed for this integration; isolate it.
                    warn!(
                        user_id = %request.user_id,
                        integration = %config.integration_type,
                        error = %e,
                        "Dispatch bookkeeping failed"
                    );
                    results.push(DeliveryResult {
                        integration_type: config.integration_type.clone(),
                        delivery_log_id: 0,
                        status: DeliveryStatus::Failed,
                        attempts: 0,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        Ok(results)
    }

    async fn dispatch_single(
        &self,
        request: &DeliveryRequest,
        config: &UserIntegrationConfig,
    ) -> Result<DeliveryResult, DeliveryError> {
        let channel_config: Value =
            serde_json::from_str(&config.config).unwrap_or(Value::Null);

        let (template, template_used) = match channel_config
            .get("template")
            .and_then(Value::as_str)
        {
            Some(custom) => (custom.to_string(), "custom"),
            None => (DEFAULT_TEMPLATE.to_string(), "default"),
        };
        let content = self.templates.render(&template, &self.template_vars(request));

        let expires_at = (Utc::now() + ChronoDuration::hours(RETRY_HORIZON_HOURS)).to_rfc3339();
        let max_attempts = config.retry_count.max(1);

        let log_id = delivery_log::create(
            self.db.pool(),
            &NewDeliveryLog {
                request_id: request.request_id.clone(),
                session_id: request.session_id.clone(),
                user_id: request.user_id.clone(),
                integration_config_id: config.id,
                integration_type: config.integration_type.clone(),
                subject: request.subject.clone(),
                content: content.clone(),
                template_used: Some(template_used.to_string()),
                max_attempts,
                expires_at,
            },
        )
        .await?;

        let Some(kind) = DeliveryKind::parse(&config.integration_type) else {
            let message = format!("unknown integration kind: {}", config.integration_type);
            warn!(user_id = %request.user_id, "{message}");
            delivery_log::record_attempt(
                self.db.pool(),
                log_id,
                DeliveryStatus::Failed,
                Some(&message),
                None,
            )
            .await?;
            return Ok(DeliveryResult {
                integration_type: config.integration_type.clone(),
                delivery_log_id: log_id,
                status: DeliveryStatus::Failed,
                attempts: 1,
                error: Some(message),
            });
        };
        let handler = self.handlers.get(kind);

        let mut attempts: i64 = 0;
        let mut last_outcome: Option<DeliveryOutcome> = None;

        while attempts < max_attempts {
            attempts += 1;
            let outcome = match handler
                .deliver(&channel_config, request.subject.as_deref(), &content)
                .await
            {
                Ok(outcome) => outcome,
                Err(e) => DeliveryOutcome::failed(&e.to_string(), None),
            };

            if outcome.success {
                delivery_log::record_attempt(
                    self.db.pool(),
                    log_id,
                    DeliveryStatus::Delivered,
                    None,
                    outcome.metadata.as_ref().map(|m| m.to_string()).as_deref(),
                )
                .await?;
                info!(
                    user_id = %request.user_id,
                    integration = %config.integration_type,
                    attempts,
                    "Delivered"
                );
                return Ok(DeliveryResult {
                    integration_type: config.integration_type.clone(),
                    delivery_log_id: log_id,
                    status: DeliveryStatus::Delivered,
                    attempts,
                    error: None,
                });
            }

            // A retry-after hint hands the re-attempt to the external
            // scheduler; the row stays pending inside its horizon.
            if let Some(delay) = outcome.retry_after {
                if attempts < max_attempts {
                    delivery_log::record_attempt(
                        self.db.pool(),
                        log_id,
                        DeliveryStatus::Pending,
                        Some(&outcome.message),
                        None,
                    )
                    .await?;
                    self.scheduler.schedule_retry(log_id, delay).await;
                    return Ok(DeliveryResult {
                        integration_type: config.integration_type.clone(),
                        delivery_log_id: log_id,
                        status: DeliveryStatus::Pending,
                        attempts,
                        error: Some(outcome.message),
                    });
                }
            }

            let status = if attempts < max_attempts {
                DeliveryStatus::Pending
            } else {
                DeliveryStatus::Failed
            };
            delivery_log::record_attempt(
                self.db.pool(),
                log_id,
                status,
                Some(&outcome.message),
                None,
            )
            .await?;
            last_outcome = Some(outcome);
        }

        let message = last_outcome.map(|o| o.message).unwrap_or_default();
        warn!(
            user_id = %request.user_id,
            integration = %config.integration_type,
            attempts,
            error = %message,
            "Delivery failed"
        );
        Ok(DeliveryResult {
            integration_type: config.integration_type.clone(),
            delivery_log_id: log_id,
            status: DeliveryStatus::Failed,
            attempts,
            error: Some(message),
        })
    }

    fn template_vars(&self, request: &DeliveryRequest) -> HashMap<String, String> {
        let mut vars = HashMap::new();
        vars.insert("content".to_string(), request.content.clone());
        vars.insert("request_id".to_string(), request.request_id.clone());
        vars.insert("user_id".to_string(), request.user_id.clone());
        if let Some(subject) = &request.subject {
            vars.insert("subject".to_string(), subject.clone());
        }
        vars
    }
}
