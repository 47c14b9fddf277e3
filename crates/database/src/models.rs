//! Database models.
//!
//! Timestamps are stored as RFC 3339 `TEXT`; JSON columns are stored as
//! serialized `TEXT` and parsed at the call sites that need structure.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Lifecycle state of a conversational session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Active,
    Inactive,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
        }
    }
}

/// Terminal state of one delivery attempt chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryStatus {
    Pending,
    Delivered,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
        }
    }
}

/// Outcome vocabulary shared by the event sinks and the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessingResult {
    Success,
    /// Duplicate envelope short-circuited before its effects. Reported to
    /// callers only; the ledger keeps the first processing's row, so this
    /// value is never stored.
    Skipped,
    Ignored,
    Error,
}

impl ProcessingResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Skipped => "skipped",
            Self::Ignored => "ignored",
            Self::Error => "error",
        }
    }
}

/// A conversational session binding a user+channel to its active agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Session {
    /// Session UUID.
    pub session_id: String,
    /// Resolved user identity.
    pub user_id: String,
    /// Ingress channel type (e.g. "slack", "cli").
    pub integration_type: String,
    /// Channel identifier, if the ingress has one.
    pub channel_id: Option<String>,
    /// Thread identifier, if the ingress has one.
    pub thread_id: Option<String>,
    /// Currently assigned agent; None means the default/router agent.
    pub current_agent_id: Option<String>,
    /// `ACTIVE` or `INACTIVE`.
    pub status: String,
    /// Number of requests handled in this session.
    pub total_requests: i64,
    /// Agent-runtime conversation handle, if one has been established.
    pub runtime_session_id: Option<String>,
    /// Channel-specific metadata snapshot (JSON).
    pub integration_metadata: Option<String>,
    /// Creation timestamp.
    pub created_at: String,
    /// Last update timestamp.
    pub updated_at: String,
    /// Timestamp of the most recent request, if any.
    pub last_request_at: Option<String>,
}

/// Fields required to create a session.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub session_id: String,
    pub user_id: String,
    pub integration_type: String,
    pub channel_id: Option<String>,
    pub thread_id: Option<String>,
    pub integration_metadata: Option<String>,
}

/// Audit record for one request through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct RequestLog {
    /// Request UUID.
    pub request_id: String,
    /// Owning session.
    pub session_id: String,
    /// Request type (e.g. "MESSAGE", "ROUTED_REQUEST").
    pub request_type: String,
    /// Raw request content as received.
    pub request_content: String,
    /// Canonical request snapshot (JSON).
    pub normalized_request: String,
    /// Agent that produced (or is targeted to produce) the response.
    pub agent_id: Option<String>,
    /// Response text; None until the request completes.
    pub response_content: Option<String>,
    /// Response metadata (JSON).
    pub response_metadata: Option<String>,
    /// Agent processing time in milliseconds.
    pub processing_time_ms: Option<i64>,
    /// Completion timestamp.
    pub completed_at: Option<String>,
    /// Originating envelope id, for traceability.
    pub event_id: Option<String>,
    /// Originating envelope type.
    pub event_type: Option<String>,
    /// Creation timestamp.
    pub created_at: String,
}

/// Fields required to insert a request log row.
#[derive(Debug, Clone)]
pub struct NewRequestLog {
    pub request_id: String,
    pub session_id: String,
    pub request_type: String,
    pub request_content: String,
    pub normalized_request: String,
    pub agent_id: Option<String>,
}

/// Response fields applied when a request completes.
#[derive(Debug, Clone)]
pub struct ResponseUpdate {
    pub agent_id: Option<String>,
    pub content: String,
    pub metadata: Option<String>,
    pub processing_time_ms: Option<i64>,
    pub event_id: Option<String>,
    pub event_type: Option<String>,
}

/// Ledger row recording that an inbound envelope has been handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ProcessedEvent {
    /// Envelope id — the idempotency key.
    pub event_id: String,
    pub event_type: String,
    pub event_source: String,
    pub request_id: Option<String>,
    pub session_id: Option<String>,
    /// Identity of the service that handled the envelope.
    pub processed_by: String,
    /// `success`, `ignored`, or `error`. Duplicates never write a second
    /// row, so `skipped` stays out of the ledger.
    pub processing_result: String,
    pub error_message: Option<String>,
    pub created_at: String,
}

/// One dispatch of a finished response to one integration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct DeliveryLog {
    pub id: i64,
    pub request_id: String,
    pub session_id: String,
    pub user_id: String,
    pub integration_config_id: i64,
    pub integration_type: String,
    pub subject: Option<String>,
    pub content: String,
    pub template_used: Option<String>,
    /// `pending`, `delivered`, or `failed`.
    pub status: String,
    pub attempts: i64,
    pub max_attempts: i64,
    pub first_attempt_at: Option<String>,
    pub last_attempt_at: Option<String>,
    pub delivered_at: Option<String>,
    /// Horizon after which a failed delivery is no longer retryable.
    pub expires_at: String,
    pub error_message: Option<String>,
    /// Handler-reported metadata (JSON).
    pub integration_metadata: Option<String>,
    pub created_at: String,
}

/// Fields required to insert a delivery log row.
#[derive(Debug, Clone)]
pub struct NewDeliveryLog {
    pub request_id: String,
    pub session_id: String,
    pub user_id: String,
    pub integration_config_id: i64,
    pub integration_type: String,
    pub subject: Option<String>,
    pub content: String,
    pub template_used: Option<String>,
    pub max_attempts: i64,
    pub expires_at: String,
}

/// Per-user configuration for one delivery integration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct UserIntegrationConfig {
    pub id: i64,
    pub user_id: String,
    pub integration_type: String,
    pub enabled: bool,
    /// Opaque per-integration configuration (JSON).
    pub config: String,
    /// Dispatch order, descending.
    pub priority: i64,
    pub retry_count: i64,
    pub retry_delay_seconds: i64,
    pub created_at: String,
    pub updated_at: String,
}
