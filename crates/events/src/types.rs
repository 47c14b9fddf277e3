//! Canonical request and response payloads.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Ingress channel a request arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngressChannel {
    Slack,
    Web,
    Cli,
    Tool,
    Generic,
}

impl IngressChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Slack => "slack",
            Self::Web => "web",
            Self::Cli => "cli",
            Self::Tool => "tool",
            Self::Generic => "generic",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "slack" => Some(Self::Slack),
            "web" => Some(Self::Web),
            "cli" => Some(Self::Cli),
            "tool" => Some(Self::Tool),
            "generic" => Some(Self::Generic),
            _ => None,
        }
    }
}

/// Kind of request flowing through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestType {
    /// A user-authored message.
    Message,
    /// A slash-command style invocation.
    Command,
    /// A request re-issued to an agent after a routing handoff.
    RoutedRequest,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "MESSAGE",
            Self::Command => "COMMAND",
            Self::RoutedRequest => "ROUTED_REQUEST",
        }
    }
}

/// Kind of response an agent produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    Message,
    Error,
}

/// The canonical request payload, identical regardless of ingress channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedRequest {
    pub request_id: String,
    pub session_id: String,
    pub user_id: String,
    /// Ingress channel name (e.g. "slack").
    pub integration_type: String,
    pub request_type: RequestType,
    pub content: String,
    /// Channel-specific context (channel id, thread ts, tool name, ...).
    #[serde(default)]
    pub integration_context: Value,
    /// Caller-supplied user context (display name, email, ...).
    #[serde(default)]
    pub user_context: Value,
    /// Explicit agent target; None means the session's current agent (or the
    /// default agent when the session has none).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_agent_id: Option<String>,
    /// True when no explicit target was given and the router must decide.
    pub requires_routing: bool,
    pub created_at: String,
}

/// The canonical response payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    pub request_id: String,
    pub session_id: String,
    pub user_id: String,
    pub agent_id: String,
    pub content: String,
    pub response_type: ResponseType,
    #[serde(default)]
    pub metadata: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<i64>,
    #[serde(default)]
    pub requires_followup: bool,
    #[serde(default)]
    pub followup_actions: Vec<String>,
    pub created_at: String,
}
