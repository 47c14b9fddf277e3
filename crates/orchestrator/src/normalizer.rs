//! Channel-specific request normalization.

use serde_json::Value;
use uuid::Uuid;

use events::{IngressChannel, NormalizedRequest, RequestType};

use crate::error::{OrchestratorError, Result};

/// A request as it arrives from one ingress channel, before normalization.
///
/// Channel route handlers fill this in from their own wire shapes; identity
/// is already resolved by the authentication collaborator upstream.
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    pub channel: IngressChannel,
    pub user_id: String,
    pub content: String,
    pub channel_id: Option<String>,
    pub thread_id: Option<String>,
    /// Explicit agent target (tool callers set this; chat channels do not).
    pub target_agent_id: Option<String>,
    pub request_type: RequestType,
    pub integration_context: Value,
    pub user_context: Value,
}

impl IncomingRequest {
    /// A plain user message on a channel, the common case.
    pub fn message(channel: IngressChannel, user_id: &str, content: &str) -> Self {
        Self {
            channel,
            user_id: user_id.to_string(),
            content: content.to_string(),
            channel_id: None,
            thread_id: None,
            target_agent_id: None,
            request_type: RequestType::Message,
            integration_context: Value::Null,
            user_context: Value::Null,
        }
    }
}

/// Turns channel-specific requests into the canonical shape.
#[derive(Debug, Clone, Default)]
pub struct RequestNormalizer;

impl RequestNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Normalize a validated incoming request against its session.
    ///
    /// `requires_routing` is set exactly when no explicit target was given:
    /// the session's current agent (or the default router agent) then decides
    /// what happens next.
    pub fn normalize(
        &self,
        incoming: &IncomingRequest,
        session_id: &str,
    ) -> Result<NormalizedRequest> {
        if incoming.content.trim().is_empty() {
            return Err(OrchestratorError::Validation(
                "request content is empty".to_string(),
            ));
        }
        if incoming.user_id.trim().is_empty() {
            return Err(OrchestratorError::Validation(
                "user_id is required".to_string(),
            ));
        }

        let mut integration_context = incoming.integration_context.clone();
        // Channel/thread identifiers always travel in the integration context
        // so delivery handlers can reply in place.
        if incoming.channel_id.is_some() || incoming.thread_id.is_some() {
            let mut ctx = integration_context
                .as_object_mut()
                .map(std::mem::take)
                .unwrap_or_default();
            if let Some(channel_id) = &incoming.channel_id {
                ctx.insert("channel_id".to_string(), Value::String(channel_id.clone()));
            }
            if let Some(thread_id) = &incoming.thread_id {
                ctx.insert("thread_id".to_string(), Value::String(thread_id.clone()));
            }
            integration_context = Value::Object(ctx);
        }

        Ok(NormalizedRequest {
            request_id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            user_id: incoming.user_id.clone(),
            integration_type: incoming.channel.as_str().to_string(),
            request_type: incoming.request_type,
            content: incoming.content.clone(),
            integration_context,
            user_context: incoming.user_context.clone(),
            target_agent_id: incoming.target_agent_id.clone(),
            requires_routing: incoming.target_agent_id.is_none(),
            created_at: database::now_rfc3339(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_plain_message() {
        let normalizer = RequestNormalizer::new();
        let incoming = IncomingRequest::message(IngressChannel::Cli, "alice", "I need a new laptop");

        let req = normalizer.normalize(&incoming, "sess-1").unwrap();
        assert_eq!(req.session_id, "sess-1");
        assert_eq!(req.integration_type, "cli");
        assert_eq!(req.request_type, RequestType::Message);
        assert!(req.requires_routing);
        assert!(req.target_agent_id.is_none());
        assert!(!req.request_id.is_empty());
    }

    #[test]
    fn test_explicit_target_disables_routing() {
        let normalizer = RequestNormalizer::new();
        let mut incoming = IncomingRequest::message(IngressChannel::Tool, "svc", "run report");
        incoming.target_agent_id = Some("reporting".to_string());

        let req = normalizer.normalize(&incoming, "sess-1").unwrap();
        assert!(!req.requires_routing);
        assert_eq!(req.target_agent_id.as_deref(), Some("reporting"));
    }

    #[test]
    fn test_channel_ids_land_in_integration_context() {
        let normalizer = RequestNormalizer::new();
        let mut incoming = IncomingRequest::message(IngressChannel::Slack, "alice", "hi");
        incoming.channel_id = Some("C42".to_string());
        incoming.thread_id = Some("169.42".to_string());

        let req = normalizer.normalize(&incoming, "sess-1").unwrap();
        assert_eq!(req.integration_context["channel_id"], "C42");
        assert_eq!(req.integration_context["thread_id"], "169.42");
    }

    #[test]
    fn test_empty_content_is_rejected() {
        let normalizer = RequestNormalizer::new();
        let incoming = IncomingRequest::message(IngressChannel::Web, "alice", "   ");

        let err = normalizer.normalize(&incoming, "sess-1").unwrap_err();
        assert!(matches!(err, OrchestratorError::Validation(_)));
    }
}
