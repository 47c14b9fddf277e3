//! Unified handling of finished agent responses.

use std::sync::Arc;

use tracing::{info, warn};

use database::{request_log, Database, ResponseUpdate};
use events::AgentResponse;
use session_manager::{RuntimeSessionCache, SessionManager, SessionUpdate};

use crate::error::Result;
use crate::registry::AgentRegistry;
use crate::routing::RoutingDetector;
use crate::runtime::AgentRuntime;
use crate::strategy::CommunicationStrategy;

/// Message re-issued to a newly routed agent so the handoff is visible to
/// the end user as the new agent's own introduction.
pub const INTRODUCTION_REQUEST: &str =
    "please introduce yourself and tell me how you can help";

/// Applies routing, persists the response exactly once, and forwards it to
/// delivery. Shared by all processing modes so event and direct transport
/// end in identical state.
pub struct ResponseHandler {
    db: Database,
    sessions: SessionManager,
    runtime_cache: Arc<RuntimeSessionCache>,
    registry: Arc<AgentRegistry>,
    runtime: Arc<dyn AgentRuntime>,
    strategy: Arc<dyn CommunicationStrategy>,
}

impl ResponseHandler {
    pub fn new(
        db: Database,
        sessions: SessionManager,
        runtime_cache: Arc<RuntimeSessionCache>,
        registry: Arc<AgentRegistry>,
        runtime: Arc<dyn AgentRuntime>,
        strategy: Arc<dyn CommunicationStrategy>,
    ) -> Self {
        Self {
            db,
            sessions,
            runtime_cache,
            registry,
            runtime,
            strategy,
        }
    }

    /// Handle one finished agent response end to end.
    ///
    /// Returns the response as the user will see it (after any handoff).
    pub async fn handle(&self, response: AgentResponse) -> Result<AgentResponse> {
        let session = self.sessions.get_session(&response.session_id).await?;

        let target = RoutingDetector::detect(
            &response.content,
            &response.agent_id,
            session.current_agent_id.as_deref(),
            &self.registry,
        )
        .await;

        let final_response = match target {
            Some(target) => self.perform_handoff(response, &target).await?,
            None => response,
        };

        // Audit write failures are logged, never allowed to block delivery:
        // the user-facing artifact outranks the audit trail.
        let recorded = match request_log::set_response_if_unset(
            self.db.pool(),
            &final_response.request_id,
            &ResponseUpdate {
                agent_id: Some(final_response.agent_id.clone()),
                content: final_response.content.clone(),
                metadata: serde_json::to_string(&final_response.metadata).ok(),
                processing_time_ms: final_response.processing_time_ms,
                event_id: None,
                event_type: None,
            },
        )
        .await
        {
            Ok(recorded) => recorded,
            Err(e) => {
                warn!(
                    request_id = %final_response.request_id,
                    error = %e,
                    "Failed to record response, delivering anyway"
                );
                true
            }
        };

        if recorded {
            if !self.strategy.deliver_response(&final_response).await {
                warn!(
                    request_id = %final_response.request_id,
                    "Response delivery hand-off failed"
                );
            }
        } else {
            // A racing duplicate: the first committed response already owns
            // delivery for this request.
            info!(
                request_id = %final_response.request_id,
                "Response already recorded, skipping delivery"
            );
        }

        Ok(final_response)
    }

    /// Switch the session to the target agent and replace the reply with the
    /// target's introduction, so the raw directive never reaches the user.
    async fn perform_handoff(
        &self,
        response: AgentResponse,
        target: &str,
    ) -> Result<AgentResponse> {
        info!(
            session_id = %response.session_id,
            from = %response.agent_id,
            to = %target,
            "Agent handoff"
        );

        // New agent, new runtime conversation.
        self.sessions
            .update_session(
                &response.session_id,
                SessionUpdate {
                    current_agent_id: Some(target.to_string()),
                    runtime_session_id: Some(None),
                    ..Default::default()
                },
            )
            .await?;
        self.runtime_cache
            .invalidate_session(&response.session_id)
            .await;

        match self
            .runtime
            .run_turn(target, None, INTRODUCTION_REQUEST)
            .await
        {
            Ok(turn) => {
                if let Some(handle) = &turn.runtime_session_id {
                    self.sessions
                        .update_session(
                            &response.session_id,
                            SessionUpdate {
                                runtime_session_id: Some(Some(handle.clone())),
                                ..Default::default()
                            },
                        )
                        .await?;
                    self.runtime_cache
                        .put(&response.session_id, target, handle.clone())
                        .await;
                }

                Ok(AgentResponse {
                    agent_id: target.to_string(),
                    content: turn.content,
                    processing_time_ms: Some(
                        response.processing_time_ms.unwrap_or(0) + turn.processing_time_ms,
                    ),
                    ..response
                })
            }
            Err(e) => {
                // The handoff itself stuck; only the introduction failed.
                // Fall back to the original text rather than dropping the
                // user's reply on the floor.
                warn!(
                    session_id = %response.session_id,
                    target = %target,
                    error = %e,
                    "Introduction request failed after handoff"
                );
                Ok(AgentResponse {
                    agent_id: target.to_string(),
                    ..response
                })
            }
        }
    }
}
