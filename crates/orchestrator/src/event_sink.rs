//! Inbound envelope sink for the request-manager service.

use tracing::{debug, info, warn};

use database::{processed_event, Database, ProcessingResult};
use events::{event_types, AgentResponse, EventEnvelope};
use session_manager::{SessionManager, SessionUpdate};

use crate::error::{OrchestratorError, Result};
use crate::response::ResponseHandler;

/// What the sink did with an envelope.
#[derive(Debug, PartialEq, Eq)]
pub enum SinkOutcome {
    /// The envelope came from this service itself; dropped to break
    /// self-feedback loops on a shared channel.
    RejectedSelfSource,
    /// The ledger already has this event id; no side effects performed.
    AlreadyProcessed,
    /// Side effects ran (or were deliberately skipped for an unrecognized
    /// type) and the outcome was recorded.
    Processed(ProcessingResult),
}

/// Consumes envelopes for the request manager with at-most-once effects.
///
/// Every envelope goes through the same gauntlet, in order: self-source
/// circuit breaker, dedup ledger check, side effects, ledger write.
pub struct EventSink {
    db: Database,
    sessions: SessionManager,
    response_handler: ResponseHandler,
    /// This service's own envelope source identity.
    identity: String,
}

impl EventSink {
    pub fn new(
        db: Database,
        sessions: SessionManager,
        response_handler: ResponseHandler,
        identity: String,
    ) -> Self {
        Self {
            db,
            sessions,
            response_handler,
            identity,
        }
    }

    pub async fn handle_envelope(&self, envelope: &EventEnvelope) -> Result<SinkOutcome> {
        if envelope.id.trim().is_empty() || envelope.event_type.trim().is_empty() {
            return Err(OrchestratorError::Validation(
                "envelope id and type are required".to_string(),
            ));
        }

        if envelope.source == self.identity {
            debug!(event_id = %envelope.id, "Dropping own event");
            return Ok(SinkOutcome::RejectedSelfSource);
        }

        if processed_event::get(self.db.pool(), &envelope.id)
            .await?
            .is_some()
        {
            info!(event_id = %envelope.id, "Event already processed, skipping");
            return Ok(SinkOutcome::AlreadyProcessed);
        }

        let (result, error_message, request_id, session_id) =
            self.apply_effects(envelope).await;

        processed_event::record_if_new(
            self.db.pool(),
            &envelope.id,
            &envelope.event_type,
            &envelope.source,
            request_id.as_deref(),
            session_id.as_deref(),
            &self.identity,
            result,
            error_message.as_deref(),
        )
        .await?;

        Ok(SinkOutcome::Processed(result))
    }

    async fn apply_effects(
        &self,
        envelope: &EventEnvelope,
    ) -> (ProcessingResult, Option<String>, Option<String>, Option<String>) {
        match envelope.event_type.as_str() {
            event_types::AGENT_RESPONSE_READY => {
                let response: AgentResponse = match envelope.data_as() {
                    Ok(response) => response,
                    Err(e) => {
                        return (
                            ProcessingResult::Error,
                            Some(format!("malformed response payload: {e}")),
                            None,
                            None,
                        )
                    }
                };
                let request_id = Some(response.request_id.clone());
                let session_id = Some(response.session_id.clone());

                match self.response_handler.handle(response).await {
                    Ok(_) => (ProcessingResult::Success, None, request_id, session_id),
                    Err(e) => {
                        warn!(event_id = %envelope.id, error = %e, "Response handling failed");
                        (
                            ProcessingResult::Error,
                            Some(e.to_string()),
                            request_id,
                            session_id,
                        )
                    }
                }
            }
            event_types::DATABASE_UPDATE_REQUESTED => {
                self.apply_session_update(envelope).await
            }
            other => {
                debug!(event_id = %envelope.id, event_type = %other, "Unrecognized event type");
                (ProcessingResult::Ignored, None, None, None)
            }
        }
    }

    async fn apply_session_update(
        &self,
        envelope: &EventEnvelope,
    ) -> (ProcessingResult, Option<String>, Option<String>, Option<String>) {
        #[derive(serde::Deserialize)]
        struct UpdatePayload {
            session_id: String,
            #[serde(default)]
            current_agent_id: Option<String>,
            #[serde(default)]
            runtime_session_id: Option<Option<String>>,
        }

        let payload: UpdatePayload = match envelope.data_as() {
            Ok(payload) => payload,
            Err(e) => {
                return (
                    ProcessingResult::Error,
                    Some(format!("malformed update payload: {e}")),
                    None,
                    None,
                )
            }
        };
        let session_id = Some(payload.session_id.clone());

        let update = SessionUpdate {
            current_agent_id: payload.current_agent_id,
            runtime_session_id: payload.runtime_session_id,
            ..Default::default()
        };

        match self.sessions.update_session(&payload.session_id, update).await {
            Ok(_) => (ProcessingResult::Success, None, None, session_id),
            Err(e) => (
                ProcessingResult::Error,
                Some(e.to_string()),
                None,
                session_id,
            ),
        }
    }
}
