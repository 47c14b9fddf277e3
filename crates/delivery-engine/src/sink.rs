//! Inbound envelope sink for the delivery engine service.
//!
//! Same gauntlet as the request manager's sink: self-source circuit breaker,
//! dedup ledger check, side effects, ledger write. The side effects here are
//! deliveries, which makes the ledger the line between "notified once" and
//! "notified every time the broker redelivers".

use tracing::{debug, info, warn};

use database::{processed_event, Database, ProcessingResult};
use events::{event_types, AgentResponse, EventEnvelope, NormalizedRequest};

use crate::engine::{DeliveryEngine, DeliveryRequest};
use crate::error::DeliveryError;

/// What the sink did with an envelope.
#[derive(Debug, PartialEq, Eq)]
pub enum SinkOutcome {
    /// The envelope came from this service itself.
    RejectedSelfSource,
    /// The ledger already has this event id; nothing was delivered.
    AlreadyProcessed,
    /// Effects ran (or were deliberately skipped) and the outcome was
    /// recorded.
    Processed(ProcessingResult),
}

/// Consumes envelopes for the delivery engine with at-most-once effects.
pub struct DeliverySink {
    db: Database,
    engine: std::sync::Arc<DeliveryEngine>,
    /// This service's own envelope source identity.
    identity: String,
}

impl DeliverySink {
    pub fn new(db: Database, engine: std::sync::Arc<DeliveryEngine>, identity: String) -> Self {
        Self {
            db,
            engine,
            identity,
        }
    }

    pub async fn handle_envelope(
        &self,
        envelope: &EventEnvelope,
    ) -> Result<SinkOutcome, DeliveryError> {
        if envelope.id.trim().is_empty() || envelope.event_type.trim().is_empty() {
            return Err(DeliveryError::Validation(
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
            // A finished response: fan it out to the user's integrations.
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

                let request = DeliveryRequest::from_response(&response);
                match self.engine.dispatch(&request).await {
                    Ok(_) => (
                        ProcessingResult::Success,
                        None,
                        Some(response.request_id),
                        Some(response.session_id),
                    ),
                    Err(e) => (
                        ProcessingResult::Error,
                        Some(e.to_string()),
                        Some(response.request_id),
                        Some(response.session_id),
                    ),
                }
            }
            // A newly accepted request: send the short acknowledgment notice.
            event_types::REQUEST_CREATED => {
                let request: NormalizedRequest = match envelope.data_as() {
                    Ok(request) => request,
                    Err(e) => {
                        return (
                            ProcessingResult::Error,
                            Some(format!("malformed request payload: {e}")),
                            None,
                            None,
                        )
                    }
                };

                let ack = DeliveryRequest::acknowledgment(
                    &request.request_id,
                    &request.session_id,
                    &request.user_id,
                );
                match self.engine.dispatch(&ack).await {
                    Ok(_) => (
                        ProcessingResult::Success,
                        None,
                        Some(request.request_id),
                        Some(request.session_id),
                    ),
                    Err(e) => (
                        ProcessingResult::Error,
                        Some(e.to_string()),
                        Some(request.request_id),
                        Some(request.session_id),
                    ),
                }
            }
            // Informational; recorded so redeliveries stay cheap, sends
            // nothing.
            event_types::REQUEST_PROCESSING => (ProcessingResult::Success, None, None, None),
            other => {
                warn!(event_type = %other, event_id = %envelope.id, "Ignoring unrecognized event type");
                (ProcessingResult::Ignored, None, None, None)
            }
        }
    }
}
