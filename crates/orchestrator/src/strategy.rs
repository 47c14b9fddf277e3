//! Dual-mode communication strategies.
//!
//! One contract, two transports. The event-bus strategy decouples services
//! through the broker; the direct-call strategy wires them together over
//! plain HTTP for single-process or low-latency deployments. Both must leave
//! the request log and session in identical final states for the same input.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use database::{request_log, Database, RequestLog};
use events::{event_types, service_sources, AgentResponse, EventEnvelope, EventPublisher,
    NormalizedRequest};

/// Outcome of a blocking wait for a response.
#[derive(Debug)]
pub enum WaitOutcome {
    /// The request completed; the log row carries the response.
    Completed(RequestLog),
    /// The deadline passed with no response. Processing continues
    /// elsewhere; the response will still be persisted and delivered.
    TimedOut,
}

/// Transport seam between accepting a request and delivering its response.
#[async_trait]
pub trait CommunicationStrategy: Send + Sync {
    /// Hand the request to whatever executes it. Returns `false` on a
    /// transport failure (logged, caller decides about retry).
    async fn send_request(&self, request: &NormalizedRequest) -> bool;

    /// Block until the request completes or the timeout passes.
    async fn wait_for_response(&self, request_id: &str, timeout: Duration) -> WaitOutcome;

    /// Push a finished response toward the delivery engine.
    async fn deliver_response(&self, response: &AgentResponse) -> bool;
}

/// Strategy that publishes envelopes onto the broker and observes completion
/// through the request log.
pub struct EventBusStrategy {
    db: Database,
    publisher: EventPublisher,
    poll_interval: Duration,
}

impl EventBusStrategy {
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

    pub fn new(db: Database, publisher: EventPublisher) -> Self {
        Self {
            db,
            publisher,
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

#[async_trait]
impl CommunicationStrategy for EventBusStrategy {
    async fn send_request(&self, request: &NormalizedRequest) -> bool {
        let data = match serde_json::to_value(request) {
            Ok(data) => data,
            Err(e) => {
                error!(request_id = %request.request_id, error = %e, "Failed to encode request");
                return false;
            }
        };

        let envelope = EventEnvelope::new(
            event_types::REQUEST_CREATED,
            service_sources::REQUEST_MANAGER,
            Some(request.request_id.clone()),
            data,
        );
        self.publisher.publish(&envelope).await
    }

    async fn wait_for_response(&self, request_id: &str, timeout: Duration) -> WaitOutcome {
        let deadline = Instant::now() + timeout;

        loop {
            // Fresh read each iteration; completion is committed by another
            // process and must become visible here.
            match request_log::get(self.db.pool(), request_id).await {
                Ok(log) if log.response_content.is_some() => {
                    return WaitOutcome::Completed(log);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(request_id = %request_id, error = %e, "Poll read failed");
                }
            }

            let now = Instant::now();
            if now >= deadline {
                debug!(request_id = %request_id, "Wait for response timed out");
                return WaitOutcome::TimedOut;
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    async fn deliver_response(&self, response: &AgentResponse) -> bool {
        let data = match serde_json::to_value(response) {
            Ok(data) => data,
            Err(e) => {
                error!(request_id = %response.request_id, error = %e, "Failed to encode response");
                return false;
            }
        };

        let envelope = EventEnvelope::new(
            event_types::AGENT_RESPONSE_READY,
            service_sources::REQUEST_MANAGER,
            Some(response.request_id.clone()),
            data,
        );
        self.publisher.publish(&envelope).await
    }
}

/// Strategy for deployments where the agent turn happens inline and the
/// delivery engine is called directly over HTTP.
pub struct DirectStrategy {
    http: Client,
    delivery_url: String,
}

impl DirectStrategy {
    pub fn new(delivery_url: String) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self { http, delivery_url }
    }
}

#[async_trait]
impl CommunicationStrategy for DirectStrategy {
    async fn send_request(&self, request: &NormalizedRequest) -> bool {
        // The caller runs the agent turn inline; there is nothing to send.
        debug!(request_id = %request.request_id, "Direct mode, no transport send");
        true
    }

    async fn wait_for_response(&self, request_id: &str, _timeout: Duration) -> WaitOutcome {
        // In direct mode the response is produced synchronously by the same
        // caller; waiting for it over the transport is a bug in the caller.
        error!(
            request_id = %request_id,
            "wait_for_response called on the direct strategy, this is a logic error"
        );
        WaitOutcome::TimedOut
    }

    async fn deliver_response(&self, response: &AgentResponse) -> bool {
        let url = format!("{}/deliver", self.delivery_url);
        match self.http.post(&url).json(response).send().await {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                warn!(
                    request_id = %response.request_id,
                    status = %resp.status(),
                    "Delivery engine rejected response"
                );
                false
            }
            Err(e) => {
                warn!(request_id = %response.request_id, error = %e, "Delivery call failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use database::{NewRequestLog, NewSession, ResponseUpdate};

    async fn seeded_db() -> Database {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db.migrate().await.unwrap();
        database::session::create(
            db.pool(),
            &NewSession {
                session_id: "sess-1".to_string(),
                user_id: "alice".to_string(),
                integration_type: "cli".to_string(),
                channel_id: None,
                thread_id: None,
                integration_metadata: None,
            },
        )
        .await
        .unwrap();
        request_log::create(
            db.pool(),
            &NewRequestLog {
                request_id: "req-1".to_string(),
                session_id: "sess-1".to_string(),
                request_type: "MESSAGE".to_string(),
                request_content: "hello".to_string(),
                normalized_request: "{}".to_string(),
                agent_id: None,
            },
        )
        .await
        .unwrap();
        db
    }

    fn strategy(db: Database) -> EventBusStrategy {
        EventBusStrategy::new(db, EventPublisher::new("http://127.0.0.1:1/events".to_string()))
            .with_poll_interval(Duration::from_millis(20))
    }

    #[tokio::test]
    async fn test_wait_returns_response_once_committed() {
        let db = seeded_db().await;
        let strategy = strategy(db.clone());

        let writer = tokio::spawn({
            let db = db.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(60)).await;
                request_log::set_response_if_unset(
                    db.pool(),
                    "req-1",
                    &ResponseUpdate {
                        agent_id: Some("router".to_string()),
                        content: "hi there".to_string(),
                        metadata: None,
                        processing_time_ms: None,
                        event_id: None,
                        event_type: None,
                    },
                )
                .await
                .unwrap();
            }
        });

        let outcome = strategy
            .wait_for_response("req-1", Duration::from_secs(5))
            .await;
        writer.await.unwrap();

        match outcome {
            WaitOutcome::Completed(log) => {
                assert_eq!(log.response_content.as_deref(), Some("hi there"));
            }
            WaitOutcome::TimedOut => panic!("expected completion"),
        }
    }

    #[tokio::test]
    async fn test_wait_times_out_at_or_after_deadline() {
        let db = seeded_db().await;
        let strategy = strategy(db);

        let timeout = Duration::from_secs(2);
        let started = std::time::Instant::now();
        let outcome = strategy.wait_for_response("req-1", timeout).await;

        assert!(matches!(outcome, WaitOutcome::TimedOut));
        assert!(started.elapsed() >= timeout);
    }

    #[tokio::test]
    async fn test_direct_wait_is_a_logic_error_not_a_hang() {
        let strategy = DirectStrategy::new("http://127.0.0.1:1".to_string());
        let outcome = strategy
            .wait_for_response("req-1", Duration::from_secs(30))
            .await;
        assert!(matches!(outcome, WaitOutcome::TimedOut));
    }
}
