//! HTTP publisher for event envelopes.

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

use crate::envelope::EventEnvelope;

/// Publishes envelopes to the broker's ingest endpoint.
///
/// Publishing is best-effort from the caller's point of view: failures are
/// logged and reported as `false`, and the async pipeline decides whether to
/// retry at an outer level.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    http: Client,
    broker_url: String,
}

impl EventPublisher {
    pub fn new(broker_url: String) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self { http, broker_url }
    }

    /// Publish one envelope. Returns `true` on a 2xx response.
    pub async fn publish(&self, envelope: &EventEnvelope) -> bool {
        let result = self
            .http
            .post(&self.broker_url)
            .json(envelope)
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {
                debug!(
                    event_id = %envelope.id,
                    event_type = %envelope.event_type,
                    "Published event"
                );
                true
            }
            Ok(resp) => {
                warn!(
                    event_id = %envelope.id,
                    event_type = %envelope.event_type,
                    status = %resp.status(),
                    "Broker rejected event"
                );
                false
            }
            Err(e) => {
                warn!(
                    event_id = %envelope.id,
                    event_type = %envelope.event_type,
                    error = %e,
                    "Failed to publish event"
                );
                false
            }
        }
    }
}
