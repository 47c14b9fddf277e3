//! The typed event envelope exchanged between services.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Recognized envelope type strings.
pub mod event_types {
    pub const REQUEST_CREATED: &str = "com.helpdesk.request.created";
    pub const REQUEST_PROCESSING: &str = "com.helpdesk.request.processing";
    pub const AGENT_RESPONSE_READY: &str = "com.helpdesk.agent.response-ready";
    pub const DATABASE_UPDATE_REQUESTED: &str = "com.helpdesk.database.update-requested";
    pub const SESSION_CREATED: &str = "com.helpdesk.session.created";
}

/// Service identities used as envelope sources (and as the self-source
/// circuit-breaker key in each service's event sink).
pub mod service_sources {
    pub const REQUEST_MANAGER: &str = "request-manager";
    pub const DELIVERY_ENGINE: &str = "delivery-engine";
}

/// A typed event wrapper carried over the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique envelope id — the dedup key under at-least-once delivery.
    pub id: String,
    /// One of [`event_types`].
    #[serde(rename = "type")]
    pub event_type: String,
    /// Emitting service identity.
    pub source: String,
    /// Emission time, RFC 3339.
    pub time: String,
    /// Correlation subject, usually the request id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub datacontenttype: String,
    /// The wrapped payload.
    pub data: Value,
}

impl EventEnvelope {
    /// Build an envelope with a fresh id and the current time.
    pub fn new(event_type: &str, source: &str, subject: Option<String>, data: Value) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event_type: event_type.to_string(),
            source: source.to_string(),
            time: chrono::Utc::now().to_rfc3339(),
            subject,
            datacontenttype: "application/json".to_string(),
            data,
        }
    }

    /// Decode the payload into a concrete type.
    pub fn data_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.data.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_serializes_type_field() {
        let env = EventEnvelope::new(
            event_types::REQUEST_CREATED,
            service_sources::REQUEST_MANAGER,
            Some("req-1".to_string()),
            json!({"request_id": "req-1"}),
        );
        let value = serde_json::to_value(&env).unwrap();
        assert_eq!(value["type"], "com.helpdesk.request.created");
        assert_eq!(value["source"], "request-manager");
        assert_eq!(value["datacontenttype"], "application/json");
    }

    #[test]
    fn test_fresh_envelopes_get_distinct_ids() {
        let a = EventEnvelope::new(event_types::SESSION_CREATED, "x", None, json!({}));
        let b = EventEnvelope::new(event_types::SESSION_CREATED, "x", None, json!({}));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_data_as_decodes_payload() {
        #[derive(serde::Deserialize)]
        struct Payload {
            request_id: String,
        }
        let env = EventEnvelope::new(
            event_types::AGENT_RESPONSE_READY,
            "request-manager",
            None,
            json!({"request_id": "req-9"}),
        );
        let payload: Payload = env.data_as().unwrap();
        assert_eq!(payload.request_id, "req-9");
    }
}
