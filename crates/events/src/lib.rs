//! Event envelopes and canonical payloads for inter-service communication.
//!
//! Services exchange [`EventEnvelope`]s over an at-least-once broker. The
//! envelope wraps either a [`NormalizedRequest`] or an [`AgentResponse`];
//! consumers dedup on the envelope id via the processed-event ledger.

pub mod envelope;
pub mod publisher;
pub mod types;

pub use envelope::{event_types, service_sources, EventEnvelope};
pub use publisher::EventPublisher;
pub use types::{
    AgentResponse, IngressChannel, NormalizedRequest, RequestType, ResponseType,
};
