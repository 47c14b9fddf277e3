//! Request orchestration core.
//!
//! Ties the pieces together: inbound requests from any channel are
//! normalized into one canonical shape, bound to a session, executed against
//! the agent runtime through a pluggable communication strategy, routed on
//! handoff signals in the agent's output, and handed to the delivery engine.

pub mod error;
pub mod event_sink;
pub mod normalizer;
pub mod processor;
pub mod registry;
pub mod response;
pub mod routing;
pub mod runtime;
pub mod strategy;

pub use error::{OrchestratorError, Result};
pub use event_sink::{EventSink, SinkOutcome};
pub use normalizer::{IncomingRequest, RequestNormalizer};
pub use processor::{ProcessingMode, ProcessingOutcome, RequestProcessor};
pub use registry::{AgentDirectory, AgentRegistry, RefreshPolicy, StaticAgentDirectory};
pub use response::ResponseHandler;
pub use routing::RoutingDetector;
pub use runtime::{AgentRuntime, AgentTurn, HttpAgentRuntime};
pub use strategy::{
    CommunicationStrategy, DirectStrategy, EventBusStrategy, WaitOutcome,
};
