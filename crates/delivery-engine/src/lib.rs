//! Delivery engine: fans one finished response out to every notification
//! integration the user has enabled, with per-integration isolation, retry
//! bookkeeping, and a bounded retry horizon.

pub mod engine;
pub mod error;
pub mod handler;
pub mod retry;
pub mod sink;
pub mod template;

pub use engine::{DeliveryEngine, DeliveryRequest, DeliveryResult, Handlers};
pub use error::DeliveryError;
pub use handler::{
    DeliveryKind, DeliveryOutcome, EmailHandler, IntegrationHandler, SlackHandler, TestHandler,
    WebhookHandler,
};
pub use retry::{LoggingRetryScheduler, RetryScheduler};
pub use sink::{DeliverySink, SinkOutcome};
pub use template::TemplateEngine;
