//! Application state shared across handlers.

use std::sync::Arc;

use database::Database;
use delivery_engine::{DeliveryEngine, DeliverySink};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Database connection.
    pub db: Database,
    /// The dispatch engine.
    pub engine: Arc<DeliveryEngine>,
    /// Inbound envelope sink.
    pub sink: Arc<DeliverySink>,
}

impl AppState {
    pub fn new(db: Database, engine: Arc<DeliveryEngine>, sink: Arc<DeliverySink>) -> Self {
        Self { db, engine, sink }
    }
}
