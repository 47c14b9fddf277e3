//! Application state shared across handlers.

use std::sync::Arc;

use database::Database;
use orchestrator::{EventSink, RequestProcessor};
use session_manager::SessionManager;

use crate::config::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Database connection.
    pub db: Database,
    /// Session lifecycle.
    pub sessions: SessionManager,
    /// The unified request processor.
    pub processor: Arc<RequestProcessor>,
    /// Inbound envelope sink.
    pub sink: Arc<EventSink>,
    /// Service configuration.
    pub config: Config,
}

impl AppState {
    pub fn new(
        db: Database,
        sessions: SessionManager,
        processor: Arc<RequestProcessor>,
        sink: Arc<EventSink>,
        config: Config,
    ) -> Self {
        Self {
            db,
            sessions,
            processor,
            sink,
            config,
        }
    }
}
