//! Request manager HTTP service.
//!
//! Accepts self-service requests from every ingress channel, binds them to
//! sessions, and drives them through the configured communication strategy.

mod config;
mod error;
mod routes;
mod state;

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use database::Database;
use events::EventPublisher;
use orchestrator::{
    AgentRegistry, DirectStrategy, EventBusStrategy, EventSink, HttpAgentRuntime,
    RefreshPolicy, RequestProcessor, ResponseHandler,
};
use orchestrator::registry::HttpAgentDirectory;
use orchestrator::strategy::CommunicationStrategy;
use session_manager::{IngressRateLimiter, RuntimeSessionCache, SessionManager};

use crate::config::{CommMode, Config};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    info!(addr = %config.addr, mode = ?config.comm_mode, "Starting request manager");

    let db = Database::connect(&config.database_url).await?;
    db.migrate().await?;

    let sessions = SessionManager::new(db.clone());
    let rate_limiter = Arc::new(IngressRateLimiter::new(config.rate_limit_interval));
    let runtime_cache = Arc::new(RuntimeSessionCache::new(Duration::from_secs(3600)));
    let registry = Arc::new(AgentRegistry::new(
        Arc::new(HttpAgentDirectory::new(config.agent_directory_url.clone())),
        RefreshPolicy::AlwaysRefresh,
        config.default_agent.clone(),
    ));
    let runtime = Arc::new(HttpAgentRuntime::new(
        config.agent_runtime_url.clone(),
        config.agent_turn_timeout,
    ));

    let publisher = EventPublisher::new(config.broker_url.clone());
    let (strategy, inline_execution): (Arc<dyn CommunicationStrategy>, bool) =
        match config.comm_mode {
            CommMode::Event => (
                Arc::new(EventBusStrategy::new(db.clone(), publisher.clone())),
                false,
            ),
            CommMode::Direct => (
                Arc::new(DirectStrategy::new(config.delivery_engine_url.clone())),
                true,
            ),
        };

    let processor = Arc::new(RequestProcessor::new(
        db.clone(),
        sessions.clone(),
        rate_limiter,
        runtime_cache.clone(),
        registry.clone(),
        runtime.clone(),
        strategy.clone(),
        inline_execution,
        Some(publisher),
    ));

    let response_handler = ResponseHandler::new(
        db.clone(),
        sessions.clone(),
        runtime_cache,
        registry,
        runtime,
        strategy,
    );
    let sink = Arc::new(EventSink::new(
        db.clone(),
        sessions.clone(),
        response_handler,
        events::service_sources::REQUEST_MANAGER.to_string(),
    ));

    let state = AppState::new(db, sessions, processor, sink, config.clone());

    let app = routes::router().with_state(state);

    info!(addr = %config.addr, "Request manager listening");
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
