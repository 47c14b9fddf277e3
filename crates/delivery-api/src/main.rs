//! Delivery engine HTTP service.
//!
//! Receives finished responses (directly or via broker envelopes) and fans
//! them out to every notification integration the user has enabled.

mod config;
mod error;
mod routes;
mod state;

use std::sync::Arc;

use tracing::{info, warn};

use database::Database;
use delivery_engine::{
    DeliveryEngine, DeliverySink, EmailHandler, Handlers, IntegrationHandler,
    LoggingRetryScheduler, SlackHandler, TestHandler, WebhookHandler,
};

use crate::config::Config;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    info!(addr = %config.addr, "Starting delivery engine");

    let db = Database::connect(&config.database_url).await?;
    db.migrate().await?;

    let engine = Arc::new(DeliveryEngine::new(
        db.clone(),
        build_handlers(&config),
        Arc::new(LoggingRetryScheduler),
    ));
    let sink = Arc::new(DeliverySink::new(
        db.clone(),
        engine.clone(),
        events::service_sources::DELIVERY_ENGINE.to_string(),
    ));

    let state = AppState::new(db, engine, sink);
    let app = routes::router().with_state(state);

    info!(addr = %config.addr, "Delivery engine listening");
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Wire real channel handlers where credentials are configured; fall back to
/// the in-memory stub elsewhere so a partial deployment still runs.
fn build_handlers(config: &Config) -> Handlers {
    let slack: Box<dyn IntegrationHandler> = match &config.slack_bot_token {
        Some(token) => Box::new(SlackHandler::new(token.clone())),
        None => {
            warn!("SLACK_BOT_TOKEN not set, slack deliveries are stubbed");
            Box::new(TestHandler::new())
        }
    };

    let email: Box<dyn IntegrationHandler> = match &config.smtp {
        Some(smtp) => match EmailHandler::new(
            &smtp.host,
            smtp.port,
            smtp.username.clone(),
            smtp.password.clone(),
            smtp.from_address.clone(),
        ) {
            Ok(handler) => Box::new(handler),
            Err(e) => {
                warn!(error = %e, "SMTP transport setup failed, email deliveries are stubbed");
                Box::new(TestHandler::new())
            }
        },
        None => {
            warn!("SMTP not configured, email deliveries are stubbed");
            Box::new(TestHandler::new())
        }
    };

    Handlers {
        slack,
        email,
        webhook: Box::new(WebhookHandler::new()),
        test: Box::new(TestHandler::new()),
    }
}
