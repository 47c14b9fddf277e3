//! Route handlers for the delivery engine API.

pub mod deliver;
pub mod events;
pub mod health;
pub mod integrations;

use axum::routing::{delete, get, post};
use axum::Router;

use crate::state::AppState;

/// Build the router with all routes.
pub fn router() -> Router<AppState> {
    Router::new()
        // Direct-call delivery (the request manager in direct mode)
        .route("/deliver", post(deliver::deliver))
        // Inbound envelope sink
        .route("/events", post(events::ingest))
        // Per-user integration management
        .route(
            "/api/v1/users/:user_id/integrations",
            get(integrations::list).post(integrations::upsert),
        )
        .route(
            "/api/v1/users/:user_id/integrations/:integration_type",
            delete(integrations::remove),
        )
        // Delivery audit trail
        .route(
            "/api/v1/users/:user_id/deliveries",
            get(integrations::deliveries),
        )
        // Health check
        .route("/health", get(health::health))
}
