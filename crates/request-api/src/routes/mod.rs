//! Route handlers for the request manager API.

pub mod events;
pub mod health;
pub mod requests;
pub mod sessions;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the router with all routes.
pub fn router() -> Router<AppState> {
    Router::new()
        // Channel ingress; the path parameter doubles as a request id on GET.
        .route(
            "/api/v1/requests/:channel",
            post(requests::submit).get(requests::request_status),
        )
        .route("/api/v1/requests/:channel/sync", post(requests::submit_sync))
        // Sessions
        .route(
            "/api/v1/sessions",
            get(sessions::list_sessions).post(sessions::find_or_create),
        )
        .route(
            "/api/v1/sessions/:id",
            get(sessions::get_session).put(sessions::update_session),
        )
        .route("/api/v1/sessions/:id/reset", post(sessions::reset_session))
        // Inbound envelope sink
        .route("/api/v1/events", post(events::ingest))
        // Health check
        .route("/health", get(health::health))
}
