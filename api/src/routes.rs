//! Router configuration for the API process.

use crate::health::{health_check, readiness_check};
use crate::state::AppState;
use crate::tickets;
use axum::{
    routing::{get, post},
    Router,
};

/// Build the Axum router: health checks plus the ticket surface.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/tickets/", post(tickets::create_ticket))
        .route("/tickets/:id", get(tickets::get_ticket))
        .route("/tickets/concert/:concert_id", get(tickets::tickets_by_concert))
        .route("/tickets/zone/:zone_id", get(tickets::tickets_by_zone))
        .with_state(state)
}
