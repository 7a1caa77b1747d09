//! API route configuration.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers;
use crate::state::AppState;

/// Creates the API router with all routes configured.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Liveness & health
        .route("/", get(handlers::root))
        .route("/api/health", get(handlers::health_check))

        // Market data
        .route("/api/prices", get(handlers::get_prices))
        .route("/api/cache/stats", get(handlers::cache_stats))

        // Contest
        .route("/api/contest", get(handlers::contest_info))
        .route("/api/contest/submit", post(handlers::submit_entry))
        .route("/api/contest/submissions", get(handlers::list_submissions))

        .fallback(handlers::not_found)
        .with_state(state)
}
