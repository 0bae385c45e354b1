//! Router configuration for the admin server.

use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;

use super::handlers;
use super::AppState;

/// Create the admin router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        // Crawler ledgers
        .route("/api/admin/crawler/runs", get(handlers::list_runs))
        .route("/api/admin/crawler/errors", get(handlers::list_errors))
        .route(
            "/api/admin/crawler/erroneous-links",
            get(handlers::list_erroneous_links),
        )
        // Site registry
        .route("/api/admin/sites", get(handlers::list_sites))
        .route(
            "/api/admin/sites/:site_id/checkpoint",
            get(handlers::site_checkpoint),
        )
        .route(
            "/api/admin/sites/:site_id/captures",
            get(handlers::site_captures),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}
