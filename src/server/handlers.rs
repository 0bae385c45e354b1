//! Admin endpoint handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use super::AppState;
use crate::repository::RepositoryError;

const DEFAULT_LIMIT: u32 = 100;

/// Health check endpoint for container orchestration.
pub async fn health() -> impl IntoResponse {
    StatusCode::OK
}

/// Listing parameters shared by the ledger endpoints.
#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<u32>,
    pub site: Option<i64>,
}

fn internal_error(e: RepositoryError) -> Response {
    tracing::error!(error = %e, "admin query failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": e.to_string() })),
    )
        .into_response()
}

/// `GET /api/admin/crawler/runs` — crawl run ledger, newest first.
pub async fn list_runs(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Response {
    match state
        .repos
        .runs
        .list(params.site, params.limit.unwrap_or(DEFAULT_LIMIT))
    {
        Ok(runs) => Json(runs).into_response(),
        Err(e) => internal_error(e),
    }
}

/// `GET /api/admin/crawler/errors` — crawl-level error log.
pub async fn list_errors(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Response {
    match state
        .repos
        .linkage
        .list_errors(params.site, params.limit.unwrap_or(DEFAULT_LIMIT))
    {
        Ok(errors) => Json(errors).into_response(),
        Err(e) => internal_error(e),
    }
}

/// `GET /api/admin/crawler/erroneous-links` — linkage quarantine.
pub async fn list_erroneous_links(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Response {
    match state
        .repos
        .linkage
        .list_erroneous(params.limit.unwrap_or(DEFAULT_LIMIT))
    {
        Ok(links) => Json(links).into_response(),
        Err(e) => internal_error(e),
    }
}

/// `GET /api/admin/sites` — site registry in scheduling order.
pub async fn list_sites(State(state): State<AppState>) -> Response {
    match state.repos.sites.get_all() {
        Ok(sites) => Json(sites).into_response(),
        Err(e) => internal_error(e),
    }
}

/// `GET /api/admin/sites/:site_id/checkpoint` — current restart checkpoint.
pub async fn site_checkpoint(
    State(state): State<AppState>,
    Path(site_id): Path<i64>,
) -> Response {
    match state.repos.checkpoints.last_checkpoint(site_id) {
        Ok(Some(checkpoint)) => Json(checkpoint).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "no checkpoint for site" })),
        )
            .into_response(),
        Err(e) => internal_error(e),
    }
}

/// `GET /api/admin/sites/:site_id/captures` — capture counts for a site.
pub async fn site_captures(
    State(state): State<AppState>,
    Path(site_id): Path<i64>,
) -> Response {
    match state.repos.captures.stats(site_id) {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => internal_error(e),
    }
}
