use axum::{
    Json,
    extract::State,
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;

use crate::server::AppState;
use crate::service::ServiceError;

/// Response header telling whether the roster came from the cache.
pub const CACHE_STATUS_HEADER: HeaderName = HeaderName::from_static("x-roster-cache");

#[derive(Serialize)]
pub struct HealthResponse<'a> {
    status: &'a str,
}

#[derive(Serialize)]
pub struct ReadinessResponse<'a> {
    status: &'a str,
    cache: &'a str,
    cache_available: bool,
}

pub async fn root() -> impl IntoResponse {
    let body = json!({
        "service": "Roster Server",
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(body))
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

// Always ready: the cache is an optimization, not a dependency.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let cache = state.roster.cache();
    let body = ReadinessResponse {
        status: "ready",
        cache: cache.mode(),
        cache_available: cache.is_available().await,
    };
    (StatusCode::OK, Json(body))
}

/// `GET /api/users`: the full normalized roster as a JSON array.
pub async fn list_users(State(state): State<AppState>) -> Result<Response, ServiceError> {
    let loaded = state.roster.load().await?;
    let mut response = Json(loaded.roster).into_response();
    response.headers_mut().insert(
        CACHE_STATUS_HEADER,
        HeaderValue::from_static(loaded.origin.as_str()),
    );
    Ok(response)
}
