//! Health check endpoint

use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

/// Returns status, service name and version.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub module: &'static str,
    pub version: &'static str,
}

/// Build `GET /health` for the named service.
pub fn health_routes(module: &'static str) -> Router<AppState> {
    Router::new().route(
        "/health",
        get(move || async move {
            Json(HealthResponse {
                status: "ok",
                module,
                version: env!("CARGO_PKG_VERSION"),
            })
        }),
    )
}
