use axum::{routing::get, Router};

use crate::api;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Routers
// ---------------------------------------------------------------------------

/// Dashboard service: filter choices at `/`, summaries at `/get_data`.
pub fn dashboard_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(api::index))
        .route("/get_data", get(api::get_data))
        .merge(api::health_routes("exam-dashboard"))
        .with_state(state)
}

/// Raw-data service: the whole loaded table at `/`.
pub fn raw_data_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(api::raw_records))
        .merge(api::health_routes("raw-data"))
        .with_state(state)
}
