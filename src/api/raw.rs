//! Raw-data endpoint

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};

use super::{run_blocking, ApiError};
use crate::AppState;

/// GET /
///
/// Every loaded record as a JSON array, keys in file column order with the
/// derived year last. Non-ASCII text is written as-is.
pub async fn raw_records(State(state): State<AppState>) -> Result<Response, ApiError> {
    let table = run_blocking(move || state.load()).await?;
    Ok(Json(table.in_source_order()).into_response())
}
