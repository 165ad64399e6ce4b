//! Dashboard endpoints: filter choices and filtered summaries

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::Deserialize;

use super::{run_blocking, ApiError};
use crate::data::aggregate::Summary;
use crate::data::filter::FilterSpec;
use crate::data::model::FilterOptions;
use crate::AppState;

/// Query string of `GET /get_data`.
#[derive(Debug, Deserialize)]
pub struct GetDataQuery {
    /// URL-encoded JSON object; `{}` when absent.
    pub filters: Option<String>,
}

/// GET /
///
/// Distinct sorted values for each filter control plus the fixed score
/// domain. No aggregation.
pub async fn index(State(state): State<AppState>) -> Result<Json<FilterOptions>, ApiError> {
    let options = run_blocking(move || state.filter_options()).await?;
    Ok(Json(options))
}

/// GET /get_data?filters=<JSON>
///
/// Filtered yearly and group averages, pass/fail split, count and pass rate.
pub async fn get_data(
    State(state): State<AppState>,
    query: Result<Query<GetDataQuery>, QueryRejection>,
) -> Result<Json<Summary>, ApiError> {
    let Query(query) = query?;
    let spec = FilterSpec::from_json(query.filters.as_deref().unwrap_or("{}"))?;
    let summary = run_blocking(move || state.summarize(&spec)).await?;
    Ok(Json(summary))
}
