//! Error responses shared by all handlers

use axum::{
    extract::rejection::QueryRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::data::filter::FilterSpecError;

/// Request failures, rendered as `{"error": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The client sent an unusable filter.
    #[error(transparent)]
    BadFilter(#[from] FilterSpecError),

    /// The query string itself could not be decoded.
    #[error("invalid query string: {0}")]
    BadQuery(#[from] QueryRejection),

    /// The backing file could not be read or normalized.
    #[error("failed to load exam data: {0:#}")]
    Load(anyhow::Error),

    #[error("worker task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadFilter(_) | ApiError::BadQuery(_) => StatusCode::BAD_REQUEST,
            ApiError::Load(_) | ApiError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("{self}");
        } else {
            log::warn!("rejected request: {self}");
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
