//! HTTP handlers for the dashboard and raw-data services

pub mod dashboard;
pub mod error;
pub mod health;
pub mod raw;

pub use dashboard::{get_data, index};
pub use error::ApiError;
pub use health::health_routes;
pub use raw::raw_records;

/// Run blocking file I/O and computation off the async executor.
pub(crate) async fn run_blocking<T, F>(job: F) -> Result<T, ApiError>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job).await?.map_err(ApiError::Load)
}
