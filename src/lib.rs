//! Exam dashboard: loads examination records from a flat file, filters them
//! by the dashboard's selections and reports score averages and pass rates.

pub mod api;
pub mod app;
pub mod config;
pub mod data;
pub mod state;

pub use app::{dashboard_router, raw_data_router};
pub use state::AppState;
