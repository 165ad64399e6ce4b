use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;

use crate::data::aggregate::{aggregate, Summary};
use crate::data::filter::FilterSpec;
use crate::data::loader::load_file;
use crate::data::model::{ExamTable, FilterOptions};

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// State shared by the HTTP handlers: only the backing-file location.
///
/// The table itself is re-read on every call, so edits to the file show up
/// on the next request and nothing here is ever mutated.
#[derive(Debug, Clone)]
pub struct AppState {
    data_path: Arc<PathBuf>,
}

impl AppState {
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: Arc::new(data_path.into()),
        }
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    /// Fresh copy of the full table.
    pub fn load(&self) -> Result<ExamTable> {
        load_file(&self.data_path)
    }

    /// Distinct values for the dashboard's filter controls.
    pub fn filter_options(&self) -> Result<FilterOptions> {
        Ok(self.load()?.filter_options())
    }

    /// Load, filter and aggregate.
    pub fn summarize(&self, spec: &FilterSpec) -> Result<Summary> {
        let table = self.load()?;
        Ok(aggregate(&table, spec))
    }
}
