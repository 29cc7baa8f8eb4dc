use crate::source::error::SourceError;
use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("Could not reach the document store")]
    SourceUnavailable(#[source] SourceError),

    #[error(transparent)]
    Source(SourceError),

    #[error("No data found in the document store.")]
    EmptyDataset { origin: String },

    #[error("No data after applying filters.")]
    EmptyFilterResult,

    #[error(transparent)]
    Polars(#[from] PolarsError),
}

/// How an error is presented to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Halts the whole load.
    Blocking,
    /// Halts only the current render; controls stay usable.
    Warning,
}

impl DashboardError {
    pub fn severity(&self) -> Severity {
        match self {
            DashboardError::EmptyFilterResult => Severity::Warning,
            _ => Severity::Blocking,
        }
    }
}

impl From<SourceError> for DashboardError {
    fn from(error: SourceError) -> Self {
        if error.is_unavailable() {
            DashboardError::SourceUnavailable(error)
        } else {
            DashboardError::Source(error)
        }
    }
}
