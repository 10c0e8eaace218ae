//! Typed failures for every stage of the analysis pipeline.
//!
//! Loading problems are fatal for a run. Every other variant means a specific
//! statistic cannot be computed on the given input, so the report can state
//! "not applicable" instead of printing a misleading number.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StatsError>;

#[derive(Debug, Error)]
pub enum DataLoadError {
    #[error("cannot read dataset {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("cannot parse dataset: {0}")]
    Parse(#[from] csv::Error),

    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}

#[derive(Debug, Error)]
pub enum StatsError {
    #[error(transparent)]
    DataLoad(#[from] DataLoadError),

    #[error("series '{column}' has no values after dropping missing entries")]
    EmptySeries { column: String },

    #[error("need at least {required} groups, found {found}")]
    InsufficientGroups { required: usize, found: usize },

    #[error("need at least {required} observations, got {actual}")]
    InsufficientObservations { required: usize, actual: usize },

    #[error("sample of size {count} is degenerate (at least 2 values are required)")]
    DegenerateSample { count: usize },

    #[error("zero variance: {context}")]
    ZeroVariance { context: String },

    #[error("design matrix is singular; the model is not identifiable")]
    SingularDesign,

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

impl StatsError {
    pub(crate) fn zero_variance(context: impl Into<String>) -> Self {
        StatsError::ZeroVariance {
            context: context.into(),
        }
    }

    /// Whether this failure aborts the whole run rather than a single section.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StatsError::DataLoad(_))
    }
}
