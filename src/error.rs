//! Error taxonomy for scoring, model evaluation and bundle loading

use std::path::PathBuf;
use thiserror::Error;

/// Failures raised while evaluating a classifier.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Input matrix width does not match the model.
    #[error("expected {expected} features, got {actual}")]
    FeatureCount { expected: usize, actual: usize },

    /// Probability came out NaN or infinite.
    #[error("non-finite probability at row {row}")]
    NonFinite { row: usize },

    /// Persisted model parameters are inconsistent.
    #[error("invalid model structure: {0}")]
    InvalidStructure(String),

    /// Decision threshold outside `[0, 1]`.
    #[error("threshold {0} is outside [0, 1]")]
    InvalidThreshold(f64),
}

/// Errors surfaced by batch scoring and importance lookups.
#[derive(Error, Debug)]
pub enum ScoringError {
    /// One or more canonical feature columns are absent from the batch.
    #[error("missing required features: {}", .0.join(", "))]
    MissingFeatures(Vec<String>),

    /// A record names a geography with no bundle.
    #[error("unsupported geography: {0}")]
    UnsupportedGeography(String),

    /// Importance requested for a country with no bundle.
    #[error("unsupported country: {0}")]
    UnsupportedCountry(String),

    /// Empty batch.
    #[error("no data to score")]
    NoData,

    /// The request body could not be decoded into customer records.
    #[error("invalid request body: {0}")]
    InvalidRequest(String),

    /// The classifier failed while computing probabilities.
    #[error("classification failed: {0}")]
    Classification(#[from] ModelError),

    /// The model exposes no feature importances, directly or through its steps.
    #[error("model for {0} does not support feature importances")]
    ImportanceUnsupported(String),
}

impl ScoringError {
    /// Whether the caller caused this error (bad input) rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ScoringError::MissingFeatures(_)
                | ScoringError::UnsupportedGeography(_)
                | ScoringError::UnsupportedCountry(_)
                | ScoringError::NoData
                | ScoringError::InvalidRequest(_)
        )
    }
}

/// Startup failure while loading a model bundle.
#[derive(Error, Debug)]
pub enum BundleError {
    #[error("failed to read bundle {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse bundle {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid bundle {}: {reason}", .path.display())]
    Invalid { path: PathBuf, reason: String },
}

/// Failures while loading the dashboard's customer file.
#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("expected a .csv file, got {}", .0.display())]
    NotCsv(PathBuf),

    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("column {column}: {reason}")]
    InvalidColumn { column: String, reason: String },

    #[error("failed to read customer data: {0}")]
    Polars(#[from] polars::prelude::PolarsError),
}
