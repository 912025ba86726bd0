//! Error taxonomy for the risk inference pipeline.
//!
//! Every failure is local to a single `assess` call or a single training run;
//! nothing here requires cross-call cleanup.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IbfError>;

#[derive(Debug, Error)]
pub enum IbfError {
    /// A categorical value had no code assigned at fit time.
    #[error("unknown {field} category {label:?}: not present in the training vocabulary")]
    UnknownCategory { field: String, label: String },

    /// The derived season string is missing from the season vocabulary.
    #[error("derived season {season:?} has no assigned code")]
    SeasonEncoding { season: String },

    /// A fitted standard deviation is exactly zero.
    #[error("feature {feature:?} has zero variance; cannot standardize")]
    DegenerateFeature { feature: String },

    /// An encoder was asked to decode a code outside its fitted range.
    #[error("code {code} out of range for {field} encoder with {len} classes")]
    CodeOutOfRange { field: String, code: usize, len: usize },

    #[error("failed to load artifact {}: {reason}", artifact.display())]
    ArtifactLoad { artifact: PathBuf, reason: String },

    #[error("artifact schema mismatch: expected {expected}, found {found}")]
    SchemaMismatch { expected: String, found: String },

    #[error("dataset is missing required column {column:?}")]
    MissingColumn { column: String },

    #[error("dataset row {row}: {reason}")]
    Dataset { row: usize, reason: String },

    #[error("dataset contains no samples")]
    EmptyDataset,

    #[error("expected {expected} values, got {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("input {feature:?} is not a finite number")]
    NonFiniteInput { feature: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl IbfError {
    pub(crate) fn artifact_load(artifact: impl Into<PathBuf>, reason: impl ToString) -> Self {
        IbfError::ArtifactLoad { artifact: artifact.into(), reason: reason.to_string() }
    }
}
