use std::path::PathBuf;

use thiserror::Error;

/// Every failure the loader, the regression engine and the session can report.
///
/// Load failures (`FileNotFound` .. `MissingColumn`) are fatal to a reload but
/// never touch an already fitted model. `EmptyDataset` and
/// `NoIndependentPredictors` are fatal to a fit and leave the engine untrained.
/// The remaining kinds affect a single call only.
#[derive(Error, Debug)]
pub enum FluxError {
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("cannot read {path}: {reason}")]
    FileUnreadable { path: PathBuf, reason: String },

    #[error("unsupported file extension: .{0}")]
    UnsupportedFormat(String),

    #[error("required column '{0}' was not found in the input file")]
    MissingColumn(String),

    #[error("no rows left after removing rows with missing values")]
    EmptyDataset,

    #[error("no independent predictors available")]
    NoIndependentPredictors,

    #[error("{predictor} = {value} is outside the accepted range [{min}, {max}]")]
    InputOutOfRange {
        predictor: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("no value supplied for predictor '{0}'")]
    MissingInput(String),

    #[error("'{0}' is not a predictor of the fitted model")]
    UnexpectedInput(String),

    #[error("model not trained: load a dataset first")]
    NotTrained,

    #[error("length mismatch: expected {expected}, found {found}")]
    LengthMismatch { expected: usize, found: usize },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl FluxError {
    pub(crate) fn unreadable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        FluxError::FileUnreadable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FluxError>;
