//! Ordinary least squares with collinearity pruning.
//!
//! - `qr`: Householder QR with column pivoting and numeric rank
//! - `ols`: fitting, `FittedModel`, point prediction
//! - `metrics`: training-set error measures
//! - `engine`: the `Untrained` / `Trained` state machine wrapping `ols`

pub mod engine;
pub mod metrics;
pub mod ols;
pub mod qr;

pub use engine::{EngineState, RegressionEngine};
pub use ols::{fit, Coefficient, FitOutcome, FitSummary, FitWarning, FittedModel};
