//! Membrane-distillation flux prediction.
//!
//! Loads a tabular dataset of operating conditions and measured flux, fits an
//! ordinary-least-squares model with an intercept (dropping linearly
//! dependent predictors), and predicts flux for new operating points.

pub mod config;
pub mod data;
pub mod error;
pub mod regression;
pub mod session;

pub use config::{Predictor, PredictorConfig, ValidRange};
pub use data::Dataset;
pub use error::{FluxError, Result};
pub use regression::{fit, EngineState, FitWarning, FittedModel, RegressionEngine};
pub use session::{OperatingPoint, Session};
