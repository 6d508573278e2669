use std::collections::BTreeMap;

use super::ols::{fit, FitWarning, FittedModel};
use crate::data::Dataset;
use crate::error::{FluxError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Untrained,
    Trained,
}

/// Holds at most one fitted model.
///
/// A successful fit replaces the model wholesale; a failed fit leaves the
/// engine `Untrained`. The model is never updated in place.
#[derive(Debug, Default)]
pub struct RegressionEngine {
    model: Option<FittedModel>,
}

impl RegressionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> EngineState {
        match self.model {
            Some(_) => EngineState::Trained,
            None => EngineState::Untrained,
        }
    }

    pub fn model(&self) -> Option<&FittedModel> {
        self.model.as_ref()
    }

    pub fn fit(
        &mut self,
        dataset: &Dataset,
        predictors: &[String],
        target: &str,
    ) -> Result<Vec<FitWarning>> {
        match fit(dataset, predictors, target) {
            Ok(outcome) => {
                self.model = Some(outcome.model);
                Ok(outcome.warnings)
            }
            Err(e) => {
                if self.model.take().is_some() {
                    log::info!("Discarded previous model after failed fit");
                }
                Err(e)
            }
        }
    }

    pub fn predict(&self, inputs: &BTreeMap<String, f64>) -> Result<f64> {
        self.model
            .as_ref()
            .ok_or(FluxError::NotTrained)?
            .predict(inputs)
    }
}
