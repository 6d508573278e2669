use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::config::{Predictor, PredictorConfig};
use crate::data::{load_dataset, Dataset};
use crate::error::{FluxError, Result};
use crate::regression::{EngineState, FitWarning, FittedModel, RegressionEngine};

// ---------------------------------------------------------------------------
// Operating point – one set of user inputs
// ---------------------------------------------------------------------------

/// The six operating parameters for a single prediction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OperatingPoint {
    pub feed_temp: f64,
    pub permeate_temp: f64,
    pub hot_flow: f64,
    pub cold_flow: f64,
    pub pore_size: f64,
    pub thickness: f64,
}

impl OperatingPoint {
    pub fn get(&self, predictor: Predictor) -> f64 {
        match predictor {
            Predictor::FeedTemp => self.feed_temp,
            Predictor::PermeateTemp => self.permeate_temp,
            Predictor::HotFlow => self.hot_flow,
            Predictor::ColdFlow => self.cold_flow,
            Predictor::PoreSize => self.pore_size,
            Predictor::Thickness => self.thickness,
        }
    }
}

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// Everything the interactive front end needs, independent of rendering.
pub struct Session {
    config: PredictorConfig,

    engine: RegressionEngine,

    /// Last successfully loaded dataset (None until a load succeeds).
    dataset: Option<Dataset>,

    /// Where `dataset` came from.
    source: Option<PathBuf>,

    /// Status / error message for the user.
    status: String,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(PredictorConfig::default())
    }
}

impl Session {
    pub fn new(config: PredictorConfig) -> Self {
        Self {
            config,
            engine: RegressionEngine::new(),
            dataset: None,
            source: None,
            status: "No model trained. Load a dataset.".to_string(),
        }
    }

    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn model(&self) -> Option<&FittedModel> {
        self.engine.model()
    }

    pub fn state(&self) -> EngineState {
        self.engine.state()
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    /// Load `path` and retrain.
    ///
    /// A load failure leaves both the previous dataset and the previous model
    /// in place. A fit failure keeps the new dataset but clears the model.
    pub fn reload(&mut self, path: &Path) -> Result<Vec<FitWarning>> {
        let dataset = match load_dataset(path, &self.config) {
            Ok(ds) => ds,
            Err(e) => {
                log::error!("Reload of {} failed: {e}", path.display());
                self.status = format!("Error loading data: {e}");
                return Err(e);
            }
        };

        let result = self.engine.fit(
            &dataset,
            &self.config.predictor_columns(),
            self.config.target(),
        );
        self.dataset = Some(dataset);
        self.source = Some(path.to_path_buf());

        match result {
            Ok(warnings) => {
                self.status = match warnings.first() {
                    Some(w) => format!("Model trained. Warning: {w}"),
                    None => "Model trained.".to_string(),
                };
                Ok(warnings)
            }
            Err(e) => {
                self.status = format!("Training failed: {e}");
                Err(e)
            }
        }
    }

    /// Check every value of `point` against its configured inclusive range.
    pub fn validate(&self, point: &OperatingPoint) -> Result<()> {
        for entry in self.config.entries() {
            let value = point.get(entry.predictor);
            if !entry.range.contains(value) {
                return Err(FluxError::InputOutOfRange {
                    predictor: entry.predictor.to_string(),
                    value,
                    min: entry.range.min,
                    max: entry.range.max,
                });
            }
        }
        Ok(())
    }

    /// Validate `point`, then predict flux from the retained predictors.
    /// Never changes session state.
    pub fn predict(&self, point: &OperatingPoint) -> Result<f64> {
        self.validate(point)?;
        let model = self.engine.model().ok_or(FluxError::NotTrained)?;

        let inputs: BTreeMap<String, f64> = model
            .coefficients
            .iter()
            .filter_map(|c| {
                self.config
                    .predictor_for_column(&c.name)
                    .map(|p| (c.name.clone(), point.get(p)))
            })
            .collect();
        model.predict(&inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn point() -> OperatingPoint {
        OperatingPoint {
            feed_temp: 60.0,
            permeate_temp: 20.0,
            hot_flow: 600.0,
            cold_flow: 600.0,
            pore_size: 0.22,
            thickness: 200.0,
        }
    }

    fn csv_file(rows: &[[f64; 7]]) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "FeedTemp,PermeateTemp,HotFlow,ColdFlow,PoreSize,Thickness,Flux").unwrap();
        for r in rows {
            let line: Vec<String> = r.iter().map(|v| v.to_string()).collect();
            writeln!(file, "{}", line.join(",")).unwrap();
        }
        file.flush().unwrap();
        file
    }

    fn varied_rows(n: usize) -> Vec<[f64; 7]> {
        (0..n)
            .map(|i| {
                let f = i as f64;
                let feed = 40.0 + (i * 7 % 40) as f64;
                let perm = 10.0 + (i * 3 % 20) as f64;
                let hot = 300.0 + 25.0 * ((i * 5) % 30) as f64;
                let cold = 300.0 + 20.0 * ((i * 11) % 30) as f64;
                let pore = 0.1 + 0.05 * ((i * 13) % 15) as f64;
                let thick = 100.0 + 10.0 * ((i * 17) % 25) as f64;
                let flux = 0.4 * feed - 0.2 * perm + 0.01 * hot + 0.004 * cold + 8.0 * pore
                    - 0.02 * thick
                    + 0.05 * (f * 1.3).sin();
                [feed, perm, hot, cold, pore, thick, flux]
            })
            .collect()
    }

    #[test]
    fn predict_before_training_is_not_trained() {
        let session = Session::default();
        assert_eq!(session.state(), EngineState::Untrained);
        assert!(matches!(session.predict(&point()), Err(FluxError::NotTrained)));
    }

    #[test]
    fn out_of_range_input_is_rejected_first() {
        let session = Session::default();
        let mut p = point();
        p.pore_size = 2.0;
        match session.predict(&p) {
            Err(FluxError::InputOutOfRange { predictor, value, .. }) => {
                assert_eq!(predictor, "PoreSize");
                assert_eq!(value, 2.0);
            }
            other => panic!("expected InputOutOfRange, got {other:?}"),
        }
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let session = Session::default();
        let mut p = point();
        p.feed_temp = 90.0;
        p.permeate_temp = 5.0;
        assert!(session.validate(&p).is_ok());
    }

    #[test]
    fn reload_trains_and_predicts() {
        let file = csv_file(&varied_rows(40));
        let mut session = Session::default();
        let warnings = session.reload(file.path()).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(session.state(), EngineState::Trained);
        assert_eq!(session.model().unwrap().coefficients.len(), 6);
        assert!(session.predict(&point()).unwrap().is_finite());
        assert_eq!(session.status(), "Model trained.");
    }

    #[test]
    fn failed_load_keeps_previous_model() {
        let file = csv_file(&varied_rows(40));
        let mut session = Session::default();
        session.reload(file.path()).unwrap();
        let before = session.model().cloned();

        let err = session.reload(Path::new("/missing/data.xlsx")).unwrap_err();
        assert!(matches!(err, FluxError::FileNotFound(_)));
        assert_eq!(session.model().cloned(), before);
        assert_eq!(session.source(), Some(file.path()));
        assert!(session.status().starts_with("Error loading data"));
    }

    #[test]
    fn missing_column_keeps_previous_model() {
        let good = csv_file(&varied_rows(40));
        let mut session = Session::default();
        session.reload(good.path()).unwrap();

        let mut bad = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(bad, "FeedTemp,Flux\n60,12\n").unwrap();
        let err = session.reload(bad.path()).unwrap_err();
        assert!(matches!(err, FluxError::MissingColumn(c) if c == "PermeateTemp"));
        assert_eq!(session.state(), EngineState::Trained);
    }

    #[test]
    fn dependent_predictor_is_dropped_and_prediction_still_works() {
        let rows: Vec<[f64; 7]> = varied_rows(40)
            .into_iter()
            .map(|mut r| {
                r[3] = 2.0 * r[2];
                r
            })
            .collect();
        let file = csv_file(&rows);
        let mut session = Session::default();
        let warnings = session.reload(file.path()).unwrap();
        assert_eq!(warnings.len(), 1);
        let model = session.model().unwrap();
        assert_eq!(model.coefficients.len(), 5);
        assert_eq!(model.dropped.len(), 1);
        assert!(session.status().contains("Warning"));
        assert!(session.predict(&point()).unwrap().is_finite());
    }

    #[test]
    fn all_constant_predictors_clear_the_model() {
        let mut session = Session::default();
        session.reload(csv_file(&varied_rows(40)).path()).unwrap();

        let rows: Vec<[f64; 7]> = (0..10)
            .map(|i| [60.0, 20.0, 600.0, 600.0, 0.22, 200.0, 10.0 + i as f64])
            .collect();
        let err = session.reload(csv_file(&rows).path()).unwrap_err();
        assert!(matches!(err, FluxError::NoIndependentPredictors));
        assert_eq!(session.state(), EngineState::Untrained);
        assert!(session.dataset().is_some());
    }
}
