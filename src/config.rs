//! Predictor configuration.
//!
//! The six operating parameters are a closed set, so they are modelled as the
//! [`Predictor`] enum. Everything that is looked up "by predictor name" (the
//! source column, the accepted input range) hangs off that enum through
//! [`PredictorConfig`], fixed once at start-up.
//!
//! Defaults are compiled in; a TOML file can override them:
//!
//! ```toml
//! target = "Flux"
//!
//! [predictors.FeedTemp]
//! column = "Feed temperature"
//! min = 40.0
//! max = 80.0
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::error::{FluxError, Result};

/// Name of the target column in the default configuration.
pub const TARGET_COLUMN: &str = "Flux";

/// One of the membrane-distillation operating parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Predictor {
    FeedTemp,
    PermeateTemp,
    HotFlow,
    ColdFlow,
    PoreSize,
    Thickness,
}

impl Predictor {
    /// All predictors, in design-matrix order.
    pub const ALL: [Predictor; 6] = [
        Predictor::FeedTemp,
        Predictor::PermeateTemp,
        Predictor::HotFlow,
        Predictor::ColdFlow,
        Predictor::PoreSize,
        Predictor::Thickness,
    ];

    /// Canonical key, also the default column name.
    pub fn key(self) -> &'static str {
        match self {
            Predictor::FeedTemp => "FeedTemp",
            Predictor::PermeateTemp => "PermeateTemp",
            Predictor::HotFlow => "HotFlow",
            Predictor::ColdFlow => "ColdFlow",
            Predictor::PoreSize => "PoreSize",
            Predictor::Thickness => "Thickness",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Predictor::FeedTemp => "Feed temperature",
            Predictor::PermeateTemp => "Cold (permeate) temperature",
            Predictor::HotFlow => "Hot flow rate",
            Predictor::ColdFlow => "Cold flow rate",
            Predictor::PoreSize => "Pore size",
            Predictor::Thickness => "Membrane thickness",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Predictor::FeedTemp | Predictor::PermeateTemp => "°C",
            Predictor::HotFlow | Predictor::ColdFlow => "mL/min",
            Predictor::PoreSize | Predictor::Thickness => "µm",
        }
    }

    pub fn default_range(self) -> ValidRange {
        match self {
            Predictor::FeedTemp => ValidRange::new(30.0, 90.0),
            Predictor::PermeateTemp => ValidRange::new(5.0, 40.0),
            Predictor::HotFlow => ValidRange::new(100.0, 1500.0),
            Predictor::ColdFlow => ValidRange::new(100.0, 1500.0),
            Predictor::PoreSize => ValidRange::new(0.05, 1.0),
            Predictor::Thickness => ValidRange::new(20.0, 500.0),
        }
    }

    pub fn from_key(key: &str) -> Option<Predictor> {
        Predictor::ALL.into_iter().find(|p| p.key() == key)
    }
}

impl fmt::Display for Predictor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Inclusive accepted range for an input value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidRange {
    pub min: f64,
    pub max: f64,
}

impl ValidRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Column name and accepted range of one predictor.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictorEntry {
    pub predictor: Predictor,
    pub column: String,
    pub range: ValidRange,
}

/// The complete predictor configuration: six entries in fixed order plus the
/// target column.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictorConfig {
    target: String,
    entries: Vec<PredictorEntry>,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            target: TARGET_COLUMN.to_string(),
            entries: Predictor::ALL
                .into_iter()
                .map(|predictor| PredictorEntry {
                    predictor,
                    column: predictor.key().to_string(),
                    range: predictor.default_range(),
                })
                .collect(),
        }
    }
}

// -- TOML file layout --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    target: Option<String>,
    #[serde(default)]
    predictors: BTreeMap<String, PredictorOverride>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PredictorOverride {
    column: Option<String>,
    min: Option<f64>,
    max: Option<f64>,
}

impl PredictorConfig {
    /// Parse a TOML override document on top of the defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(text).map_err(|e| FluxError::Config(e.to_string()))?;

        let mut config = Self::default();
        if let Some(target) = file.target {
            config.target = target.trim().to_string();
        }

        for (key, ov) in file.predictors {
            let predictor = Predictor::from_key(&key)
                .ok_or_else(|| FluxError::Config(format!("unknown predictor '{key}'")))?;
            let entry = config.entry_mut(predictor);
            if let Some(column) = ov.column {
                entry.column = column.trim().to_string();
            }
            if let Some(min) = ov.min {
                entry.range.min = min;
            }
            if let Some(max) = ov.max {
                entry.range.max = max;
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML override file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FluxError::FileNotFound(path.to_path_buf()),
            _ => FluxError::unreadable(path, e),
        })?;
        let config = Self::from_toml_str(&text)?;
        log::info!("Loaded predictor configuration from {}", path.display());
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.target.is_empty() {
            return Err(FluxError::Config("target column name is empty".into()));
        }
        for entry in &self.entries {
            let ValidRange { min, max } = entry.range;
            if !min.is_finite() || !max.is_finite() || min > max {
                return Err(FluxError::Config(format!(
                    "{}: invalid range [{min}, {max}]",
                    entry.predictor
                )));
            }
            if entry.column.is_empty() {
                return Err(FluxError::Config(format!(
                    "{}: column name is empty",
                    entry.predictor
                )));
            }
            if entry.column == self.target {
                return Err(FluxError::Config(format!(
                    "{}: column '{}' is also the target column",
                    entry.predictor, entry.column
                )));
            }
        }

        let mut seen: BTreeMap<&str, Predictor> = BTreeMap::new();
        for entry in &self.entries {
            if let Some(first) = seen.insert(entry.column.as_str(), entry.predictor) {
                return Err(FluxError::Config(format!(
                    "{first} and {} both read column '{}'",
                    entry.predictor, entry.column
                )));
            }
        }
        Ok(())
    }

    // Entries are always stored in `Predictor::ALL` order.
    fn entry_mut(&mut self, predictor: Predictor) -> &mut PredictorEntry {
        &mut self.entries[predictor as usize]
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn entries(&self) -> &[PredictorEntry] {
        &self.entries
    }

    pub fn entry(&self, predictor: Predictor) -> &PredictorEntry {
        &self.entries[predictor as usize]
    }

    pub fn column(&self, predictor: Predictor) -> &str {
        &self.entry(predictor).column
    }

    pub fn range(&self, predictor: Predictor) -> ValidRange {
        self.entry(predictor).range
    }

    /// Predictor column names in design-matrix order.
    pub fn predictor_columns(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.column.clone()).collect()
    }

    /// Map a column name back to its predictor.
    pub fn predictor_for_column(&self, column: &str) -> Option<Predictor> {
        self.entries
            .iter()
            .find(|e| e.column == column)
            .map(|e| e.predictor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_all_predictors_in_order() {
        let config = PredictorConfig::default();
        assert_eq!(config.target(), "Flux");
        assert_eq!(
            config.predictor_columns(),
            vec!["FeedTemp", "PermeateTemp", "HotFlow", "ColdFlow", "PoreSize", "Thickness"]
        );
        assert!(config.range(Predictor::FeedTemp).contains(60.0));
        assert!(config.range(Predictor::PoreSize).contains(0.22));
    }

    #[test]
    fn range_is_inclusive() {
        let r = ValidRange::new(1.0, 2.0);
        assert!(r.contains(1.0));
        assert!(r.contains(2.0));
        assert!(!r.contains(2.000001));
        assert!(!r.contains(f64::NAN));
    }

    #[test]
    fn toml_overrides_column_and_range() {
        let text = r#"
            target = "J"

            [predictors.FeedTemp]
            column = "T_feed"
            min = 40.0

            [predictors.Thickness]
            max = 300.0
        "#;
        let config = PredictorConfig::from_toml_str(text).unwrap();
        assert_eq!(config.target(), "J");
        assert_eq!(config.column(Predictor::FeedTemp), "T_feed");
        assert_eq!(config.range(Predictor::FeedTemp), ValidRange::new(40.0, 90.0));
        assert_eq!(config.range(Predictor::Thickness), ValidRange::new(20.0, 300.0));
        assert_eq!(config.predictor_for_column("T_feed"), Some(Predictor::FeedTemp));
        assert_eq!(config.column(Predictor::HotFlow), "HotFlow");
    }

    #[test]
    fn unknown_predictor_is_rejected() {
        let err = PredictorConfig::from_toml_str("[predictors.Salinity]\nmin = 1.0\n").unwrap_err();
        assert!(matches!(err, FluxError::Config(_)));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let text = "[predictors.HotFlow]\nmin = 900.0\nmax = 100.0\n";
        match PredictorConfig::from_toml_str(text) {
            Err(FluxError::Config(msg)) => assert!(msg.contains("HotFlow")),
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn predictor_column_equal_to_target_is_rejected() {
        let text = "target = \"FeedTemp\"\n";
        match PredictorConfig::from_toml_str(text) {
            Err(FluxError::Config(msg)) => assert!(msg.contains("target")),
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn shared_column_between_predictors_is_rejected() {
        let text = "[predictors.HotFlow]\ncolumn = \"FeedTemp\"\n";
        match PredictorConfig::from_toml_str(text) {
            Err(FluxError::Config(msg)) => {
                assert!(msg.contains("FeedTemp and HotFlow"), "{msg}");
            }
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn swapping_two_column_names_is_allowed() {
        let text = r#"
            [predictors.HotFlow]
            column = "ColdFlow"

            [predictors.ColdFlow]
            column = "HotFlow"
        "#;
        let config = PredictorConfig::from_toml_str(text).unwrap();
        assert_eq!(config.predictor_for_column("HotFlow"), Some(Predictor::ColdFlow));
    }

    #[test]
    fn missing_config_file_reports_not_found() {
        let err = PredictorConfig::from_file(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, FluxError::FileNotFound(_)));
    }
}
