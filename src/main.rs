use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use flux_predict::{OperatingPoint, PredictorConfig, Session};

/// Fit a flux model from a dataset and optionally predict one operating point.
#[derive(Parser, Debug)]
#[command(name = "flux-predict", version, about)]
struct Args {
    /// Dataset file (.xlsx, .xls, .ods, .csv, .parquet or .json)
    #[arg(short, long)]
    data: PathBuf,

    /// TOML file overriding column names and accepted input ranges
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Feed temperature
    #[arg(long)]
    feed_temp: Option<f64>,

    /// Cold (permeate) temperature
    #[arg(long)]
    permeate_temp: Option<f64>,

    /// Hot flow rate
    #[arg(long)]
    hot_flow: Option<f64>,

    /// Cold flow rate
    #[arg(long)]
    cold_flow: Option<f64>,

    /// Membrane pore size
    #[arg(long)]
    pore_size: Option<f64>,

    /// Membrane thickness
    #[arg(long)]
    thickness: Option<f64>,

    /// Print the fitted model (and prediction) as JSON
    #[arg(long)]
    json: bool,
}

impl Args {
    fn operating_point(&self) -> Option<OperatingPoint> {
        Some(OperatingPoint {
            feed_temp: self.feed_temp?,
            permeate_temp: self.permeate_temp?,
            hot_flow: self.hot_flow?,
            cold_flow: self.cold_flow?,
            pore_size: self.pore_size?,
            thickness: self.thickness?,
        })
    }

    fn any_operating_value(&self) -> bool {
        [
            self.feed_temp,
            self.permeate_temp,
            self.hot_flow,
            self.cold_flow,
            self.pore_size,
            self.thickness,
        ]
        .iter()
        .any(Option::is_some)
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => PredictorConfig::from_file(path)
            .with_context(|| format!("reading configuration {}", path.display()))?,
        None => PredictorConfig::default(),
    };

    let mut session = Session::new(config);
    let warnings = session
        .reload(&args.data)
        .with_context(|| format!("training on {}", args.data.display()))?;
    for w in &warnings {
        eprintln!("warning: {w}");
    }
    let model = session.model().context("no model after training")?;

    let point = args.operating_point();
    if point.is_none() && args.any_operating_value() {
        log::warn!("Prediction skipped: all six operating values are required");
    }
    let prediction = point
        .map(|p| session.predict(&p).context("predicting flux"))
        .transpose()?;

    if args.json {
        let report = serde_json::json!({
            "model": model,
            "prediction": prediction,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{model}");
    if let (Some(flux), Some(p)) = (prediction, point) {
        println!();
        for entry in session.config().entries() {
            println!(
                "  {:<28} {:>10} {}",
                entry.predictor.label(),
                p.get(entry.predictor),
                entry.predictor.unit()
            );
        }
        println!("Predicted {}: {flux:.4}", session.config().target());
    }
    Ok(())
}
