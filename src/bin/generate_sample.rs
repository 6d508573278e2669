//! Writes a synthetic membrane-distillation dataset as CSV and Parquet.
//!
//! Flux follows a vapour-pressure-driven model (Antoine equation for water)
//! scaled by membrane permeability and a flow-dependent polarization factor,
//! with Gaussian measurement noise. A few cells are left blank so the
//! missing-row handling has something to do.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, Int64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use clap::Parser;
use flux_predict::config::{Predictor, TARGET_COLUMN};
use parquet::arrow::ArrowWriter;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Parser, Debug)]
#[command(name = "generate_sample", about = "Write a synthetic flux dataset")]
struct Args {
    /// Output path without extension; `.csv` and `.parquet` are appended
    #[arg(default_value = "sample_data")]
    output: PathBuf,

    /// Number of experimental runs
    #[arg(long, default_value_t = 120)]
    rows: usize,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Fraction of rows with one blank cell
    #[arg(long, default_value_t = 0.05)]
    missing: f64,
}

/// Saturated vapour pressure of water in Pa.
fn psat(t_celsius: f64) -> f64 {
    (23.1964 - 3816.44 / (t_celsius + 273.15 - 46.13)).exp()
}

fn flux(run: &[f64; 6]) -> f64 {
    let [feed, perm, hot, cold, pore, thick] = *run;
    let permeability = 2.2e-3 * (pore / 0.22).sqrt() * (200.0 / thick);
    let polarization = (hot / (hot + 300.0)) * (cold / (cold + 600.0)).powf(0.3);
    permeability * polarization * (psat(feed) - psat(perm))
}

/// Box-Muller transform for normal distribution
fn gauss(rng: &mut StdRng, mean: f64, std_dev: f64) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(1e-15);
    let u2: f64 = rng.gen();
    let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    mean + std_dev * z
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let mut rng = StdRng::seed_from_u64(args.seed);

    let mut columns: Vec<Vec<Option<f64>>> =
        (0..7).map(|_| Vec::with_capacity(args.rows)).collect();
    for _ in 0..args.rows {
        let mut run = [0.0; 6];
        for (slot, predictor) in run.iter_mut().zip(Predictor::ALL) {
            let range = predictor.default_range();
            *slot = rng.gen_range(range.min..=range.max);
        }
        // Keep the permeate side colder than the feed.
        run[1] = run[1].min(run[0] - 10.0);
        for v in &mut run[4..] {
            *v = (*v * 100.0).round() / 100.0;
        }

        let measured = flux(&run) * (1.0 + gauss(&mut rng, 0.0, 0.03));

        let blank = rng.gen_bool(args.missing.clamp(0.0, 1.0));
        let blank_col = rng.gen_range(0..7);
        for (j, col) in columns.iter_mut().enumerate() {
            let value = if j < 6 { run[j] } else { measured };
            col.push((!(blank && j == blank_col)).then_some(value));
        }
    }

    let names: Vec<&str> = Predictor::ALL
        .iter()
        .map(|p| p.key())
        .chain(std::iter::once(TARGET_COLUMN))
        .collect();

    // CSV
    let csv_path = args.output.with_extension("csv");
    let mut writer = csv::Writer::from_path(&csv_path)
        .with_context(|| format!("creating {}", csv_path.display()))?;
    writer.write_record(["Run"].iter().chain(names.iter()))?;
    for i in 0..args.rows {
        let mut record = vec![(i + 1).to_string()];
        record.extend(
            columns
                .iter()
                .map(|c| c[i].map_or_else(String::new, |v| format!("{v:.4}"))),
        );
        writer.write_record(&record)?;
    }
    writer.flush()?;

    // Parquet
    let mut fields = vec![Field::new("Run", DataType::Int64, false)];
    fields.extend(names.iter().map(|n| Field::new(*n, DataType::Float64, true)));
    let schema = Arc::new(Schema::new(fields));

    let mut arrays: Vec<ArrayRef> = vec![Arc::new(Int64Array::from_iter_values(
        (1..=args.rows).map(|i| i as i64),
    ))];
    arrays.extend(
        columns
            .iter()
            .map(|c| Arc::new(Float64Array::from(c.clone())) as ArrayRef),
    );
    let batch = RecordBatch::try_new(schema.clone(), arrays).context("building record batch")?;

    let parquet_path = args.output.with_extension("parquet");
    let file = std::fs::File::create(&parquet_path)
        .with_context(|| format!("creating {}", parquet_path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;

    println!(
        "Wrote {} runs to {} and {}",
        args.rows,
        csv_path.display(),
        parquet_path.display()
    );
    Ok(())
}
