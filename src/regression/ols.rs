use std::collections::BTreeMap;
use std::fmt;

use ndarray::{s, Array1, Array2, Axis};
use serde::Serialize;

use super::metrics::{mean_absolute_error, mean_squared_error, r2_score};
use super::qr::pivoted_qr;
use crate::data::Dataset;
use crate::error::{FluxError, Result};

/// One estimated coefficient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Coefficient {
    pub name: String,
    pub estimate: f64,
    /// Only available when there are more observations than parameters.
    pub std_error: Option<f64>,
    pub t_stat: Option<f64>,
}

/// Goodness-of-fit on the training data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitSummary {
    pub n_obs: usize,
    /// Numeric rank of the full design matrix (intercept included).
    pub rank: usize,
    /// Mean squared residual, `SSE / n`.
    pub mse: f64,
    pub mae: f64,
    /// `sqrt(SSE / (n - p))`.
    pub rmse: Option<f64>,
    pub r_squared: f64,
    pub adj_r_squared: Option<f64>,
}

/// A fitted intercept-including linear model over the retained predictors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FittedModel {
    pub target: String,
    pub intercept: Coefficient,
    /// Retained predictors, in configured order.
    pub coefficients: Vec<Coefficient>,
    /// Predictors excluded as linearly dependent, in configured order.
    pub dropped: Vec<String>,
    pub summary: FitSummary,
}

/// Non-fatal conditions raised while fitting.
#[derive(Debug, Clone, PartialEq)]
pub enum FitWarning {
    DependentPredictorsDropped(Vec<String>),
}

impl fmt::Display for FitWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitWarning::DependentPredictorsDropped(names) => write!(
                f,
                "linearly dependent predictors dropped: {}",
                names.join(", ")
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FitOutcome {
    pub model: FittedModel,
    pub warnings: Vec<FitWarning>,
}

/// `[1, x₁, …, x_k]` for every row.
fn design_matrix(x: &Array2<f64>) -> Array2<f64> {
    let (n, k) = x.dim();
    let mut design = Array2::ones((n, k + 1));
    design.slice_mut(s![.., 1..]).assign(x);
    design
}

/// Fit `target ~ 1 + predictors` by ordinary least squares.
///
/// Predictors that are linearly dependent on the intercept and the other
/// predictors (as judged by a pivoted QR of the design matrix) are dropped
/// and reported through [`FitWarning::DependentPredictorsDropped`].
pub fn fit(dataset: &Dataset, predictors: &[String], target: &str) -> Result<FitOutcome> {
    if dataset.is_empty() {
        return Err(FluxError::EmptyDataset);
    }
    let x = dataset.select(predictors)?;
    let y = dataset.column(target)?.to_owned();
    let n = x.nrows();

    // Rank detection on the full design.
    let design = design_matrix(&x);
    let qr = pivoted_qr(design.view(), 1);
    let independent = qr.independent_columns();
    log::debug!(
        "Design {}x{}: rank {} (tolerance {:.3e}), pivot {:?}",
        design.nrows(),
        design.ncols(),
        independent.len(),
        qr.rank_tolerance(),
        qr.pivot()
    );

    let retained: Vec<usize> = independent
        .iter()
        .filter(|&&c| c != 0)
        .map(|&c| c - 1)
        .collect();
    if retained.is_empty() {
        return Err(FluxError::NoIndependentPredictors);
    }

    let dropped: Vec<String> = (0..predictors.len())
        .filter(|i| !retained.contains(i))
        .map(|i| predictors[i].clone())
        .collect();
    let mut warnings = Vec::new();
    if !dropped.is_empty() {
        let warning = FitWarning::DependentPredictorsDropped(dropped.clone());
        log::warn!("{warning}");
        warnings.push(warning);
    }

    // Solve on the reduced, full-rank design.
    let columns: Vec<usize> = std::iter::once(0)
        .chain(retained.iter().map(|&i| i + 1))
        .collect();
    let reduced = design.select(Axis(1), &columns);
    let p = reduced.ncols();
    let reduced_qr = pivoted_qr(reduced.view(), p);
    let beta = reduced_qr
        .solve(y.view())
        .ok_or(FluxError::NoIndependentPredictors)?;

    let mut model = FittedModel {
        target: target.to_string(),
        intercept: Coefficient {
            name: "(Intercept)".to_string(),
            estimate: beta[0],
            std_error: None,
            t_stat: None,
        },
        coefficients: retained
            .iter()
            .zip(beta.iter().skip(1))
            .map(|(&i, &b)| Coefficient {
                name: predictors[i].clone(),
                estimate: b,
                std_error: None,
                t_stat: None,
            })
            .collect(),
        dropped,
        summary: FitSummary {
            n_obs: n,
            rank: independent.len(),
            mse: 0.0,
            mae: 0.0,
            rmse: None,
            r_squared: 0.0,
            adj_r_squared: None,
        },
    };

    // Training diagnostics use the same evaluation path as `predict`.
    let fitted: Array1<f64> = reduced
        .rows()
        .into_iter()
        .map(|row| model.evaluate(row.iter().skip(1).copied()))
        .collect();
    let mse = mean_squared_error(y.view(), fitted.view())?;
    let r2 = r2_score(y.view(), fitted.view())?;
    model.summary.mse = mse;
    model.summary.mae = mean_absolute_error(y.view(), fitted.view())?;
    model.summary.r_squared = r2;

    if n > p {
        let dfe = (n - p) as f64;
        let sigma2 = mse * n as f64 / dfe;
        model.summary.rmse = Some(sigma2.sqrt());
        model.summary.adj_r_squared = Some(1.0 - (1.0 - r2) * (n - 1) as f64 / dfe);

        if let Some(unscaled) = reduced_qr.unscaled_variances() {
            let all = std::iter::once(&mut model.intercept).chain(model.coefficients.iter_mut());
            for (coef, v) in all.zip(unscaled.iter()) {
                let se = (sigma2 * v).sqrt();
                coef.std_error = Some(se);
                coef.t_stat = (se > 0.0).then(|| coef.estimate / se);
            }
        }
    }

    log::info!(
        "Fitted {} ~ {} predictors on {} rows: R² = {:.4}, MSE = {:.4e}",
        target,
        model.coefficients.len(),
        n,
        r2,
        mse
    );

    Ok(FitOutcome { model, warnings })
}

impl FittedModel {
    /// `intercept + Σ coefficient_i * value_i` with values in coefficient order.
    fn evaluate(&self, values: impl Iterator<Item = f64>) -> f64 {
        self.coefficients
            .iter()
            .zip(values)
            .fold(self.intercept.estimate, |acc, (c, v)| acc + c.estimate * v)
    }

    /// Point prediction. `inputs` must supply exactly the retained predictors.
    pub fn predict(&self, inputs: &BTreeMap<String, f64>) -> Result<f64> {
        if let Some(extra) = inputs.keys().find(|k| self.coefficient(k).is_none()) {
            return Err(FluxError::UnexpectedInput(extra.clone()));
        }
        let values = self
            .coefficients
            .iter()
            .map(|c| {
                inputs
                    .get(&c.name)
                    .copied()
                    .ok_or_else(|| FluxError::MissingInput(c.name.clone()))
            })
            .collect::<Result<Vec<f64>>>()?;
        Ok(self.evaluate(values.into_iter()))
    }

    /// Predict every row of `dataset`, which must contain the retained columns.
    pub fn predict_many(&self, dataset: &Dataset) -> Result<Array1<f64>> {
        let x = dataset.select(&self.retained())?;
        Ok(x.rows()
            .into_iter()
            .map(|row| self.evaluate(row.iter().copied()))
            .collect())
    }

    pub fn coefficient(&self, name: &str) -> Option<f64> {
        self.coefficients
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.estimate)
    }

    pub fn retained(&self) -> Vec<String> {
        self.coefficients.iter().map(|c| c.name.clone()).collect()
    }
}

impl fmt::Display for FittedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Linear regression model: {} ~ 1 + {}", self.target, self.retained().join(" + "))?;
        writeln!(f, "{:<16} {:>14} {:>12} {:>10}", "", "Estimate", "SE", "tStat")?;
        for c in std::iter::once(&self.intercept).chain(&self.coefficients) {
            let se = c.std_error.map_or_else(|| "-".to_string(), |v| format!("{v:.6}"));
            let t = c.t_stat.map_or_else(|| "-".to_string(), |v| format!("{v:.3}"));
            writeln!(f, "{:<16} {:>14.6} {:>12} {:>10}", c.name, c.estimate, se, t)?;
        }
        if !self.dropped.is_empty() {
            writeln!(f, "Dropped (dependent): {}", self.dropped.join(", "))?;
        }
        let s = &self.summary;
        write!(f, "Observations: {}, R² = {:.4}, MSE = {:.6}", s.n_obs, s.r_squared, s.mse)?;
        if let (Some(rmse), Some(adj)) = (s.rmse, s.adj_r_squared) {
            write!(f, ", RMSE = {rmse:.6}, adjusted R² = {adj:.4}")?;
        }
        Ok(())
    }
}
