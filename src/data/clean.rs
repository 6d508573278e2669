use ndarray::Array2;

use super::model::{Dataset, RawTable};
use crate::error::{FluxError, Result};

/// Restrict `table` to the predictor columns plus the target, coerce every
/// selected cell to a number and drop each row that has a missing value in
/// any selected column. Rows are removed entirely, never imputed.
///
/// Fails with [`FluxError::MissingColumn`] for the first configured column
/// that the table does not have.
pub fn clean(table: &RawTable, predictors: &[String], target: &str) -> Result<Dataset> {
    let wanted: Vec<String> = predictors
        .iter()
        .cloned()
        .chain(std::iter::once(target.to_string()))
        .collect();

    let indices = wanted
        .iter()
        .map(|name| {
            table
                .column_index(name)
                .ok_or_else(|| FluxError::MissingColumn(name.clone()))
        })
        .collect::<Result<Vec<usize>>>()?;

    let mut kept: Vec<Vec<f64>> = Vec::with_capacity(table.n_rows());
    for row in 0..table.n_rows() {
        let values: Option<Vec<f64>> = indices
            .iter()
            .map(|&col| table.cell(row, col).to_f64())
            .collect();
        if let Some(values) = values {
            kept.push(values);
        }
    }

    let dropped = table.n_rows() - kept.len();
    if dropped > 0 {
        log::warn!(
            "Dropped {dropped} of {} rows with missing or non-numeric values",
            table.n_rows()
        );
    }

    let mut values = Array2::zeros((kept.len(), wanted.len()));
    for (mut dst, src) in values.rows_mut().into_iter().zip(&kept) {
        for (d, s) in dst.iter_mut().zip(src) {
            *d = *s;
        }
    }
    Dataset::new(wanted, values)
}
