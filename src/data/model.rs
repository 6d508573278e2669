use std::collections::BTreeMap;
use std::fmt;

use ndarray::{Array1, Array2, ArrayView1};

use crate::error::{FluxError, Result};

// ---------------------------------------------------------------------------
// Cell – a single raw value as read from the input file
// ---------------------------------------------------------------------------

/// A dynamically-typed cell mirroring what spreadsheet and CSV readers hand back.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Float(f64),
    Integer(i64),
    String(String),
    Bool(bool),
    Empty,
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Float(v) => write!(f, "{v}"),
            Cell::Integer(i) => write!(f, "{i}"),
            Cell::String(s) => write!(f, "{s}"),
            Cell::Bool(b) => write!(f, "{b}"),
            Cell::Empty => write!(f, "<empty>"),
        }
    }
}

impl Cell {
    /// Numeric coercion. Anything that is not a finite number (or text that
    /// parses as one) counts as missing.
    pub fn to_f64(&self) -> Option<f64> {
        let value = match self {
            Cell::Float(v) => *v,
            Cell::Integer(i) => *i as f64,
            Cell::String(s) => s.trim().parse::<f64>().ok()?,
            Cell::Bool(_) | Cell::Empty => return None,
        };
        value.is_finite().then_some(value)
    }

    /// Guess the type of a text field (CSV has no cell types).
    pub fn from_text(s: &str) -> Cell {
        let s = s.trim();
        if s.is_empty() {
            return Cell::Empty;
        }
        if let Ok(i) = s.parse::<i64>() {
            return Cell::Integer(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return Cell::Float(f);
        }
        if s == "true" || s == "false" {
            return Cell::Bool(s == "true");
        }
        Cell::String(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// RawTable – the first sheet of the input, untouched
// ---------------------------------------------------------------------------

/// Header row plus data rows exactly as read. Rows may be shorter than the
/// header; missing trailing cells are treated as [`Cell::Empty`].
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl RawTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name)
    }

    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        self.rows[row].get(col).unwrap_or(&Cell::Empty)
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }
}

// ---------------------------------------------------------------------------
// Dataset – cleaned, fully numeric
// ---------------------------------------------------------------------------

/// The cleaned dataset: named numeric columns with no missing values.
/// Stored as a dense `(n_rows, n_columns)` matrix, columns in `columns` order.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns: Vec<String>,
    values: Array2<f64>,
}

impl Dataset {
    pub fn new(columns: Vec<String>, values: Array2<f64>) -> Result<Self> {
        if columns.len() != values.ncols() {
            return Err(FluxError::LengthMismatch {
                expected: columns.len(),
                found: values.ncols(),
            });
        }
        Ok(Self { columns, values })
    }

    /// Build from column vectors of equal length.
    pub fn from_columns(columns: Vec<(String, Vec<f64>)>) -> Result<Self> {
        let n_rows = columns.first().map_or(0, |(_, v)| v.len());
        let mut values = Array2::zeros((n_rows, columns.len()));
        let mut names = Vec::with_capacity(columns.len());
        for (j, (name, col)) in columns.into_iter().enumerate() {
            if col.len() != n_rows {
                return Err(FluxError::LengthMismatch {
                    expected: n_rows,
                    found: col.len(),
                });
            }
            values.column_mut(j).assign(&Array1::from(col));
            names.push(name);
        }
        Self::new(names, values)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.values.nrows() == 0
    }

    pub fn column(&self, name: &str) -> Result<ArrayView1<'_, f64>> {
        let idx = self
            .columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| FluxError::MissingColumn(name.to_string()))?;
        Ok(self.values.column(idx))
    }

    /// One row as a name → value map.
    pub fn row(&self, i: usize) -> BTreeMap<String, f64> {
        self.columns
            .iter()
            .cloned()
            .zip(self.values.row(i).iter().copied())
            .collect()
    }

    /// Columns `names` stacked side by side, in the given order.
    pub fn select(&self, names: &[String]) -> Result<Array2<f64>> {
        let mut out = Array2::zeros((self.n_rows(), names.len()));
        for (j, name) in names.iter().enumerate() {
            out.column_mut(j).assign(&self.column(name)?);
        }
        Ok(out)
    }
}
