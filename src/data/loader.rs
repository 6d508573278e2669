use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array, LargeStringArray,
    StringArray,
};
use calamine::{open_workbook_auto, Data, Reader};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::clean::clean;
use super::model::{Cell, Dataset, RawTable};
use crate::config::PredictorConfig;
use crate::error::{FluxError, Result};

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Load and clean a dataset for the configured predictors and target.
pub fn load_dataset(path: &Path, config: &PredictorConfig) -> Result<Dataset> {
    let table = load_table(path)?;
    let dataset = clean(&table, &config.predictor_columns(), config.target())?;
    log::info!(
        "Loaded {} clean rows ({} raw) from {}",
        dataset.n_rows(),
        table.n_rows(),
        path.display()
    );
    Ok(dataset)
}

/// Read the raw table from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.xlsx` / `.xlsm` / `.xlsb` / `.xls` / `.ods` – first sheet, first row is the header
/// * `.csv`     – header row, one record per line
/// * `.parquet` – flat numeric or string columns
/// * `.json`    – `[{ "FeedTemp": 60.0, ..., "Flux": 12.3 }, ...]`
pub fn load_table(path: &Path) -> Result<RawTable> {
    if !path.exists() {
        return Err(FluxError::FileNotFound(path.to_path_buf()));
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let table = match ext.as_str() {
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => load_spreadsheet(path)?,
        "csv" => load_csv(path)?,
        "parquet" | "pq" => load_parquet(path)?,
        "json" => load_json(path)?,
        other => return Err(FluxError::UnsupportedFormat(other.to_string())),
    };
    log::debug!(
        "{}: {} columns x {} rows",
        path.display(),
        table.headers.len(),
        table.n_rows()
    );
    Ok(table)
}

// ---------------------------------------------------------------------------
// Spreadsheet loader
// ---------------------------------------------------------------------------

fn load_spreadsheet(path: &Path) -> Result<RawTable> {
    let mut workbook = open_workbook_auto(path).map_err(|e| FluxError::unreadable(path, e))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| FluxError::unreadable(path, "workbook has no sheets"))?
        .map_err(|e| FluxError::unreadable(path, e))?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .map(|header| header.iter().map(|c| c.to_string().trim().to_string()).collect())
        .unwrap_or_default();
    let rows = rows
        .map(|row| row.iter().map(sheet_cell).collect())
        .collect();

    Ok(RawTable { headers, rows })
}

fn sheet_cell(data: &Data) -> Cell {
    match data {
        Data::Float(f) => Cell::Float(*f),
        Data::Int(i) => Cell::Integer(*i),
        Data::String(s) => Cell::String(s.clone()),
        Data::Bool(b) => Cell::Bool(*b),
        // dates, durations and #N/A-style error cells
        _ => Cell::Empty,
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

fn load_csv(path: &Path) -> Result<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| FluxError::unreadable(path, e))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| FluxError::unreadable(path, e))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for (row_no, result) in reader.records().enumerate() {
        let record =
            result.map_err(|e| FluxError::unreadable(path, format!("CSV row {row_no}: {e}")))?;
        rows.push(record.iter().map(Cell::from_text).collect());
    }

    Ok(RawTable { headers, rows })
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Records-oriented JSON, the default `df.to_json(orient='records')`.
/// The header is the union of keys in first-seen order.
fn load_json(path: &Path) -> Result<RawTable> {
    let text = std::fs::read_to_string(path).map_err(|e| FluxError::unreadable(path, e))?;
    let root: JsonValue = serde_json::from_str(&text).map_err(|e| FluxError::unreadable(path, e))?;

    let records = root
        .as_array()
        .ok_or_else(|| FluxError::unreadable(path, "expected top-level JSON array"))?;

    let mut headers: Vec<String> = Vec::new();
    for (i, rec) in records.iter().enumerate() {
        let obj = rec
            .as_object()
            .ok_or_else(|| FluxError::unreadable(path, format!("row {i} is not a JSON object")))?;
        for key in obj.keys() {
            if !headers.contains(key) {
                headers.push(key.clone());
            }
        }
    }

    let rows = records
        .iter()
        .filter_map(|rec| rec.as_object())
        .map(|obj| {
            headers
                .iter()
                .map(|h| obj.get(h).map_or(Cell::Empty, json_cell))
                .collect()
        })
        .collect();

    Ok(RawTable { headers, rows })
}

fn json_cell(val: &JsonValue) -> Cell {
    match val {
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Cell::Integer(i)
            } else if let Some(f) = n.as_f64() {
                Cell::Float(f)
            } else {
                Cell::String(n.to_string())
            }
        }
        JsonValue::String(s) => Cell::String(s.clone()),
        JsonValue::Bool(b) => Cell::Bool(*b),
        JsonValue::Null => Cell::Empty,
        other => Cell::String(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a flat Parquet table. Works with files written by both **Pandas**
/// (`df.to_parquet()`) and **Polars** (`df.write_parquet()`).
fn load_parquet(path: &Path) -> Result<RawTable> {
    let file = std::fs::File::open(path).map_err(|e| FluxError::unreadable(path, e))?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| FluxError::unreadable(path, e))?;
    let headers: Vec<String> = builder
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let reader = builder.build().map_err(|e| FluxError::unreadable(path, e))?;

    let mut rows = Vec::new();
    for batch_result in reader {
        let batch = batch_result.map_err(|e| FluxError::unreadable(path, e))?;
        for row in 0..batch.num_rows() {
            rows.push(
                batch
                    .columns()
                    .iter()
                    .map(|col| arrow_cell(col, row))
                    .collect(),
            );
        }
    }

    Ok(RawTable { headers, rows })
}

/// Extract a single cell from an Arrow column at a given row.
fn arrow_cell(col: &Arc<dyn Array>, row: usize) -> Cell {
    if col.is_null(row) {
        return Cell::Empty;
    }
    let any = col.as_any();
    if let Some(arr) = any.downcast_ref::<Float64Array>() {
        Cell::Float(arr.value(row))
    } else if let Some(arr) = any.downcast_ref::<Float32Array>() {
        Cell::Float(arr.value(row) as f64)
    } else if let Some(arr) = any.downcast_ref::<Int64Array>() {
        Cell::Integer(arr.value(row))
    } else if let Some(arr) = any.downcast_ref::<Int32Array>() {
        Cell::Integer(arr.value(row) as i64)
    } else if let Some(arr) = any.downcast_ref::<StringArray>() {
        Cell::String(arr.value(row).to_string())
    } else if let Some(arr) = any.downcast_ref::<LargeStringArray>() {
        Cell::String(arr.value(row).to_string())
    } else if let Some(arr) = any.downcast_ref::<BooleanArray>() {
        Cell::Bool(arr.value(row))
    } else {
        log::debug!("Unsupported Arrow type {:?}, treating as missing", col.data_type());
        Cell::Empty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use arrow::datatypes::{DataType, Field, Schema};
    use arrow::record_batch::RecordBatch;
    use parquet::arrow::ArrowWriter;
    use tempfile::NamedTempFile;

    fn temp_with_suffix(suffix: &str, content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        write!(file, "{content}").unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn csv_rows_are_typed_and_ragged_rows_allowed() {
        let file = temp_with_suffix(".csv", "A, B ,Flux\n1,2.5,10\n3,,11\n4\n");
        let table = load_table(file.path()).unwrap();
        assert_eq!(table.headers, vec!["A", "B", "Flux"]);
        assert_eq!(table.n_rows(), 3);
        assert_eq!(table.cell(0, 1), &Cell::Float(2.5));
        assert_eq!(table.cell(1, 1), &Cell::Empty);
        assert_eq!(table.cell(2, 2), &Cell::Empty);
    }

    #[test]
    fn json_records_union_keys() {
        let file = temp_with_suffix(
            ".json",
            r#"[{"A": 1, "Flux": 2.5}, {"A": 2, "B": "x", "Flux": null}]"#,
        );
        let table = load_table(file.path()).unwrap();
        assert_eq!(table.headers, vec!["A", "Flux", "B"]);
        assert_eq!(table.cell(0, 2), &Cell::Empty);
        assert_eq!(table.cell(1, 1), &Cell::Empty);
        assert_eq!(table.cell(1, 2), &Cell::String("x".into()));
    }

    #[test]
    fn parquet_flat_columns() {
        let schema = Arc::new(Schema::new(vec![
            Field::new("FeedTemp", DataType::Float64, true),
            Field::new("Run", DataType::Int64, false),
            Field::new("Flux", DataType::Float64, true),
        ]));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(Float64Array::from(vec![Some(60.0), None])),
                Arc::new(Int64Array::from(vec![1, 2])),
                Arc::new(Float64Array::from(vec![Some(12.5), Some(13.0)])),
            ],
        )
        .unwrap();

        let file = tempfile::Builder::new().suffix(".parquet").tempfile().unwrap();
        let mut writer = ArrowWriter::try_new(file.reopen().unwrap(), schema, None).unwrap();
        writer.write(&batch).unwrap();
        writer.close().unwrap();

        let table = load_table(file.path()).unwrap();
        assert_eq!(table.headers, vec!["FeedTemp", "Run", "Flux"]);
        assert_eq!(table.cell(0, 0), &Cell::Float(60.0));
        assert_eq!(table.cell(1, 0), &Cell::Empty);
        assert_eq!(table.cell(1, 1), &Cell::Integer(2));
    }

    #[test]
    fn missing_file_is_file_not_found() {
        let err = load_table(Path::new("/no/such/dataset.xlsx")).unwrap_err();
        assert!(matches!(err, FluxError::FileNotFound(_)));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let file = temp_with_suffix(".txt", "A\n1\n");
        let err = load_table(file.path()).unwrap_err();
        assert!(matches!(err, FluxError::UnsupportedFormat(ext) if ext == "txt"));
    }

    /// Five runs on the first sheet, HotFlow blank in the third; a second
    /// sheet with unrelated headers that must be ignored.
    fn write_workbook() -> NamedTempFile {
        let file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
        let mut workbook = rust_xlsxwriter::Workbook::new();

        let runs = workbook.add_worksheet();
        let headers = [
            "FeedTemp",
            "PermeateTemp",
            "HotFlow",
            "ColdFlow",
            "PoreSize",
            "Thickness",
            "Flux",
        ];
        for (col, h) in headers.iter().enumerate() {
            runs.write_string(0, col as u16, *h).unwrap();
        }
        for row in 1..=5u32 {
            let r = row as f64;
            let values = [50.0 + r, 20.0, 400.0 + 50.0 * r, 600.0, 0.22, 200.0, 10.0 + r];
            for (col, v) in values.iter().enumerate() {
                if row == 3 && col == 2 {
                    continue;
                }
                runs.write_number(row, col as u16, *v).unwrap();
            }
        }

        let notes = workbook.add_worksheet();
        notes.write_string(0, 0, "Comment").unwrap();
        notes.write_string(1, 0, "calibrated 2024-03").unwrap();

        workbook.save(file.path()).unwrap();
        file
    }

    #[test]
    fn spreadsheet_first_sheet_header_and_cells() {
        let file = write_workbook();
        let table = load_table(file.path()).unwrap();
        assert_eq!(
            table.headers,
            vec!["FeedTemp", "PermeateTemp", "HotFlow", "ColdFlow", "PoreSize", "Thickness", "Flux"]
        );
        assert_eq!(table.n_rows(), 5);
        assert_eq!(table.cell(0, 0), &Cell::Float(51.0));
        assert_eq!(table.cell(0, 4), &Cell::Float(0.22));
        assert_eq!(table.cell(2, 2), &Cell::Empty);
        assert_eq!(table.cell(4, 6), &Cell::Float(15.0));
    }

    #[test]
    fn spreadsheet_blank_cell_drops_its_row() {
        let file = write_workbook();
        let ds = load_dataset(file.path(), &PredictorConfig::default()).unwrap();
        assert_eq!(ds.n_rows(), 4);
        assert_eq!(
            ds.column("HotFlow").unwrap().to_vec(),
            vec![450.0, 500.0, 600.0, 650.0]
        );
    }

    #[test]
    fn corrupt_spreadsheet_is_unreadable() {
        let file = temp_with_suffix(".xlsx", "this is not a zip archive");
        let err = load_table(file.path()).unwrap_err();
        assert!(matches!(err, FluxError::FileUnreadable { .. }));
    }

    #[test]
    fn load_dataset_applies_configuration() {
        let config = PredictorConfig::default();
        let mut content = String::from(
            "FeedTemp,PermeateTemp,HotFlow,ColdFlow,PoreSize,Thickness,Flux,Operator\n",
        );
        content.push_str("60,20,600,600,0.22,200,15.1,ana\n");
        content.push_str("65,20,,600,0.22,200,16.0,ana\n");
        content.push_str("70,25,700,650,0.45,150,18.2,\n");
        let file = temp_with_suffix(".csv", &content);

        let ds = load_dataset(file.path(), &config).unwrap();
        assert_eq!(ds.n_rows(), 2);
        assert_eq!(ds.columns().len(), 7);
        assert_eq!(ds.column("Flux").unwrap().to_vec(), vec![15.1, 18.2]);
    }
}
