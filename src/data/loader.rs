use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, AsArray, Float32Array, Float64Array, LargeListArray, ListArray};
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use crate::config::NormalizeConfig;
use crate::error::{Result, SpectraError};

use super::jcamp;
use super::model::{SpectralDataset, SpectralRecord};
use super::normalize::{normalize_parsed, normalize_record};

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load and normalize every spectrum in a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.jdx` / `.dx` / `.jcamp` – JCAMP-DX text
/// * `.json`    – one record `{ "name", "dataPoints": [[x, y], ...], "unitsX", ... }`
///                or an array of them (Markdown fences around it are tolerated)
/// * `.csv`     – first column x, every further column one spectrum
/// * `.parquet` – rows with `x` and `y` list columns, optional `name`,
///                `type`, `unitsX`, `unitsY` string columns
///
/// A file yields either all of its datasets or an error; nothing partial.
pub fn load_file(path: &Path, config: &NormalizeConfig) -> Result<Vec<SpectralDataset>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let datasets = match ext.as_str() {
        "jdx" | "dx" | "jcamp" => load_jcamp(path, config)?,
        "json" => load_json(path, config)?,
        "csv" => load_csv(path, config)?,
        "parquet" | "pq" => load_parquet(path, config)?,
        other => {
            return Err(SpectraError::UnsupportedFormat(format!(
                "{}: .{other}",
                path.display()
            )))
        }
    };

    log::info!("Loaded {} dataset(s) from {}", datasets.len(), path.display());
    Ok(datasets)
}

// ---------------------------------------------------------------------------
// JCAMP-DX loader
// ---------------------------------------------------------------------------

fn load_jcamp(path: &Path, config: &NormalizeConfig) -> Result<Vec<SpectralDataset>> {
    let bytes = std::fs::read(path)?;
    let parsed = jcamp::parse_bytes(&bytes)?;
    let mut dataset = normalize_parsed(parsed, config)?;
    if dataset.metadata.title.is_none() {
        dataset.name = file_stem(path);
    }
    Ok(vec![dataset])
}

// ---------------------------------------------------------------------------
// JSON records
// ---------------------------------------------------------------------------

fn load_json(path: &Path, config: &NormalizeConfig) -> Result<Vec<SpectralDataset>> {
    let text = std::fs::read_to_string(path)?;
    parse_record_text(&text)?
        .iter()
        .map(|record| normalize_record(record, config))
        .collect()
}

/// Recover spectral records from a service response.
///
/// Tries, in order: the whole text, the first fenced code block, the
/// outermost `{ ... }` slice. Accepts a single object or an array.
pub fn parse_record_text(text: &str) -> Result<Vec<SpectralRecord>> {
    let value = serde_json::from_str::<JsonValue>(text.trim())
        .ok()
        .or_else(|| fenced_block(text).and_then(|b| serde_json::from_str(b).ok()))
        .or_else(|| brace_slice(text).and_then(|b| serde_json::from_str(b).ok()))
        .ok_or_else(|| SpectraError::MalformedInput("no JSON record found in response".into()))?;

    let records = match value {
        JsonValue::Array(items) => items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<SpectralRecord>, _>>(),
        other => serde_json::from_value(other).map(|r| vec![r]),
    }
    .map_err(|e| SpectraError::MalformedInput(format!("invalid spectral record: {e}")))?;

    if records.is_empty() {
        return Err(SpectraError::EmptyResult("response holds no records".into()));
    }
    Ok(records)
}

/// Body of the first ```` ``` ```` fence, language tag dropped.
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")? + 3;
    let rest = &text[start..];
    let body_start = rest.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &rest[body_start..];
    let end = body.find("```")?;
    Some(body[..end].trim())
}

fn brace_slice(text: &str) -> Option<&str> {
    let first = text.find('{')?;
    let last = text.rfind('}')?;
    (last > first).then(|| &text[first..=last])
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

/// CSV layout:  optional header row, then numeric rows.
/// Column 0 is the x axis; its header picks the unit ("Wavelength (nm)",
/// "Wavenumber (cm-1)", ...), microns otherwise. Each further column is one
/// spectrum named by its header; empty cells are gaps. Intensities are taken
/// as absorbance-like values, which is what this crate's own export writes.
fn load_csv(path: &Path, config: &NormalizeConfig) -> Result<Vec<SpectralDataset>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut headers: Option<Vec<String>> = None;
    let mut columns: Vec<Vec<[f64; 2]>> = Vec::new();

    for (row_no, result) in reader.records().enumerate() {
        let record = result?;
        let Some(x) = record.get(0).and_then(|s| s.parse::<f64>().ok()) else {
            if row_no == 0 {
                headers = Some(record.iter().map(|h| h.to_string()).collect());
            } else {
                log::debug!("CSV row {row_no}: non-numeric x, skipped");
            }
            continue;
        };

        for (col_idx, cell) in record.iter().enumerate().skip(1) {
            if columns.len() < col_idx {
                columns.resize_with(col_idx, Vec::new);
            }
            if let Ok(y) = cell.parse::<f64>() {
                columns[col_idx - 1].push([x, y]);
            }
        }
    }

    if columns.is_empty() {
        return Err(SpectraError::EmptyResult(format!(
            "{}: no numeric columns",
            path.display()
        )));
    }

    let stem = file_stem(path);
    let units_x = headers
        .as_ref()
        .and_then(|h| h.first().cloned())
        .unwrap_or_default();

    columns
        .into_iter()
        .enumerate()
        .map(|(i, data_points)| {
            let name = headers
                .as_ref()
                .and_then(|h| h.get(i + 1))
                .filter(|h| !h.is_empty())
                .cloned()
                .unwrap_or_else(|| {
                    if i == 0 {
                        stem.clone()
                    } else {
                        format!("{stem} [{}]", i + 1)
                    }
                });
            let record = SpectralRecord {
                name,
                data_points,
                units_x: units_x.clone(),
                ..Default::default()
            };
            normalize_record(&record, config)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet file of tuple records, one spectrum per row.
///
/// Expected schema:
/// - `x`: List<Float64|Float32> or LargeList – wavelength values
/// - `y`: List<Float64|Float32> or LargeList – intensity values
/// - optional string columns `name`, `type`, `unitsX`, `unitsY`
fn load_parquet(path: &Path, config: &NormalizeConfig) -> Result<Vec<SpectralDataset>> {
    let file = std::fs::File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let stem = file_stem(path);
    let mut datasets = Vec::new();

    for batch_result in reader {
        let batch = batch_result?;
        let schema = batch.schema();

        let x_idx = schema
            .index_of("x")
            .map_err(|_| SpectraError::Parquet("missing 'x' column".into()))?;
        let y_idx = schema
            .index_of("y")
            .map_err(|_| SpectraError::Parquet("missing 'y' column".into()))?;

        let x_col = batch.column(x_idx);
        let y_col = batch.column(y_idx);
        let text_col = |name: &str| schema.index_of(name).ok().map(|i| batch.column(i));
        let name_col = text_col("name");
        let type_col = text_col("type");
        let units_x_col = text_col("unitsX");
        let units_y_col = text_col("unitsY");

        for row in 0..batch.num_rows() {
            let x = extract_f64_list(x_col, row)?;
            let y = extract_f64_list(y_col, row)?;
            if x.len() != y.len() {
                return Err(SpectraError::MalformedInput(format!(
                    "row {row}: x has {} values but y has {}",
                    x.len(),
                    y.len()
                )));
            }

            let record = SpectralRecord {
                name: name_col
                    .and_then(|c| extract_string(c, row))
                    .unwrap_or_else(|| format!("{stem} #{}", datasets.len() + 1)),
                category: type_col.and_then(|c| extract_string(c, row)).unwrap_or_default(),
                data_points: x.into_iter().zip(y).map(|(x, y)| [x, y]).collect(),
                units_x: units_x_col.and_then(|c| extract_string(c, row)).unwrap_or_default(),
                units_y: units_y_col.and_then(|c| extract_string(c, row)).unwrap_or_default(),
                ..Default::default()
            };
            datasets.push(normalize_record(&record, config)?);
        }
    }

    if datasets.is_empty() {
        return Err(SpectraError::EmptyResult(format!(
            "{}: no rows",
            path.display()
        )));
    }
    Ok(datasets)
}

// -- Parquet / Arrow helpers --

/// Extract a `Vec<f64>` from a List or LargeList column at the given row.
fn extract_f64_list(col: &Arc<dyn Array>, row: usize) -> Result<Vec<f64>> {
    if col.is_null(row) {
        return Err(SpectraError::Parquet(format!("row {row}: null list")));
    }

    let values_array = match col.data_type() {
        DataType::List(_) => col
            .as_any()
            .downcast_ref::<ListArray>()
            .map(|a| a.value(row)),
        DataType::LargeList(_) => col
            .as_any()
            .downcast_ref::<LargeListArray>()
            .map(|a| a.value(row)),
        other => {
            return Err(SpectraError::Parquet(format!(
                "expected List or LargeList column, got {other:?}"
            )))
        }
    }
    .ok_or_else(|| SpectraError::Parquet("list column downcast failed".into()))?;

    // Nulls inside a list become NaN and are dropped by the normalizer.
    if let Some(f64_arr) = values_array.as_any().downcast_ref::<Float64Array>() {
        Ok(f64_arr.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
    } else if let Some(f32_arr) = values_array.as_any().downcast_ref::<Float32Array>() {
        Ok(f32_arr.iter().map(|v| v.map_or(f64::NAN, f64::from)).collect())
    } else {
        Err(SpectraError::Parquet(format!(
            "list inner type is {:?}, expected Float64 or Float32",
            values_array.data_type()
        )))
    }
}

/// Extract a string cell; non-string columns and nulls give `None`.
fn extract_string(col: &Arc<dyn Array>, row: usize) -> Option<String> {
    if col.is_null(row) {
        return None;
    }
    match col.data_type() {
        DataType::Utf8 => Some(col.as_string::<i32>().value(row).to_string()),
        DataType::LargeUtf8 => Some(col.as_string::<i64>().value(row).to_string()),
        _ => None,
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("spectrum")
        .to_string()
}
