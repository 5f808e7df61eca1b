//! First-rows preview of an uploaded data file

use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use super::tabular::delimiter_for;
use crate::error::{AnalysisError, PipelineResult};

pub const DEFAULT_PREVIEW_ROWS: usize = 50;
pub const MAX_PREVIEW_ROWS: usize = 100;

/// Header plus the first rows of a file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    /// Number of rows returned
    pub total_rows: usize,
}

/// Empty → null, integer/float → number, anything else → trimmed string
fn convert_cell(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    let trimmed = raw.trim();
    if !trimmed.contains('.') {
        if let Ok(i) = trimmed.parse::<i64>() {
            return Value::from(i);
        }
    }
    match trimmed.parse::<f64>() {
        Ok(f) if f.is_finite() => Value::from(f),
        _ => Value::String(trimmed.to_string()),
    }
}

/// Read the header and up to `max_rows` rows (clamped to 1..=100)
///
/// Invalid UTF-8 is replaced rather than rejected. Rows may have differing
/// lengths.
pub fn preview_file(path: &Path, max_rows: usize) -> PipelineResult<PreviewTable> {
    let max_rows = max_rows.clamp(1, MAX_PREVIEW_ROWS);
    let file = std::fs::File::open(path).map_err(|e| AnalysisError::source_read(path, e))?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter_for(path))
        .from_reader(file);

    let columns: Vec<String> = reader
        .byte_headers()
        .map_err(|e| AnalysisError::source_read(path, e))?
        .iter()
        .map(|h| String::from_utf8_lossy(h).into_owned())
        .collect();
    if columns.is_empty() {
        return Err(AnalysisError::source_read(path, "file has no header"));
    }

    let mut rows = Vec::new();
    for record in reader.byte_records().take(max_rows) {
        let record = record.map_err(|e| AnalysisError::source_read(path, e))?;
        rows.push(
            record
                .iter()
                .map(|cell| convert_cell(&String::from_utf8_lossy(cell)))
                .collect(),
        );
    }

    Ok(PreviewTable {
        columns,
        total_rows: rows.len(),
        rows,
    })
}
