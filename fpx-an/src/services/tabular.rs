//! Delimited text readers shared by the recording, annotation and preview paths

use csv::{Reader, ReaderBuilder, StringRecord};
use std::fs::File;
use std::path::Path;

use crate::error::{AnalysisError, PipelineResult};

/// Field delimiter for a file: tab for `.tsv`, comma otherwise
pub fn delimiter_for(path: &Path) -> u8 {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => b'\t',
        _ => b',',
    }
}

/// Open a headed delimited file
pub fn open(path: &Path) -> PipelineResult<Reader<File>> {
    let file = File::open(path).map_err(|e| AnalysisError::source_read(path, e))?;
    Ok(ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter_for(path))
        .trim(csv::Trim::Headers)
        .from_reader(file))
}

/// Header names, trimmed
pub fn headers(reader: &mut Reader<File>, path: &Path) -> PipelineResult<Vec<String>> {
    let headers = reader
        .headers()
        .map_err(|e| AnalysisError::source_read(path, e))?;
    Ok(headers.iter().map(|h| h.trim().to_string()).collect())
}

/// Parse one cell as a float
pub fn parse_f64(record: &StringRecord, idx: usize, path: &Path) -> PipelineResult<f64> {
    let raw = record.get(idx).unwrap_or("").trim();
    raw.parse::<f64>().map_err(|_| {
        let line = record.position().map_or(0, |p| p.line());
        AnalysisError::source_read(path, format!("line {}: '{}' is not a number", line, raw))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delimiter_by_extension() {
        assert_eq!(delimiter_for(Path::new("a/b.tsv")), b'\t');
        assert_eq!(delimiter_for(Path::new("a/b.TSV")), b'\t');
        assert_eq!(delimiter_for(Path::new("a/b.csv")), b',');
        assert_eq!(delimiter_for(Path::new("a/b")), b',');
    }

    #[test]
    fn test_missing_file_is_source_read_error() {
        let err = open(Path::new("/nonexistent/fpx/recording.csv")).unwrap_err();
        assert!(matches!(err, AnalysisError::SourceReadError { .. }));
    }
}
