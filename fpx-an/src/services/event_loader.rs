//! Annotation file loading
//!
//! Events are returned in file order. Callers that need time order sort them.

use csv::StringRecord;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use super::tabular;
use crate::error::{AnalysisError, PipelineResult};
use crate::models::{ColumnMap, LabelEvent};

fn column_index(headers: &[String], name: &str) -> Option<usize> {
    let name = name.trim();
    headers.iter().position(|h| h == name)
}

/// Event time in seconds; must be finite and non-negative
fn parse_time(record: &StringRecord, idx: usize, path: &Path) -> PipelineResult<f64> {
    let value = tabular::parse_f64(record, idx, path)?;
    if !value.is_finite() || value < 0.0 {
        let line = record.position().map_or(0, |p| p.line());
        return Err(AnalysisError::source_read(
            path,
            format!("line {}: event time {} is not a finite non-negative number", line, value),
        ));
    }
    Ok(value)
}

/// Load behavioral events from an annotation file
///
/// Labels are trimmed and then renamed through `label_mapping`. Without a
/// usable stop column, or with `is_point_event` set, every event is a point
/// event.
pub fn load_events(
    path: &Path,
    column_map: &ColumnMap,
    label_mapping: &HashMap<String, String>,
) -> PipelineResult<Vec<LabelEvent>> {
    let mut reader = tabular::open(path)?;
    let headers = tabular::headers(&mut reader, path)?;

    let missing = |column: &str| AnalysisError::MissingColumn {
        column: column.to_string(),
        path: path.display().to_string(),
    };
    let behavior_idx = column_index(&headers, &column_map.behavior)
        .ok_or_else(|| missing(&column_map.behavior))?;
    let start_idx =
        column_index(&headers, &column_map.start).ok_or_else(|| missing(&column_map.start))?;
    let stop_idx = if column_map.is_point_event {
        None
    } else {
        column_map
            .stop
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .and_then(|s| column_index(&headers, s))
    };

    let mut events = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| AnalysisError::source_read(path, e))?;
        let raw = record.get(behavior_idx).unwrap_or("").trim();
        let label = label_mapping
            .get(raw)
            .cloned()
            .unwrap_or_else(|| raw.to_string());
        let start = parse_time(&record, start_idx, path)?;

        let event = match stop_idx {
            Some(idx) => LabelEvent::interval(label, start, parse_time(&record, idx, path)?),
            None => LabelEvent::point(label, start),
        };
        events.push(event);
    }

    info!(path = %path.display(), events = events.len(), "Loaded annotation events");
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column_map(stop: Option<&str>, is_point_event: bool) -> ColumnMap {
        ColumnMap {
            behavior: "Behavior".to_string(),
            start: "Start".to_string(),
            stop: stop.map(str::to_string),
            is_point_event,
        }
    }

    fn write(dir: &Path, contents: &str) -> std::path::PathBuf {
        let path = dir.join("label.csv");
        std::fs::write(&path, contents).unwrap();
        path
    }

    const BODY: &str = "Behavior,Start,Stop\n reward ,5.0,6.5\nlick,2.0,2.0\nrew,9.0,10.0\n";

    #[test]
    fn test_interval_events_in_file_order_with_mapping() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), BODY);
        let mapping = HashMap::from([("rew".to_string(), "reward".to_string())]);

        let events = load_events(&path, &column_map(Some("Stop"), false), &mapping).unwrap();
        assert_eq!(
            events,
            vec![
                LabelEvent::interval("reward", 5.0, 6.5),
                LabelEvent::interval("lick", 2.0, 2.0),
                LabelEvent::interval("reward", 9.0, 10.0),
            ]
        );
        assert!(!events[0].is_point);
        assert!(events[1].is_point);
    }

    #[test]
    fn test_point_flag_ignores_stop_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), BODY);
        let events = load_events(&path, &column_map(Some("Stop"), true), &HashMap::new()).unwrap();
        assert!(events.iter().all(|e| e.is_point && e.start_time == e.stop_time));
    }

    #[test]
    fn test_absent_stop_column_means_point_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), BODY);
        let events = load_events(&path, &column_map(Some("End"), false), &HashMap::new()).unwrap();
        assert_eq!(events[0], LabelEvent::point("reward", 5.0));
    }

    #[test]
    fn test_missing_behavior_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "Label,Start\nreward,1.0\n");
        let err = load_events(&path, &column_map(None, false), &HashMap::new()).unwrap_err();
        match err {
            AnalysisError::MissingColumn { column, .. } => assert_eq!(column, "Behavior"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_non_finite_or_negative_times_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        for body in [
            "Behavior,Start\nreward,NaN\n",
            "Behavior,Start\nreward,inf\n",
            "Behavior,Start\nreward,1.0\nreward,-3.0\n",
        ] {
            let path = write(dir.path(), body);
            let err = load_events(&path, &column_map(None, false), &HashMap::new()).unwrap_err();
            assert!(
                matches!(err, AnalysisError::SourceReadError { .. }),
                "{:?} for {:?}",
                err,
                body
            );
        }
    }

    #[test]
    fn test_negative_stop_time_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "Behavior,Start,Stop\nreward,1.0,-1.0\n");
        let err = load_events(&path, &column_map(Some("Stop"), false), &HashMap::new()).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
