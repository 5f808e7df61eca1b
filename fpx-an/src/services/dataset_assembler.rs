//! Dataset assembly
//!
//! Splits the selected files into recordings and annotations, pairs each
//! recording with its annotations through a [`PairingPolicy`] and parses
//! both into a [`Dataset`].
//!
//! A recording that fails to parse drops its whole dataset. An annotation
//! that fails to parse only drops its own events.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::{event_loader, recording_parser};
use crate::models::{AnalysisParams, DataItemRecord, Dataset};

/// Role of a selected file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRole {
    Recording,
    Annotation,
}

/// Decides which files are recordings and which annotations go with them
pub trait PairingPolicy: Send + Sync {
    fn classify(&self, item: &DataItemRecord) -> FileRole;

    /// Annotation files (among `items`) that belong to `recording`
    fn annotations_for<'a>(
        &self,
        recording: &DataItemRecord,
        items: &'a [DataItemRecord],
    ) -> Vec<&'a DataItemRecord>;
}

/// Keyword on the file name plus co-location in one directory
///
/// An explicit `data_type` overrides the keyword match: `fluorescence` is
/// always a recording, `label` and `behavior` are always annotations.
#[derive(Debug, Clone)]
pub struct DirectoryKeywordPolicy {
    keywords: Vec<String>,
}

impl DirectoryKeywordPolicy {
    pub fn new(keywords: Vec<String>) -> Self {
        Self {
            keywords: keywords.into_iter().map(|k| k.to_lowercase()).collect(),
        }
    }
}

impl Default for DirectoryKeywordPolicy {
    fn default() -> Self {
        Self::new(fpx_common::config::PairingConfig::default().annotation_keywords)
    }
}

fn parent_dir(file_path: &str) -> &Path {
    Path::new(file_path).parent().unwrap_or_else(|| Path::new(""))
}

impl PairingPolicy for DirectoryKeywordPolicy {
    fn classify(&self, item: &DataItemRecord) -> FileRole {
        match item.data_type.as_deref().map(str::to_lowercase).as_deref() {
            Some("fluorescence") => return FileRole::Recording,
            Some("label") | Some("behavior") => return FileRole::Annotation,
            _ => {}
        }
        let name = Path::new(&item.file_path)
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if self.keywords.iter().any(|k| name.contains(k.as_str())) {
            FileRole::Annotation
        } else {
            FileRole::Recording
        }
    }

    fn annotations_for<'a>(
        &self,
        recording: &DataItemRecord,
        items: &'a [DataItemRecord],
    ) -> Vec<&'a DataItemRecord> {
        let dir = parent_dir(&recording.file_path);
        items
            .iter()
            .filter(|item| item.id != recording.id)
            .filter(|item| self.classify(item) == FileRole::Annotation)
            .filter(|item| parent_dir(&item.file_path) == dir)
            .collect()
    }
}

/// Build datasets from the selected catalog entries
///
/// File paths are resolved against `uploads_dir`.
pub fn assemble_datasets(
    items: &[DataItemRecord],
    uploads_dir: &Path,
    policy: &dyn PairingPolicy,
    params: &AnalysisParams,
) -> Vec<Dataset> {
    let mut datasets = Vec::new();

    for recording in items
        .iter()
        .filter(|item| policy.classify(item) == FileRole::Recording)
    {
        let recording_file = uploads_dir.join(&recording.file_path);
        let masks = params.masks_for(recording.id);

        let channels = match recording_parser::parse_recording(&recording_file, params.sampling_rate, &masks) {
            Ok(channels) => channels,
            Err(e) => {
                warn!(
                    dataset_id = recording.id,
                    path = %recording_file.display(),
                    error = %e,
                    "Skipping dataset: recording could not be parsed"
                );
                continue;
            }
        };

        let mut events = Vec::new();
        let mut annotation_files: Vec<PathBuf> = Vec::new();
        for annotation in policy.annotations_for(recording, items) {
            let path = uploads_dir.join(&annotation.file_path);
            match event_loader::load_events(&path, &params.column_map, &params.label_mapping) {
                Ok(loaded) => events.extend(loaded),
                Err(e) => warn!(
                    dataset_id = recording.id,
                    path = %path.display(),
                    error = %e,
                    "Omitting events of unreadable annotation file"
                ),
            }
            annotation_files.push(path);
        }

        let metadata = HashMap::from([
            ("projectId".to_string(), recording.project_id.to_string()),
            ("filePath".to_string(), recording.file_path.clone()),
        ]);

        datasets.push(Dataset {
            id: recording.id,
            recording_file,
            annotation_files,
            channels,
            events,
            sampling_rate: params.sampling_rate,
            metadata,
        });
    }

    info!(
        selected = items.len(),
        datasets = datasets.len(),
        "Assembled datasets"
    );
    datasets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: i64, path: &str, data_type: Option<&str>) -> DataItemRecord {
        DataItemRecord {
            id,
            project_id: 1,
            file_path: path.to_string(),
            data_type: data_type.map(str::to_string),
        }
    }

    #[test]
    fn test_keyword_classification() {
        let policy = DirectoryKeywordPolicy::default();
        assert_eq!(policy.classify(&item(1, "m1/rec.csv", None)), FileRole::Recording);
        assert_eq!(policy.classify(&item(2, "m1/Behavior_day1.csv", None)), FileRole::Annotation);
        assert_eq!(policy.classify(&item(3, "m1/top_view.csv", None)), FileRole::Annotation);
        // directory names do not count
        assert_eq!(policy.classify(&item(4, "labels/rec.csv", None)), FileRole::Recording);
    }

    #[test]
    fn test_data_type_overrides_keywords() {
        let policy = DirectoryKeywordPolicy::default();
        assert_eq!(
            policy.classify(&item(1, "m1/label_like.csv", Some("fluorescence"))),
            FileRole::Recording
        );
        assert_eq!(
            policy.classify(&item(2, "m1/events.csv", Some("Behavior"))),
            FileRole::Annotation
        );
    }

    #[test]
    fn test_annotations_share_directory() {
        let policy = DirectoryKeywordPolicy::default();
        let items = vec![
            item(1, "m1/rec.csv", None),
            item(2, "m1/label.csv", None),
            item(3, "m2/label.csv", None),
            item(4, "m1/other_rec.csv", None),
        ];
        let found: Vec<i64> = policy
            .annotations_for(&items[0], &items)
            .iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(found, vec![2]);
    }

    #[test]
    fn test_custom_keywords() {
        let policy = DirectoryKeywordPolicy::new(vec!["EVENTS".to_string()]);
        assert_eq!(policy.classify(&item(1, "a/events.csv", None)), FileRole::Annotation);
        assert_eq!(policy.classify(&item(2, "a/label.csv", None)), FileRole::Recording);
    }
}
