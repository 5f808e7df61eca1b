//! Recording-side data model
//!
//! A [`Dataset`] is rebuilt from source files on every analysis run and is
//! never persisted on its own.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// One physical sensor channel
///
/// `reference` is the motion/isosbestic wavelength, `indicator` the
/// activity-dependent one. Both are sampled at the dataset rate.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    /// Display name, e.g. "CH1"
    pub name: String,
    pub reference: Vec<f64>,
    pub indicator: Vec<f64>,
}

impl Channel {
    /// Build a channel, rejecting signals of unequal length
    pub fn new(name: impl Into<String>, reference: Vec<f64>, indicator: Vec<f64>) -> Option<Self> {
        if reference.len() != indicator.len() {
            return None;
        }
        Some(Self {
            name: name.into(),
            reference,
            indicator,
        })
    }

    /// Number of samples in each signal
    pub fn len(&self) -> usize {
        self.reference.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reference.is_empty()
    }
}

/// Behavioral annotation
///
/// Times are seconds from recording start. Point events have
/// `start_time == stop_time`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEvent {
    pub label: String,
    pub start_time: f64,
    pub stop_time: f64,
    pub is_point: bool,
}

impl LabelEvent {
    pub fn point(label: impl Into<String>, time: f64) -> Self {
        Self {
            label: label.into(),
            start_time: time,
            stop_time: time,
            is_point: true,
        }
    }

    pub fn interval(label: impl Into<String>, start_time: f64, stop_time: f64) -> Self {
        Self {
            label: label.into(),
            start_time,
            stop_time,
            is_point: start_time == stop_time,
        }
    }
}

/// Catalog entry for one uploaded file
///
/// `file_path` is relative to the uploads directory. `data_type` is an
/// optional explicit role hint ("fluorescence", "label", "behavior").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataItemRecord {
    pub id: i64,
    pub project_id: i64,
    pub file_path: String,
    #[serde(default)]
    pub data_type: Option<String>,
}

/// One recording plus its merged annotation events
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Catalog id of the recording file
    pub id: i64,
    pub recording_file: PathBuf,
    pub annotation_files: Vec<PathBuf>,
    pub channels: Vec<Channel>,
    pub events: Vec<LabelEvent>,
    pub sampling_rate: f64,
    pub metadata: HashMap<String, String>,
}

impl Dataset {
    /// Events ordered by start time (stable for equal times)
    pub fn sorted_events(&self) -> Vec<&LabelEvent> {
        let mut events: Vec<&LabelEvent> = self.events.iter().collect();
        events.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        events
    }
}
