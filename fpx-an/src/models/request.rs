//! Analysis request and validated parameters
//!
//! [`AnalyzeRequest`] is the wire shape clients submit. It is validated once,
//! before any job exists, into a [`Selection`] plus [`AnalysisParams`], where
//! the single/multi distinction is carried by the [`AnalysisMode`] sum type.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{AnalysisError, PipelineResult};

/// Default resampled length of one inter-event segment
pub const DEFAULT_WARP_SEGMENT_LENGTH: usize = 100;

/// Time window relative to an event, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: f64,
    pub end: f64,
}

impl TimeWindow {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    fn validate(&self, name: &str) -> PipelineResult<()> {
        if !self.start.is_finite() || !self.end.is_finite() || self.start >= self.end {
            return Err(AnalysisError::InvalidRequest(format!(
                "{} must satisfy start < end (got {} .. {})",
                name, self.start, self.end
            )));
        }
        Ok(())
    }
}

/// Sample range to drop from a recording, in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaskRange {
    pub start: f64,
    pub end: f64,
}

/// Requested event, either a bare label or `{label, displayName}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventSpec {
    Label(String),
    Detailed {
        label: String,
        #[serde(default, rename = "displayName")]
        display_name: Option<String>,
    },
}

impl EventSpec {
    pub fn label(&self) -> &str {
        match self {
            EventSpec::Label(label) => label,
            EventSpec::Detailed { label, .. } => label,
        }
    }
}

/// Named set of event labels for multi-event alignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventGroup {
    #[serde(alias = "groupName")]
    pub name: String,
    pub events: Vec<String>,
}

/// Annotation column mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMap {
    pub behavior: String,
    pub start: String,
    #[serde(default)]
    pub stop: Option<String>,
    #[serde(default)]
    pub is_point_event: bool,
}

/// AND/OR tag predicate
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagFilter {
    #[serde(rename = "and", default)]
    pub and_tags: Vec<i64>,
    #[serde(rename = "or", default)]
    pub or_tags: Vec<i64>,
}

impl TagFilter {
    pub fn is_empty(&self) -> bool {
        self.and_tags.is_empty() && self.or_tags.is_empty()
    }

    /// Union of both lists, ascending and deduplicated
    pub fn tags_used(&self) -> Vec<i64> {
        let mut tags: Vec<i64> = self
            .and_tags
            .iter()
            .chain(self.or_tags.iter())
            .copied()
            .collect();
        tags.sort_unstable();
        tags.dedup();
        tags
    }
}

/// Client dataset selection as submitted
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSelection {
    #[serde(default)]
    pub data_item_ids: Option<Vec<i64>>,
    #[serde(default)]
    pub tag_filter: Option<TagFilter>,
}

/// Validated, non-trivial selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Ids(Vec<i64>),
    Tags(TagFilter),
}

impl Selection {
    pub fn tags_used(&self) -> Vec<i64> {
        match self {
            Selection::Ids(_) => Vec::new(),
            Selection::Tags(filter) => filter.tags_used(),
        }
    }
}

impl DataSelection {
    /// Explicit ids win; otherwise a tag filter with at least one tag
    pub fn validate(&self) -> PipelineResult<Selection> {
        if let Some(ids) = &self.data_item_ids {
            if !ids.is_empty() {
                return Ok(Selection::Ids(ids.clone()));
            }
        }
        match &self.tag_filter {
            Some(filter) if !filter.is_empty() => Ok(Selection::Tags(filter.clone())),
            _ => Err(AnalysisError::SelectionInvalid(
                "must provide non-empty dataItemIds or a tagFilter with at least one tag"
                    .to_string(),
            )),
        }
    }
}

/// Output toggles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputOptions {
    /// Emit heatmap matrices
    #[serde(rename = "deltaFOverF", alias = "df_f", default = "default_true")]
    pub delta_f_over_f: bool,
    /// Standardise each heatmap row (single mode, non-zscore algorithm)
    #[serde(default)]
    pub zscore: bool,
    #[serde(default)]
    pub warping: bool,
}

fn default_true() -> bool {
    true
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            delta_f_over_f: true,
            zscore: false,
            warping: false,
        }
    }
}

/// Requested analysis mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestMode {
    Single,
    Multi,
}

/// ΔF/F algorithm label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlgorithmType {
    #[default]
    Zscore,
    Warping,
}

impl AlgorithmType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlgorithmType::Zscore => "zscore",
            AlgorithmType::Warping => "warping",
        }
    }
}

/// Job submission body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub selection: DataSelection,
    #[serde(alias = "fps", default = "default_sampling_rate")]
    pub sampling_rate_hz: f64,
    pub mode: RequestMode,
    #[serde(alias = "algorithmType", default)]
    pub algorithm: AlgorithmType,
    #[serde(default)]
    pub events: Option<Vec<EventSpec>>,
    #[serde(default)]
    pub baseline_window: Option<TimeWindow>,
    #[serde(default)]
    pub response_window: Option<TimeWindow>,
    #[serde(default)]
    pub groups: Option<Vec<EventGroup>>,
    #[serde(default)]
    pub offset_window: Option<TimeWindow>,
    #[serde(default)]
    pub outputs: OutputOptions,
    pub column_map: ColumnMap,
    #[serde(default)]
    pub label_mapping: HashMap<String, String>,
    /// Keyed by `"<dataItemId>"` or `"<dataItemId>:<channel>"`
    #[serde(default)]
    pub masks: HashMap<String, Vec<MaskRange>>,
    #[serde(default)]
    pub warp_segment_length: Option<usize>,
}

fn default_sampling_rate() -> f64 {
    50.0
}

/// Mode-specific parameters
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisMode {
    /// Per-event windows around each listed label
    Single {
        events: Vec<String>,
        baseline: TimeWindow,
        response: TimeWindow,
    },
    /// Runs of consecutive group events, time-warped
    Multi { groups: Vec<EventGroup> },
}

impl AnalysisMode {
    pub fn name(&self) -> &'static str {
        match self {
            AnalysisMode::Single { .. } => "single",
            AnalysisMode::Multi { .. } => "multi",
        }
    }
}

/// Validated analysis parameters
#[derive(Debug, Clone)]
pub struct AnalysisParams {
    pub sampling_rate: f64,
    pub algorithm: AlgorithmType,
    pub mode: AnalysisMode,
    pub offset_window: Option<TimeWindow>,
    pub outputs: OutputOptions,
    pub column_map: ColumnMap,
    pub label_mapping: HashMap<String, String>,
    pub masks: HashMap<String, Vec<MaskRange>>,
    pub warp_segment_length: usize,
}

impl AnalysisParams {
    /// Mask ranges (seconds) that apply to one recording
    pub fn masks_for(&self, data_item_id: i64) -> Vec<(f64, f64)> {
        let id = data_item_id.to_string();
        let prefix = format!("{}:", id);
        let mut keys: Vec<&String> = self
            .masks
            .keys()
            .filter(|k| **k == id || k.starts_with(&prefix))
            .collect();
        keys.sort();
        keys.into_iter()
            .flat_map(|k| self.masks[k].iter().map(|m| (m.start, m.end)))
            .collect()
    }
}

impl AnalyzeRequest {
    /// Validate the request into a selection and typed parameters
    pub fn validate(&self) -> PipelineResult<(Selection, AnalysisParams)> {
        let selection = self.selection.validate()?;

        if !self.sampling_rate_hz.is_finite() || self.sampling_rate_hz <= 0.0 {
            return Err(AnalysisError::InvalidRequest(format!(
                "samplingRateHz must be positive (got {})",
                self.sampling_rate_hz
            )));
        }

        if self.column_map.behavior.trim().is_empty() || self.column_map.start.trim().is_empty() {
            return Err(AnalysisError::InvalidRequest(
                "columnMap must include behavior and start fields".to_string(),
            ));
        }

        let mode = match self.mode {
            RequestMode::Single => {
                let events: Vec<String> = self
                    .events
                    .as_deref()
                    .unwrap_or_default()
                    .iter()
                    .map(|e| e.label().to_string())
                    .filter(|l| !l.is_empty())
                    .collect();
                let (baseline, response) = match (self.baseline_window, self.response_window) {
                    (Some(b), Some(r)) if !events.is_empty() => (b, r),
                    _ => {
                        return Err(AnalysisError::InvalidRequest(
                            "single mode requires events, baselineWindow and responseWindow"
                                .to_string(),
                        ))
                    }
                };
                baseline.validate("baselineWindow")?;
                response.validate("responseWindow")?;
                AnalysisMode::Single {
                    events,
                    baseline,
                    response,
                }
            }
            RequestMode::Multi => {
                let groups = self.groups.clone().unwrap_or_default();
                if groups.is_empty() {
                    return Err(AnalysisError::InvalidRequest(
                        "multi mode requires at least one group".to_string(),
                    ));
                }
                if let Some(g) = groups.iter().find(|g| g.events.is_empty()) {
                    return Err(AnalysisError::InvalidRequest(format!(
                        "group '{}' has no events",
                        g.name
                    )));
                }
                AnalysisMode::Multi { groups }
            }
        };

        if let Some(offset) = &self.offset_window {
            offset.validate("offsetWindow")?;
        }

        let warp_segment_length = self
            .warp_segment_length
            .unwrap_or(DEFAULT_WARP_SEGMENT_LENGTH);
        if warp_segment_length < 2 {
            return Err(AnalysisError::InvalidRequest(
                "warpSegmentLength must be at least 2".to_string(),
            ));
        }

        let params = AnalysisParams {
            sampling_rate: self.sampling_rate_hz,
            algorithm: self.algorithm,
            mode,
            offset_window: self.offset_window,
            outputs: self.outputs,
            column_map: self.column_map.clone(),
            label_mapping: self.label_mapping.clone(),
            masks: self.masks.clone(),
            warp_segment_length,
        };

        Ok((selection, params))
    }
}
