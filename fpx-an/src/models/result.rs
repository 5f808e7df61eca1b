//! Analysis result schema
//!
//! Invariants: every matrix has one trial id per heatmap row, every curve
//! vector has the length of its x axis.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stacked trials for one `<channel>/<event-or-group>` key
///
/// Produced by the ΔF/F algorithms and consumed by the trial aggregator.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialMatrix {
    pub key: String,
    pub rows: Vec<Vec<f64>>,
    pub x_axis: Vec<f64>,
    pub trial_ids: Vec<String>,
}

impl TrialMatrix {
    pub fn n_trials(&self) -> usize {
        self.rows.len()
    }
}

/// Heatmap entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixEntry {
    pub key: String,
    pub heatmap: Vec<Vec<f64>>,
    pub x_axis: Vec<f64>,
    pub trial_ids: Vec<String>,
}

/// Mean curve with standard error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurveEntry {
    pub key: String,
    pub mean: Vec<f64>,
    /// Absent when there are no trials
    pub sem: Option<Vec<f64>>,
    pub x_axis: Vec<f64>,
}

/// Engine output before it is wrapped with job metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub matrices: Vec<MatrixEntry>,
    pub curves: Vec<CurveEntry>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl AnalysisResult {
    /// Check the row-count and vector-length invariants
    pub fn is_consistent(&self) -> bool {
        let matrices_ok = self.matrices.iter().all(|m| {
            m.heatmap.len() == m.trial_ids.len()
                && m.heatmap.iter().all(|row| row.len() == m.x_axis.len())
        });
        let curves_ok = self.curves.iter().all(|c| {
            c.mean.len() == c.x_axis.len()
                && c.sem.as_ref().map_or(true, |s| s.len() == c.x_axis.len())
        });
        matrices_ok && curves_ok
    }

    pub fn matrix(&self, key: &str) -> Option<&MatrixEntry> {
        self.matrices.iter().find(|m| m.key == key)
    }

    pub fn curve(&self, key: &str) -> Option<&CurveEntry> {
        self.curves.iter().find(|c| c.key == key)
    }
}

/// Result metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMeta {
    pub project_id: i64,
    pub sampling_rate_hz: f64,
    pub mode: String,
    /// Submitted request, verbatim
    pub params: serde_json::Value,
    pub tags_used: Vec<i64>,
    pub dataset_count: usize,
    /// Algorithm-level details (windows, groups, segment length)
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub analysis: serde_json::Map<String, serde_json::Value>,
}

/// Final job result as persisted and served
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultResponse {
    pub job_id: Uuid,
    pub meta: ResultMeta,
    pub matrices: Vec<MatrixEntry>,
    pub curves: Vec<CurveEntry>,
}
