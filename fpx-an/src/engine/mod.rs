//! ΔF/F engine
//!
//! Pure CPU-bound computation over assembled datasets. Nothing here touches
//! the filesystem or the job registry; callers run it on a blocking thread.

pub mod aggregator;
pub mod stats;
pub mod warping;
pub mod zscore;

use serde_json::json;
use std::collections::HashMap;
use tracing::{info, warn};

use crate::error::{AnalysisError, PipelineResult};
use crate::models::{AlgorithmType, AnalysisMode, AnalysisParams, AnalysisResult, Dataset, TrialMatrix};

/// Stacks trial matrices by key, keeping first-seen key order
#[derive(Debug, Default)]
pub(crate) struct TrialCollector {
    order: Vec<TrialMatrix>,
    index: HashMap<String, usize>,
}

impl TrialCollector {
    pub(crate) fn extend(&mut self, matrix: TrialMatrix) {
        match self.index.get(&matrix.key) {
            Some(&i) => {
                let existing = &mut self.order[i];
                existing.rows.extend(matrix.rows);
                existing.trial_ids.extend(matrix.trial_ids);
                if existing.x_axis.is_empty() {
                    existing.x_axis = matrix.x_axis;
                }
            }
            None => {
                self.index.insert(matrix.key.clone(), self.order.len());
                self.order.push(matrix);
            }
        }
    }

    pub(crate) fn finish(self) -> Vec<TrialMatrix> {
        self.order
    }
}

/// Run the configured analysis over all datasets
///
/// Keys without trials are dropped. Fails with `NoValidTrials` only when no
/// key has any trial at all.
pub fn analyze(datasets: &[Dataset], params: &AnalysisParams) -> PipelineResult<AnalysisResult> {
    let (matrices, mut metadata) = match &params.mode {
        AnalysisMode::Single {
            events,
            baseline,
            response,
        } => {
            let matrices = zscore::single_event_matrices(datasets, events, *baseline, *response);
            let metadata = json!({
                "mode": "single",
                "algorithm": params.algorithm.as_str(),
                "events": events,
                "baselineWindow": baseline,
                "responseWindow": response,
            });
            (matrices, metadata)
        }
        AnalysisMode::Multi { groups } => {
            let matrices =
                warping::multi_event_matrices(datasets, groups, params.warp_segment_length);
            let names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
            let metadata = json!({
                "mode": "multi",
                "algorithm": params.algorithm.as_str(),
                "groups": names,
                "warpSegmentLength": params.warp_segment_length,
            });
            (matrices, metadata)
        }
    };

    if let AnalysisMode::Single { events, .. } = &params.mode {
        for dataset in datasets {
            for channel in &dataset.channels {
                for label in events {
                    let key = format!("{}/{}", channel.name, label);
                    if !matrices.iter().any(|m| m.key == key) {
                        warn!(key = %key, "Omitting key without valid trials");
                    }
                }
            }
        }
    }

    let total_trials: usize = matrices.iter().map(TrialMatrix::n_trials).sum();
    if total_trials == 0 {
        return Err(AnalysisError::NoValidTrials(format!(
            "{} analysis over {} dataset(s)",
            params.mode.name(),
            datasets.len()
        )));
    }

    let standardize_rows = matches!(params.mode, AnalysisMode::Single { .. })
        && params.outputs.zscore
        && params.algorithm != AlgorithmType::Zscore;

    info!(
        mode = params.mode.name(),
        keys = matrices.len(),
        trials = total_trials,
        "Analysis computed"
    );

    let mut result = aggregator::aggregate(matrices, &params.outputs, standardize_rows);
    if let Some(offset) = params.offset_window {
        metadata["offsetWindow"] = json!(offset);
    }
    if let serde_json::Value::Object(map) = metadata {
        result.metadata = map;
    }
    Ok(result)
}
