//! Single-event z-score ΔF/F
//!
//! Every trial spans the combined window `[min(baseline.start,
//! response.start), max(baseline.end, response.end)]` around one event.
//! Motion correction is fitted on the baseline samples and applied to the
//! whole recording, then the window is normalized by the baseline statistics.

use tracing::{debug, warn};

use super::stats;
use super::TrialCollector;
use crate::error::{AnalysisError, PipelineResult};
use crate::models::{Channel, Dataset, TimeWindow, TrialMatrix};

/// One normalized trial
#[derive(Debug, Clone, PartialEq)]
pub struct ZscoreTrial {
    pub values: Vec<f64>,
    /// Seconds relative to the event
    pub x_axis: Vec<f64>,
}

/// Sample offset of a window edge relative to the event sample
fn offset_samples(seconds: f64, fps: f64) -> i64 {
    (seconds * fps) as i64
}

/// Clamp a `[start, end)` index range to `[0, len]`
fn clamp_range(start: i64, end: i64, len: usize) -> (usize, usize) {
    let len = len as i64;
    (start.clamp(0, len) as usize, end.clamp(0, len) as usize)
}

/// Compute one z-scored trial around `event_time`
///
/// Fails with `InvalidWindow` when the baseline collapses after clamping or
/// the combined window does not lie entirely inside the recording.
pub fn zscore_trial(
    channel: &Channel,
    fps: f64,
    event_time: f64,
    baseline: TimeWindow,
    response: TimeWindow,
) -> PipelineResult<ZscoreTrial> {
    let len = channel.len();
    let event_idx = (event_time * fps) as i64;

    let window = TimeWindow::new(
        baseline.start.min(response.start),
        baseline.end.max(response.end),
    );

    let (b0, b1) = clamp_range(
        event_idx + offset_samples(baseline.start, fps),
        event_idx + offset_samples(baseline.end, fps),
        len,
    );
    let raw_w0 = event_idx + offset_samples(window.start, fps);
    let raw_w1 = event_idx + offset_samples(window.end, fps);
    let (w0, w1) = clamp_range(raw_w0, raw_w1, len);

    if b0 >= b1 {
        return Err(AnalysisError::InvalidWindow(format!(
            "baseline collapsed to zero width at t={}s",
            event_time
        )));
    }
    if w0 >= w1 {
        return Err(AnalysisError::InvalidWindow(format!(
            "window collapsed to zero width at t={}s",
            event_time
        )));
    }
    if w0 as i64 != raw_w0 || w1 as i64 != raw_w1 {
        return Err(AnalysisError::InvalidWindow(format!(
            "window truncated at recording edge at t={}s",
            event_time
        )));
    }

    let k = stats::correction_coefficient(
        &channel.reference[b0..b1],
        &channel.indicator[b0..b1],
    );
    let corrected = stats::corrected_signal(&channel.reference, &channel.indicator, k);

    let (mean, std) = stats::mean_std(&corrected[b0..b1]);
    let values = stats::normalize(&corrected[w0..w1], mean, std);
    let x_axis = (0..values.len())
        .map(|i| i as f64 / fps + window.start)
        .collect();

    Ok(ZscoreTrial { values, x_axis })
}

/// All trials for one channel and one label within a dataset
///
/// Trials are numbered by position among the matching events in file order.
/// Events whose window is invalid are skipped.
pub fn channel_event_matrix(
    dataset: &Dataset,
    channel: &Channel,
    label: &str,
    baseline: TimeWindow,
    response: TimeWindow,
) -> PipelineResult<TrialMatrix> {
    let key = format!("{}/{}", channel.name, label);
    let mut rows = Vec::new();
    let mut trial_ids = Vec::new();
    let mut x_axis = Vec::new();

    let matching = dataset.events.iter().filter(|e| e.label == label);
    for (i, event) in matching.enumerate() {
        match zscore_trial(channel, dataset.sampling_rate, event.start_time, baseline, response) {
            Ok(trial) => {
                if x_axis.is_empty() {
                    x_axis = trial.x_axis;
                }
                rows.push(trial.values);
                trial_ids.push(format!("{}:trial_{}_{}", dataset.id, i, event.label));
            }
            Err(e) => {
                warn!(
                    dataset_id = dataset.id,
                    key = %key,
                    event_time = event.start_time,
                    error = %e,
                    "Skipping trial"
                );
            }
        }
    }

    if rows.is_empty() {
        return Err(AnalysisError::NoValidTrials(format!(
            "{} in dataset {}",
            key, dataset.id
        )));
    }

    Ok(TrialMatrix {
        key,
        rows,
        x_axis,
        trial_ids,
    })
}

/// Single-event analysis over every dataset, channel and requested label
///
/// Trials sharing a `<channel>/<label>` key are stacked across datasets.
/// Keys with no valid trial anywhere are omitted.
pub fn single_event_matrices(
    datasets: &[Dataset],
    events: &[String],
    baseline: TimeWindow,
    response: TimeWindow,
) -> Vec<TrialMatrix> {
    let mut collector = TrialCollector::default();

    for dataset in datasets {
        for channel in &dataset.channels {
            for label in events {
                match channel_event_matrix(dataset, channel, label, baseline, response) {
                    Ok(matrix) => collector.extend(matrix),
                    Err(e) => debug!(dataset_id = dataset.id, error = %e, "No trials"),
                }
            }
        }
    }

    collector.finish()
}
