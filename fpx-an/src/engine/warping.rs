//! Multi-event time-warped ΔF/F
//!
//! A run is a maximal sequence of consecutive (time-sorted) events whose
//! labels all belong to a group. Each inter-event segment of a run is
//! resampled to a fixed length, so runs of different real duration share one
//! normalized axis.

use tracing::{debug, warn};

use super::stats;
use super::TrialCollector;
use crate::models::{Channel, Dataset, EventGroup, LabelEvent, TrialMatrix};

/// Maximal runs of consecutive in-group events, at least 2 events long
pub fn find_runs<'a>(sorted_events: &[&'a LabelEvent], labels: &[String]) -> Vec<Vec<&'a LabelEvent>> {
    let mut runs = Vec::new();
    let mut current: Vec<&LabelEvent> = Vec::new();

    for &event in sorted_events {
        if labels.iter().any(|l| *l == event.label) {
            current.push(event);
        } else {
            if current.len() >= 2 {
                runs.push(std::mem::take(&mut current));
            }
            current.clear();
        }
    }
    if current.len() >= 2 {
        runs.push(current);
    }
    runs
}

/// Motion-corrected signal, fitted over the first tenth of the recording
pub fn corrected_channel(channel: &Channel) -> Vec<f64> {
    let n = channel.len() / 10;
    let k = stats::correction_coefficient(&channel.reference[..n], &channel.indicator[..n]);
    stats::corrected_signal(&channel.reference, &channel.indicator, k)
}

/// Warp the corrected signal along one run
///
/// Segments that are empty, reversed or run past the end of the signal are
/// skipped. Returns `None` when no segment survives.
pub fn warp_run(signal: &[f64], run: &[&LabelEvent], fps: f64, segment_len: usize) -> Option<Vec<f64>> {
    let indices: Vec<usize> = run
        .iter()
        .map(|e| (e.start_time * fps).max(0.0) as usize)
        .collect();

    let mut warped = Vec::with_capacity(segment_len * indices.len().saturating_sub(1));
    for pair in indices.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        if start >= end || end > signal.len() {
            continue;
        }
        let segment = &signal[start..end];
        if segment.len() > 1 {
            warped.extend(stats::resample_linear(segment, segment_len));
        }
    }

    if warped.is_empty() {
        None
    } else {
        Some(warped)
    }
}

/// Normalize a warped trial by its own first fifth
pub fn normalize_warped(trial: &[f64]) -> Vec<f64> {
    let n = (trial.len() / 5).max(1).min(trial.len());
    let (mean, std) = stats::mean_std(&trial[..n]);
    stats::normalize(trial, mean, std)
}

/// Warped trials for one dataset channel and one group
fn channel_group_trials(
    dataset: &Dataset,
    channel: &Channel,
    runs: &[Vec<&LabelEvent>],
    segment_len: usize,
) -> Vec<(String, Vec<f64>)> {
    let signal = corrected_channel(channel);
    runs.iter()
        .enumerate()
        .filter_map(|(i, run)| {
            let warped = warp_run(&signal, run, dataset.sampling_rate, segment_len);
            if warped.is_none() {
                warn!(
                    dataset_id = dataset.id,
                    channel = %channel.name,
                    run = i,
                    "Run has no usable segment"
                );
            }
            warped.map(|w| (format!("{}:run_{}", dataset.id, i), normalize_warped(&w)))
        })
        .collect()
}

/// Edge-pad every row to the longest one and rebuild the `[0, 1]` axis
fn pad_matrix(matrix: &mut TrialMatrix) {
    let max_len = matrix.rows.iter().map(Vec::len).max().unwrap_or(0);
    for row in matrix.rows.iter_mut() {
        stats::edge_pad(row, max_len);
    }
    matrix.x_axis = stats::linspace(0.0, 1.0, max_len);
}

/// Multi-event analysis over every dataset, channel and group
///
/// Trials for a `<channel>/<group>` key are stacked across datasets. Groups
/// with no qualifying run anywhere are omitted.
pub fn multi_event_matrices(datasets: &[Dataset], groups: &[EventGroup], segment_len: usize) -> Vec<TrialMatrix> {
    let mut collector = TrialCollector::default();

    for group in groups {
        for dataset in datasets {
            let sorted = dataset.sorted_events();
            let runs = find_runs(&sorted, &group.events);
            if runs.is_empty() {
                debug!(dataset_id = dataset.id, group = %group.name, "No qualifying runs");
                continue;
            }

            for channel in &dataset.channels {
                let trials = channel_group_trials(dataset, channel, &runs, segment_len);
                if trials.is_empty() {
                    continue;
                }
                let (trial_ids, rows): (Vec<String>, Vec<Vec<f64>>) = trials.into_iter().unzip();
                collector.extend(TrialMatrix {
                    key: format!("{}/{}", channel.name, group.name),
                    rows,
                    x_axis: Vec::new(),
                    trial_ids,
                });
            }
        }
    }

    let mut matrices = collector.finish();
    for matrix in matrices.iter_mut() {
        pad_matrix(matrix);
    }
    matrices
}
