//! Trial aggregation into heatmap and curve entries

use super::stats;
use crate::models::{AnalysisResult, CurveEntry, MatrixEntry, OutputOptions, TrialMatrix};

/// Column-wise mean and standard error of a trial matrix
///
/// SEM uses the population standard deviation. It is all zeros for a single
/// trial and `None` when the matrix is empty.
pub fn summarize(matrix: &TrialMatrix) -> CurveEntry {
    let n = matrix.n_trials();
    let width = matrix.x_axis.len();

    if n == 0 {
        return CurveEntry {
            key: matrix.key.clone(),
            mean: vec![0.0; width],
            sem: None,
            x_axis: matrix.x_axis.clone(),
        };
    }

    let mut mean = Vec::with_capacity(width);
    let mut sem = Vec::with_capacity(width);
    let mut column = Vec::with_capacity(n);
    for j in 0..width {
        column.clear();
        column.extend(matrix.rows.iter().map(|row| row[j]));
        let (m, s) = stats::mean_std(&column);
        mean.push(m);
        sem.push(if n > 1 { s / (n as f64).sqrt() } else { 0.0 });
    }

    CurveEntry {
        key: matrix.key.clone(),
        mean,
        sem: Some(sem),
        x_axis: matrix.x_axis.clone(),
    }
}

/// Build result entries from the algorithm output
///
/// `standardize_rows` z-scores each heatmap row before summarizing.
/// Heatmaps are only emitted when `outputs.delta_f_over_f` is set.
pub fn aggregate(
    matrices: Vec<TrialMatrix>,
    outputs: &OutputOptions,
    standardize_rows: bool,
) -> AnalysisResult {
    let mut result = AnalysisResult::default();

    for mut matrix in matrices {
        if standardize_rows {
            stats::zscore_rows(&mut matrix.rows);
        }
        result.curves.push(summarize(&matrix));
        if outputs.delta_f_over_f {
            result.matrices.push(MatrixEntry {
                key: matrix.key,
                heatmap: matrix.rows,
                x_axis: matrix.x_axis,
                trial_ids: matrix.trial_ids,
            });
        }
    }

    result
}
