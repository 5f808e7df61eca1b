//! Numeric helpers shared by the ΔF/F algorithms

/// Standard deviations at or below this are treated as zero
pub const STD_EPSILON: f64 = 1e-10;

/// Slope of the first-degree least-squares fit of `y` onto `x`
///
/// Returns `None` for fewer than 2 points or a constant `x`.
pub fn linear_fit_slope(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    let x = &x[..n];
    let y = &y[..n];
    let mean_x = mean(x);
    let mean_y = mean(y);

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (xi, yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        sxy += dx * (yi - mean_y);
        sxx += dx * dx;
    }
    if sxx <= f64::EPSILON * n as f64 {
        return None;
    }
    Some(sxy / sxx)
}

/// Motion-correction coefficient: fitted slope, or 1.0 when undetermined
pub fn correction_coefficient(reference: &[f64], indicator: &[f64]) -> f64 {
    linear_fit_slope(reference, indicator).unwrap_or(1.0)
}

/// `indicator - k * reference` over the whole signal
pub fn corrected_signal(reference: &[f64], indicator: &[f64], k: f64) -> Vec<f64> {
    indicator
        .iter()
        .zip(reference)
        .map(|(i, r)| i - k * r)
        .collect()
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Mean and population standard deviation
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    let m = mean(values);
    if values.is_empty() {
        return (m, 0.0);
    }
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64;
    (m, var.sqrt())
}

/// Subtract `mean`, and divide by `std` unless it is near zero
pub fn normalize(values: &[f64], mean: f64, std: f64) -> Vec<f64> {
    if std > STD_EPSILON {
        values.iter().map(|v| (v - mean) / std).collect()
    } else {
        values.iter().map(|v| v - mean).collect()
    }
}

/// `n` evenly spaced points over `[start, end]`
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { end } else { start + step * i as f64 })
                .collect()
        }
    }
}

/// Linear resampling of `segment` onto `target_len` points
///
/// Both axes are normalized to `[0, 1]`, so the first and last samples are
/// preserved exactly.
pub fn resample_linear(segment: &[f64], target_len: usize) -> Vec<f64> {
    match segment.len() {
        0 => return Vec::new(),
        1 => return vec![segment[0]; target_len],
        _ => {}
    }
    let last = segment.len() - 1;
    linspace(0.0, 1.0, target_len)
        .into_iter()
        .map(|t| {
            let pos = t * last as f64;
            let lo = (pos.floor() as usize).min(last);
            let hi = (lo + 1).min(last);
            let frac = pos - lo as f64;
            segment[lo] + (segment[hi] - segment[lo]) * frac
        })
        .collect()
}

/// Extend `values` to `len` by repeating its last element
pub fn edge_pad(values: &mut Vec<f64>, len: usize) {
    if let Some(&last) = values.last() {
        values.resize(len.max(values.len()), last);
    }
}

/// Row-wise standardisation: `(row - mean) / (std + 1e-10)`
pub fn zscore_rows(rows: &mut [Vec<f64>]) {
    for row in rows.iter_mut() {
        let (m, s) = mean_std(row);
        for v in row.iter_mut() {
            *v = (*v - m) / (s + STD_EPSILON);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_slope_of_exact_line() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y: Vec<f64> = x.iter().map(|v| 2.5 * v + 7.0).collect();
        assert!(approx(linear_fit_slope(&x, &y).unwrap(), 2.5));
    }

    #[test]
    fn test_slope_undetermined() {
        assert!(linear_fit_slope(&[1.0], &[2.0]).is_none());
        assert!(linear_fit_slope(&[3.0, 3.0, 3.0], &[1.0, 2.0, 3.0]).is_none());
        assert_eq!(correction_coefficient(&[3.0, 3.0], &[1.0, 2.0]), 1.0);
    }

    #[test]
    fn test_mean_std_is_population() {
        let (m, s) = mean_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!(approx(m, 5.0));
        assert!(approx(s, 2.0));
    }

    #[test]
    fn test_normalize_falls_back_without_division() {
        assert_eq!(normalize(&[3.0, 5.0], 1.0, 0.0), vec![2.0, 4.0]);
        assert_eq!(normalize(&[3.0, 5.0], 1.0, 1e-12), vec![2.0, 4.0]);
        assert_eq!(normalize(&[3.0, 5.0], 1.0, 2.0), vec![1.0, 2.0]);
    }

    #[test]
    fn test_linspace_endpoints() {
        let v = linspace(0.0, 1.0, 5);
        assert_eq!(v, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(linspace(0.0, 1.0, 1), vec![0.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
    }

    #[test]
    fn test_resample_preserves_endpoints() {
        let segment = [4.0, -1.0, 3.5, 8.0, 2.0, 6.5, -3.0];
        let up = resample_linear(&segment, 100);
        assert_eq!(up.len(), 100);
        assert_eq!(up[0], segment[0]);
        assert_eq!(up[99], segment[6]);

        // nearest-neighbour check against the original samples
        for (j, original) in segment.iter().enumerate() {
            let nearest = (j as f64 * 99.0 / 6.0).round() as usize;
            assert!((up[nearest] - original).abs() < 0.5);
        }

        let back = resample_linear(&up, segment.len());
        assert_eq!(back[0], segment[0]);
        assert_eq!(back[6], segment[6]);
    }

    #[test]
    fn test_resample_linear_ramp_stays_linear() {
        let ramp: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let out = resample_linear(&ramp, 19);
        for (i, v) in out.iter().enumerate() {
            assert!(approx(*v, i as f64 * 0.5));
        }
    }

    #[test]
    fn test_edge_pad_repeats_last() {
        let mut v = vec![1.0, 2.0];
        edge_pad(&mut v, 4);
        assert_eq!(v, vec![1.0, 2.0, 2.0, 2.0]);
        edge_pad(&mut v, 2);
        assert_eq!(v.len(), 4);
    }

    #[test]
    fn test_zscore_rows() {
        let mut rows = vec![vec![1.0, 3.0], vec![5.0, 5.0]];
        zscore_rows(&mut rows);
        assert!(approx(rows[0][0], -1.0));
        assert!(approx(rows[0][1], 1.0));
        assert_eq!(rows[1], vec![0.0, 0.0]);
    }
}
