/// LOWESS trend smoothing for display.
///
/// Locally weighted linear regression with tricube weights and no robustness
/// iterations. The regression x-axis is the sample *position* of each valid
/// value, not wall-clock time. Null positions stay null, so the output has
/// the same length and null pattern as the input.
///
/// For every valid point the `k = ⌊fraction·n⌋` (at least 2) nearest valid
/// points form the neighbourhood; the bandwidth is the distance to the
/// farthest of them. Smoothed output is never fed back into alarm logic.

pub fn smooth(values: &[Option<f64>], fraction: f64) -> Vec<Option<f64>> {
    let (xs, ys): (Vec<f64>, Vec<f64>) = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|y| (i as f64, y)))
        .unzip();

    if xs.len() < 2 {
        return values.to_vec();
    }

    let fitted = lowess(&xs, &ys, fraction);
    let mut result = vec![None; values.len()];
    for (x, y) in xs.iter().zip(fitted) {
        result[*x as usize] = Some(y);
    }
    result
}

/// LOWESS fit at every `x` (sorted ascending) without robustness iterations.
fn lowess(xs: &[f64], ys: &[f64], fraction: f64) -> Vec<f64> {
    let n = xs.len();
    let k = ((fraction * n as f64 + 1e-10) as usize).clamp(2, n);

    let mut left = 0;
    let mut fitted = Vec::with_capacity(n);
    for i in 0..n {
        let x = xs[i];
        // slide the k-wide window right while that brings it closer to x
        while left + k < n && x - xs[left] > xs[left + k] - x {
            left += 1;
        }
        let right = left + k - 1;
        let radius = (x - xs[left]).max(xs[right] - x);
        fitted.push(local_fit(&xs[left..=right], &ys[left..=right], x, radius, ys[i]));
    }
    fitted
}

fn local_fit(xs: &[f64], ys: &[f64], x: f64, radius: f64, fallback: f64) -> f64 {
    if radius <= 0.0 {
        return fallback;
    }

    let weights: Vec<f64> = xs.iter().map(|xj| tricube((xj - x).abs() / radius)).collect();
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return fallback;
    }

    let x_mean = weights.iter().zip(xs).map(|(w, xj)| w * xj).sum::<f64>() / total;
    let y_mean = weights.iter().zip(ys).map(|(w, yj)| w * yj).sum::<f64>() / total;

    let (mut cov, mut var) = (0.0, 0.0);
    for ((w, xj), yj) in weights.iter().zip(xs).zip(ys) {
        cov += w * (xj - x_mean) * (yj - y_mean);
        var += w * (xj - x_mean).powi(2);
    }

    // Degenerate spread (only one point carries weight): weighted mean.
    if var <= 1e-12 * total {
        return y_mean;
    }
    y_mean + cov / var * (x - x_mean)
}

fn tricube(u: f64) -> f64 {
    if u >= 1.0 {
        0.0
    } else {
        (1.0 - u.powi(3)).powi(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_all_close(actual: &[Option<f64>], expected: &[Option<f64>]) {
        assert_eq!(actual.len(), expected.len());
        for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
            match (a, e) {
                (Some(a), Some(e)) => assert!((a - e).abs() < 1e-9, "index {}: {} vs {}", i, a, e),
                (None, None) => {}
                _ => panic!("null pattern differs at index {}: {:?} vs {:?}", i, a, e),
            }
        }
    }

    #[test]
    fn test_all_null_input_is_unchanged() {
        assert_eq!(smooth(&[None, None, None], 0.1), vec![None, None, None]);
    }

    #[test]
    fn test_fewer_than_two_points_is_unchanged() {
        assert_eq!(smooth(&[None, Some(4.0)], 0.5), vec![None, Some(4.0)]);
        assert!(smooth(&[], 0.1).is_empty());
    }

    #[test]
    fn test_straight_line_is_reproduced_exactly() {
        let line: Vec<Option<f64>> = (0..50).map(|i| Some(2.0 * i as f64 - 7.0)).collect();
        assert_all_close(&smooth(&line, 0.3), &line);
    }

    #[test]
    fn test_constant_series_stays_constant() {
        let flat = vec![Some(12.5); 30];
        assert_all_close(&smooth(&flat, 0.1), &flat);
    }

    #[test]
    fn test_null_positions_are_preserved() {
        let mut values: Vec<Option<f64>> = (0..40).map(|i| Some(i as f64)).collect();
        values[5] = None;
        values[20] = None;
        let smoothed = smooth(&values, 0.2);

        assert_eq!(smoothed.len(), values.len());
        assert_eq!(smoothed[5], None);
        assert_eq!(smoothed[20], None);
        assert!((smoothed[6].unwrap() - 6.0).abs() < 1e-9, "line through a gap stays on the line");
    }

    #[test]
    fn test_noise_is_reduced_around_trend() {
        let noisy: Vec<Option<f64>> = (0..100)
            .map(|i| {
                let wobble = if i % 2 == 0 { 1.0 } else { -1.0 };
                Some(50.0 + wobble)
            })
            .collect();
        let smoothed = smooth(&noisy, 0.2);

        // interior points, where the neighbourhood is symmetric
        let max_dev = smoothed[10..90]
            .iter()
            .flatten()
            .map(|v| (v - 50.0).abs())
            .fold(0.0, f64::max);
        assert!(max_dev < 0.5, "alternating ±1 noise should mostly cancel, max deviation {}", max_dev);
    }

    #[test]
    fn test_smoothing_is_deterministic() {
        let values: Vec<Option<f64>> = (0..60)
            .map(|i| Some(((i * 37) % 11) as f64))
            .collect();
        assert_eq!(smooth(&values, 0.1), smooth(&values, 0.1));
    }
}
