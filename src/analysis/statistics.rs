/// Descriptive statistics over nullable channels.
///
/// All functions skip nulls. Population (not sample) standard deviation is
/// used throughout, matching what the outlier filter and confidence band
/// were tuned against.

use crate::model::ConfidenceBand;

/// Median of the non-null values; mean of the middle pair for even counts.
pub fn median(values: &[Option<f64>]) -> Option<f64> {
    let mut valid: Vec<f64> = values.iter().flatten().copied().collect();
    if valid.is_empty() {
        return None;
    }
    valid.sort_by(|a, b| a.total_cmp(b));
    let mid = valid.len() / 2;
    if valid.len() % 2 == 0 {
        Some((valid[mid - 1] + valid[mid]) / 2.0)
    } else {
        Some(valid[mid])
    }
}

pub fn mean(values: &[Option<f64>]) -> Option<f64> {
    let (sum, count) = values
        .iter()
        .flatten()
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Population standard deviation of the non-null values.
pub fn population_std(values: &[Option<f64>]) -> Option<f64> {
    let mu = mean(values)?;
    let (sq, count) = values
        .iter()
        .flatten()
        .fold((0.0, 0usize), |(s, n), v| (s + (v - mu).powi(2), n + 1));
    Some((sq / count as f64).sqrt())
}

/// Band of `smoothed ± z·σ` where σ is one scalar over the whole validated
/// snow-depth channel, not a rolling statistic.
pub fn confidence_band(
    smoothed: &[Option<f64>],
    validated: &[Option<f64>],
    z: f64,
) -> Vec<ConfidenceBand> {
    let sigma = population_std(validated);
    smoothed
        .iter()
        .map(|value| match (value, sigma) {
            (Some(v), Some(s)) => ConfidenceBand {
                lower: Some(v - z * s),
                upper: Some(v + z * s),
            },
            _ => ConfidenceBand {
                lower: None,
                upper: None,
            },
        })
        .collect()
}

/// Summary shown next to the charts for one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelSummary {
    pub mean: Option<f64>,
    pub median: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Only meaningful for accumulating quantities such as precipitation.
    pub sum: Option<f64>,
}

pub fn summarize(values: &[Option<f64>], include_sum: bool) -> ChannelSummary {
    let valid = || values.iter().flatten().copied();
    ChannelSummary {
        mean: mean(values),
        median: median(values),
        min: valid().reduce(f64::min),
        max: valid().reduce(f64::max),
        sum: if include_sum && valid().next().is_some() {
            Some(valid().sum())
        } else {
            None
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: Option<f64>, expected: f64) {
        let actual = actual.expect("expected a value");
        assert!(
            (actual - expected).abs() < 1e-9,
            "expected {}, got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_median_skips_nulls_and_averages_even_counts() {
        assert_close(median(&[Some(3.0), None, Some(1.0), Some(2.0)]), 2.0);
        assert_close(median(&[Some(4.0), Some(1.0), None, Some(2.0), Some(3.0)]), 2.5);
        assert_eq!(median(&[None, None]), None);
    }

    #[test]
    fn test_population_std_divides_by_n() {
        // mean 5, squared deviations 9+1+1+9 = 20, /4 = 5
        assert_close(
            population_std(&[Some(2.0), Some(4.0), Some(6.0), Some(8.0)]),
            5.0_f64.sqrt(),
        );
        assert_close(population_std(&[Some(7.0)]), 0.0);
        assert_eq!(population_std(&[]), None);
    }

    #[test]
    fn test_confidence_band_uses_single_whole_series_sigma() {
        let validated = [Some(2.0), Some(4.0), None, Some(6.0), Some(8.0)];
        let smoothed = [Some(10.0), None, Some(20.0)];
        let band = confidence_band(&smoothed, &validated, 1.96);
        let half_width = 1.96 * 5.0_f64.sqrt();

        assert_close(band[0].lower, 10.0 - half_width);
        assert_close(band[0].upper, 10.0 + half_width);
        assert_eq!(band[1], ConfidenceBand { lower: None, upper: None });
        assert_close(band[2].upper, 20.0 + half_width);
    }

    #[test]
    fn test_confidence_band_without_valid_depths_is_empty() {
        let band = confidence_band(&[Some(1.0)], &[None], 1.96);
        assert_eq!(band[0].lower, None);
    }

    #[test]
    fn test_summarize_reports_sum_only_when_asked() {
        let values = [Some(1.0), None, Some(4.0), Some(1.0)];
        let with_sum = summarize(&values, true);
        assert_close(with_sum.mean, 2.0);
        assert_close(with_sum.median, 1.0);
        assert_close(with_sum.min, 1.0);
        assert_close(with_sum.max, 4.0);
        assert_close(with_sum.sum, 6.0);
        assert_eq!(summarize(&values, false).sum, None);
        assert_eq!(summarize(&[None], true), ChannelSummary {
            mean: None,
            median: None,
            min: None,
            max: None,
            sum: None,
        });
    }
}
