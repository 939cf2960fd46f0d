/// Statistical outlier rejection for a single channel.
///
/// Values outside `median ± k·σ` (population σ over the non-null values) are
/// replaced with null; everything else passes through untouched. Snow depth
/// additionally loses every negative value before the statistics are taken
/// and its lower bound is clamped to zero.
///
/// Bounds are inclusive: with a single valid value σ is zero and the band
/// collapses onto the median, so identical values survive and any other
/// value is rejected.

use super::statistics::{median, population_std};
use crate::config::OutlierConfig;
use crate::model::Channel;

/// Null out implausible values of a generic channel.
pub fn reject_outliers(values: &[Option<f64>], sigma_multiplier: f64) -> Vec<Option<f64>> {
    reject_with_floor(values.to_vec(), sigma_multiplier, None)
}

/// Null out negative and implausible snow depths.
pub fn reject_snow_depth_outliers(values: &[Option<f64>], sigma_multiplier: f64) -> Vec<Option<f64>> {
    let non_negative = values
        .iter()
        .map(|v| v.filter(|depth| *depth >= 0.0))
        .collect();
    reject_with_floor(non_negative, sigma_multiplier, Some(0.0))
}

/// Apply the rejection rule configured for `channel`.
pub fn reject_channel(
    channel: Channel,
    values: &[Option<f64>],
    config: &OutlierConfig,
) -> Vec<Option<f64>> {
    match channel {
        Channel::SnowDepth => reject_snow_depth_outliers(values, config.snow_depth_sigma),
        Channel::WindFromDirection if !config.reject_wind_direction => values.to_vec(),
        _ => reject_outliers(values, config.default_sigma),
    }
}

fn reject_with_floor(
    mut values: Vec<Option<f64>>,
    sigma_multiplier: f64,
    floor: Option<f64>,
) -> Vec<Option<f64>> {
    let (Some(center), Some(sigma)) = (median(&values), population_std(&values)) else {
        // empty or all-null: nothing to measure against
        return values;
    };

    let mut lower = center - sigma_multiplier * sigma;
    if let Some(floor) = floor {
        lower = lower.max(floor);
    }
    let upper = center + sigma_multiplier * sigma;

    for slot in values.iter_mut() {
        if let Some(v) = *slot {
            if v < lower || v > upper {
                *slot = None;
            }
        }
    }
    values
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().copied().map(Some).collect()
    }

    #[test]
    fn test_empty_channel_stays_empty() {
        assert!(reject_outliers(&[], 5.0).is_empty());
        assert!(reject_snow_depth_outliers(&[], 3.0).is_empty());
    }

    #[test]
    fn test_all_null_channel_is_returned_unchanged() {
        let values = vec![None, None, None];
        assert_eq!(reject_outliers(&values, 5.0), values);
        assert_eq!(reject_snow_depth_outliers(&values, 3.0), values);
    }

    #[test]
    fn test_spike_is_nulled_and_neighbours_kept() {
        let mut values = some(&[10.0; 20]);
        values[7] = Some(1000.0);
        let cleaned = reject_snow_depth_outliers(&values, 3.0);

        assert_eq!(cleaned[7], None, "1000 cm spike must be rejected");
        assert_eq!(cleaned.iter().flatten().count(), 19);
        assert!(cleaned.iter().flatten().all(|v| *v == 10.0));
    }

    #[test]
    fn test_negative_snow_depth_is_rejected_even_when_statistically_plausible() {
        let values = some(&[-1.0, 0.0, 1.0, 0.5, -0.5]);
        let cleaned = reject_snow_depth_outliers(&values, 3.0);
        assert_eq!(cleaned, vec![None, Some(0.0), Some(1.0), Some(0.5), None]);
    }

    #[test]
    fn test_negative_values_survive_for_other_channels() {
        let values = some(&[-5.0, -4.0, -6.0, -5.5]);
        assert_eq!(reject_outliers(&values, 5.0), values);
    }

    #[test]
    fn test_single_valid_value_collapses_band_to_median() {
        let values = vec![None, Some(4.0), None];
        assert_eq!(reject_outliers(&values, 5.0), values, "the median itself survives");
    }

    #[test]
    fn test_constant_channel_is_kept_despite_zero_sigma() {
        let values = some(&[-3.0; 6]);
        assert_eq!(reject_outliers(&values, 5.0), values);
    }

    #[test]
    fn test_rejection_is_idempotent_on_cleaned_data() {
        let mut values = some(&[
            9.5, 10.0, 10.5, 10.0, 9.8, 10.2, 10.1, 9.9, 10.0, 10.3, 9.7, 10.0,
        ]);
        values.push(Some(400.0));
        values.push(None);

        let once = reject_snow_depth_outliers(&values, 3.0);
        let twice = reject_snow_depth_outliers(&once, 3.0);

        assert_eq!(once[12], None, "spike rejected on the first pass");
        assert_eq!(once, twice, "second pass must not introduce new nulls");
    }

    #[test]
    fn test_wind_direction_passes_through_by_default() {
        let config = OutlierConfig::default();
        let mut values = some(&[10.0; 10]);
        values.push(Some(350.0));
        assert_eq!(reject_channel(Channel::WindFromDirection, &values, &config), values);
    }
}
