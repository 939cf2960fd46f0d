/// Rule-based hazard flags derived from the gap-filled (pre-smoothing) series.
///
/// All functions take parallel, time-aligned channels and return one value
/// per timestamp. A null reading never satisfies a comparison, so flags do
/// not fire where their inputs are missing. The depth change at the first
/// sample, or next to a null, counts as zero for alarm purposes.

use crate::config::{
    SaltingThresholds, SlipperyRoadThresholds, SnowDriftThresholds, SnowPrecipitationThresholds,
};

/// First difference of snow depth against the previous hour. `None` at
/// index 0 and wherever either neighbour is null.
pub fn depth_changes(snow_depth: &[Option<f64>]) -> Vec<Option<f64>> {
    (0..snow_depth.len())
        .map(|i| {
            let previous = i.checked_sub(1).and_then(|p| snow_depth[p]);
            Some(snow_depth[i]? - previous?)
        })
        .collect()
}

/// Estimated snow-equivalent precipitation per hour, in mm.
///
/// Precipitation counts as snow when the temperature is at or below
/// `accumulation_max_temperature` and the depth grew since the previous
/// hour, or when the temperature is at or below `snowfall_max_temperature`
/// and it precipitated at all. The estimate is the hour's precipitation
/// (never negative), otherwise zero.
pub fn snow_precipitation(
    air_temperature: &[Option<f64>],
    precipitation: &[Option<f64>],
    snow_depth: &[Option<f64>],
    thresholds: &SnowPrecipitationThresholds,
) -> Vec<f64> {
    (0..air_temperature.len())
        .map(|i| {
            let Some(temp) = air_temperature[i] else {
                return 0.0;
            };
            let precip = precipitation.get(i).copied().flatten();

            let accumulated = temp <= thresholds.accumulation_max_temperature
                && i > 0
                && matches!(
                    (snow_depth.get(i).copied().flatten(), snow_depth.get(i - 1).copied().flatten()),
                    (Some(now), Some(before)) if now > before
                );
            let snowing = temp <= thresholds.snowfall_max_temperature
                && precip.is_some_and(|p| p > 0.0);

            if accumulated || snowing {
                precip.unwrap_or(0.0).max(0.0)
            } else {
                0.0
            }
        })
        .collect()
}

/// Single-timestamp snow-drift rule. `depth_change` is already zero-filled.
pub fn is_snow_drift(
    wind_speed: Option<f64>,
    air_temperature: Option<f64>,
    precipitation: Option<f64>,
    depth_change: f64,
    thresholds: &SnowDriftThresholds,
) -> bool {
    let (Some(wind), Some(temp), Some(precip)) = (wind_speed, air_temperature, precipitation) else {
        return false;
    };
    let windy_and_cold =
        wind > thresholds.min_wind_speed && temp <= thresholds.max_air_temperature;
    let redeposited = precip <= thresholds.dry_precipitation_limit
        && depth_change.abs() >= thresholds.dry_depth_change;
    let scoured = precip > thresholds.dry_precipitation_limit
        && depth_change <= -thresholds.scouring_depth_loss;

    windy_and_cold && (redeposited || scoured)
}

pub fn snow_drift_alarms(
    wind_speed: &[Option<f64>],
    air_temperature: &[Option<f64>],
    precipitation: &[Option<f64>],
    snow_depth: &[Option<f64>],
    thresholds: &SnowDriftThresholds,
) -> Vec<bool> {
    depth_changes(snow_depth)
        .into_iter()
        .enumerate()
        .map(|(i, change)| {
            is_snow_drift(
                wind_speed.get(i).copied().flatten(),
                air_temperature.get(i).copied().flatten(),
                precipitation.get(i).copied().flatten(),
                change.unwrap_or(0.0),
                thresholds,
            )
        })
        .collect()
}

/// Single-timestamp slippery-road (slush) rule.
pub fn is_slippery_road(
    air_temperature: Option<f64>,
    precipitation: Option<f64>,
    snow_depth: Option<f64>,
    depth_change: f64,
    thresholds: &SlipperyRoadThresholds,
) -> bool {
    let (Some(temp), Some(precip), Some(depth)) = (air_temperature, precipitation, snow_depth) else {
        return false;
    };
    temp > thresholds.min_air_temperature
        && precip > thresholds.min_precipitation
        && depth >= thresholds.min_snow_depth
        && depth_change < 0.0
}

pub fn slippery_road_alarms(
    air_temperature: &[Option<f64>],
    precipitation: &[Option<f64>],
    snow_depth: &[Option<f64>],
    thresholds: &SlipperyRoadThresholds,
) -> Vec<bool> {
    depth_changes(snow_depth)
        .into_iter()
        .enumerate()
        .map(|(i, change)| {
            is_slippery_road(
                air_temperature.get(i).copied().flatten(),
                precipitation.get(i).copied().flatten(),
                snow_depth[i],
                change.unwrap_or(0.0),
                thresholds,
            )
        })
        .collect()
}

/// Road salting is worthwhile when it precipitates around or below freezing.
pub fn salting_recommended(
    air_temperature: &[Option<f64>],
    precipitation: &[Option<f64>],
    thresholds: &SaltingThresholds,
) -> Vec<bool> {
    air_temperature
        .iter()
        .zip(precipitation)
        .map(|(temp, precip)| match (temp, precip) {
            (Some(t), Some(p)) => {
                *t <= thresholds.max_air_temperature && *p > thresholds.min_precipitation
            }
            _ => false,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drift() -> SnowDriftThresholds {
        SnowDriftThresholds::default()
    }

    fn slush() -> SlipperyRoadThresholds {
        SlipperyRoadThresholds::default()
    }

    // --- Depth change -------------------------------------------------------

    #[test]
    fn test_depth_change_is_null_at_start_and_next_to_gaps() {
        let changes = depth_changes(&[Some(10.0), Some(12.0), None, Some(11.0), Some(10.5)]);
        assert_eq!(changes, vec![None, Some(2.0), None, None, Some(-0.5)]);
    }

    // --- Snow precipitation -------------------------------------------------

    #[test]
    fn test_snow_precipitation_when_depth_grows_below_threshold() {
        let sp = snow_precipitation(
            &[Some(1.0), Some(1.5), Some(1.6)],
            &[Some(0.4), Some(0.7), Some(0.9)],
            &[Some(10.0), Some(11.0), Some(12.0)],
            &SnowPrecipitationThresholds::default(),
        );
        assert_eq!(sp, vec![0.0, 0.7, 0.0], "index 0 has no previous depth; 1.6°C is too warm");
    }

    #[test]
    fn test_snow_precipitation_when_freezing_and_precipitating() {
        let sp = snow_precipitation(
            &[Some(0.0), Some(-4.0), Some(0.1)],
            &[Some(1.2), Some(0.0), Some(1.0)],
            &[Some(10.0), Some(10.0), Some(10.0)],
            &SnowPrecipitationThresholds::default(),
        );
        assert_eq!(sp, vec![1.2, 0.0, 0.0]);
    }

    #[test]
    fn test_snow_precipitation_not_double_counted() {
        let sp = snow_precipitation(
            &[Some(-2.0), Some(-2.0)],
            &[Some(0.5), Some(0.5)],
            &[Some(10.0), Some(11.0)],
            &SnowPrecipitationThresholds::default(),
        );
        assert_eq!(sp[1], 0.5, "both conditions hold, value is still the hour's precipitation");
    }

    #[test]
    fn test_snow_precipitation_is_zero_for_null_inputs() {
        let sp = snow_precipitation(
            &[None, Some(-1.0), Some(-1.0)],
            &[Some(1.0), None, Some(1.0)],
            &[Some(5.0), Some(6.0), None],
            &SnowPrecipitationThresholds::default(),
        );
        assert_eq!(sp, vec![0.0, 0.0, 1.0], "last hour still qualifies via freezing + precipitation");
    }

    #[test]
    fn test_snow_precipitation_never_exceeds_precipitation() {
        let temps: Vec<Option<f64>> = (0..24).map(|i| Some(-5.0 + i as f64 * 0.5)).collect();
        let precip: Vec<Option<f64>> = (0..24).map(|i| Some((i % 4) as f64 * 0.3)).collect();
        let depth: Vec<Option<f64>> = (0..24).map(|i| Some(20.0 + ((i * 7) % 5) as f64)).collect();
        let sp = snow_precipitation(&temps, &precip, &depth, &SnowPrecipitationThresholds::default());
        for (i, value) in sp.iter().enumerate() {
            let p = precip[i].unwrap();
            assert!(*value >= 0.0 && *value <= p, "hour {}: {} not within [0, {}]", i, value, p);
        }
    }

    // --- Snow drift ---------------------------------------------------------

    #[test]
    fn test_snow_drift_fires_just_above_wind_threshold() {
        assert!(is_snow_drift(Some(6.1), Some(-2.0), Some(0.05), 1.2, &drift()));
        assert!(!is_snow_drift(Some(5.9), Some(-2.0), Some(0.05), 1.2, &drift()));
        assert!(!is_snow_drift(Some(6.0), Some(-2.0), Some(0.05), 1.2, &drift()), "threshold is strict");
    }

    #[test]
    fn test_snow_drift_temperature_threshold_is_inclusive() {
        assert!(is_snow_drift(Some(8.0), Some(-1.0), Some(0.0), -1.0, &drift()));
        assert!(!is_snow_drift(Some(8.0), Some(-0.9), Some(0.0), -1.0, &drift()));
    }

    #[test]
    fn test_snow_drift_scouring_with_precipitation() {
        assert!(is_snow_drift(Some(8.0), Some(-5.0), Some(0.4), -0.5, &drift()));
        assert!(!is_snow_drift(Some(8.0), Some(-5.0), Some(0.4), -0.4, &drift()));
        assert!(!is_snow_drift(Some(8.0), Some(-5.0), Some(0.4), 2.0, &drift()), "depth gain with snowfall is not drift");
    }

    #[test]
    fn test_snow_drift_never_fires_on_null_input() {
        assert!(!is_snow_drift(None, Some(-5.0), Some(0.0), 3.0, &drift()));
        assert!(!is_snow_drift(Some(9.0), None, Some(0.0), 3.0, &drift()));
        assert!(!is_snow_drift(Some(9.0), Some(-5.0), None, 3.0, &drift()));
    }

    #[test]
    fn test_snow_drift_series_treats_first_change_as_zero() {
        let alarms = snow_drift_alarms(
            &[Some(9.0), Some(9.0), Some(9.0)],
            &[Some(-4.0), Some(-4.0), Some(-4.0)],
            &[Some(0.0), Some(0.0), Some(0.0)],
            &[Some(30.0), Some(31.5), Some(31.5)],
            &drift(),
        );
        assert_eq!(alarms, vec![false, true, false]);
    }

    // --- Slippery road ------------------------------------------------------

    #[test]
    fn test_slippery_road_fires_on_melting_snowpack_with_rain() {
        let alarms = slippery_road_alarms(
            &[Some(2.0), Some(2.0)],
            &[Some(2.0), Some(2.0)],
            &[Some(25.0), Some(23.0)],
            &slush(),
        );
        assert_eq!(alarms, vec![false, true]);
    }

    #[test]
    fn test_slippery_road_silent_when_depth_constant() {
        let alarms = slippery_road_alarms(
            &[Some(2.0), Some(2.0)],
            &[Some(2.0), Some(2.0)],
            &[Some(25.0), Some(25.0)],
            &slush(),
        );
        assert_eq!(alarms, vec![false, false]);
    }

    #[test]
    fn test_slippery_road_boundaries() {
        let t = slush();
        assert!(!is_slippery_road(Some(0.0), Some(2.0), Some(25.0), -1.0, &t), "temperature must exceed 0");
        assert!(!is_slippery_road(Some(1.0), Some(1.5), Some(25.0), -1.0, &t), "precipitation must exceed 1.5");
        assert!(is_slippery_road(Some(1.0), Some(1.6), Some(20.0), -1.0, &t), "20 cm is enough");
        assert!(!is_slippery_road(Some(1.0), Some(1.6), Some(19.9), -1.0, &t));
    }

    // --- Salting ------------------------------------------------------------

    #[test]
    fn test_salting_recommended_near_freezing_with_precipitation() {
        let flags = salting_recommended(
            &[Some(2.0), Some(2.1), Some(-3.0), None],
            &[Some(0.2), Some(0.2), Some(0.0), Some(1.0)],
            &SaltingThresholds::default(),
        );
        assert_eq!(flags, vec![true, false, false, false]);
    }
}
