/// Hazard pipeline: one hourly series in, one report out.
///
/// Stage order:
/// 1. outlier rejection per channel
/// 2. gap filling of the validated channels
/// 3. derived values (snow precipitation, depth change, alarms, salting,
///    wind octant) from the gap-filled data
/// 4. LOWESS smoothing of the gap-filled channels for display
/// 5. missing periods from the validated (pre-fill) snow depth
///
/// [`run`] is pure and never performs I/O; [`fetch_and_process`] wraps it
/// with ingestion.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::alert::events::{EventInputs, LatestAlarms, alarm_events, latest_alarms};
use crate::alert::thresholds::{
    depth_changes, salting_recommended, slippery_road_alarms, snow_drift_alarms, snow_precipitation,
};
use crate::analysis::gap_fill::fill_channel;
use crate::analysis::missing::missing_periods;
use crate::analysis::outliers::reject_channel;
use crate::analysis::smoothing::smooth;
use crate::analysis::statistics::{ChannelSummary, confidence_band, summarize};
use crate::config::{PipelineConfig, WindChannel};
use crate::ingest::frost::ObservationSource;
use crate::ingest::series::fetch_series;
use crate::logging::{self, DataSource};
use crate::model::{
    AlarmEvent, AlarmKind, Channel, CompassOctant, ConfidenceBand, MissingPeriod,
    ObservationSeries, Sample, WeatherError,
};

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// Everything the UI and export layers need from one pipeline run.
///
/// All per-timestamp vectors have the length of `raw`.
#[derive(Debug, Clone, PartialEq)]
pub struct HazardReport {
    pub station_id: String,
    /// Validated and gap-filled readings, before smoothing.
    pub raw: ObservationSeries,
    /// LOWESS trend of `raw`. Wind direction is carried over unsmoothed.
    pub smoothed: ObservationSeries,
    pub snow_precipitation: Vec<f64>,
    pub snow_depth_change: Vec<Option<f64>>,
    pub snow_drift_alarm: Vec<bool>,
    pub slippery_road_alarm: Vec<bool>,
    pub salting_recommended: Vec<bool>,
    pub wind_direction_category: Vec<Option<CompassOctant>>,
    pub confidence_band: Vec<ConfidenceBand>,
    pub missing_periods: Vec<MissingPeriod>,
    pub alarms: Vec<AlarmEvent>,
    pub summaries: Vec<(Channel, ChannelSummary)>,
}

/// One output row, in export column order.
#[derive(Debug, Clone, PartialEq)]
pub struct HazardRow {
    pub timestamp: DateTime<Tz>,
    pub raw: Sample,
    pub smoothed: Sample,
    pub snow_precipitation: f64,
    pub snow_depth_change: Option<f64>,
    pub snow_drift_alarm: bool,
    pub slippery_road_alarm: bool,
    pub salting_recommended: bool,
    pub wind_direction_category: Option<CompassOctant>,
    pub confidence: ConfidenceBand,
}

impl HazardReport {
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn timestamps(&self) -> &[DateTime<Tz>] {
        self.raw.timestamps()
    }

    pub fn alarm_count(&self, kind: AlarmKind) -> usize {
        self.alarms.iter().filter(|e| e.kind == kind).count()
    }

    pub fn latest_alarms(&self) -> LatestAlarms {
        latest_alarms(&self.alarms)
    }

    pub fn summary(&self, channel: Channel) -> Option<&ChannelSummary> {
        self.summaries
            .iter()
            .find(|(c, _)| *c == channel)
            .map(|(_, s)| s)
    }

    /// Total estimated snow-equivalent precipitation over the report, mm.
    pub fn snow_precipitation_total(&self) -> f64 {
        self.snow_precipitation.iter().sum()
    }

    pub fn row(&self, i: usize) -> Option<HazardRow> {
        Some(HazardRow {
            timestamp: *self.timestamps().get(i)?,
            raw: self.raw.sample(i)?,
            smoothed: self.smoothed.sample(i)?,
            snow_precipitation: *self.snow_precipitation.get(i)?,
            snow_depth_change: *self.snow_depth_change.get(i)?,
            snow_drift_alarm: *self.snow_drift_alarm.get(i)?,
            slippery_road_alarm: *self.slippery_road_alarm.get(i)?,
            salting_recommended: *self.salting_recommended.get(i)?,
            wind_direction_category: *self.wind_direction_category.get(i)?,
            confidence: *self.confidence_band.get(i)?,
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = HazardRow> + '_ {
        (0..self.len()).filter_map(|i| self.row(i))
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

fn wind_channel(choice: WindChannel) -> Channel {
    match choice {
        WindChannel::Mean => Channel::WindSpeed,
        WindChannel::Gust => Channel::WindGust,
    }
}

fn nulls_added(before: &[Option<f64>], after: &[Option<f64>]) -> usize {
    before
        .iter()
        .zip(after)
        .filter(|(b, a)| b.is_some() && a.is_none())
        .count()
}

/// Run every stage over `series`.
pub fn run(series: &ObservationSeries, config: &PipelineConfig) -> HazardReport {
    let station = series.station_id();
    let timestamps = series.timestamps();

    let validated = series.map_channels(|c, values| reject_channel(c, values, &config.outliers));
    for channel in Channel::ALL {
        let rejected = nulls_added(series.channel(channel), validated.channel(channel));
        if rejected > 0 {
            logging::debug(
                DataSource::Pipeline,
                Some(station),
                &format!("{}: rejected {} outliers", channel.column_name(), rejected),
            );
        }
    }

    let filled = validated
        .map_channels(|c, values| fill_channel(c, timestamps, values, &config.gap_fill));

    // derived values come from the pre-smoothing data
    let temperature = filled.channel(Channel::AirTemperature);
    let precipitation = filled.channel(Channel::Precipitation);
    let snow_depth = filled.channel(Channel::SnowDepth);
    let wind = filled.channel(wind_channel(config.snow_drift.wind_channel));

    let snow_precip =
        snow_precipitation(temperature, precipitation, snow_depth, &config.snow_precipitation);
    let depth_change = depth_changes(snow_depth);
    let snow_drift = snow_drift_alarms(wind, temperature, precipitation, snow_depth, &config.snow_drift);
    let slippery_road =
        slippery_road_alarms(temperature, precipitation, snow_depth, &config.slippery_road);
    let salting = salting_recommended(temperature, precipitation, &config.salting);
    let octants = filled
        .channel(Channel::WindFromDirection)
        .iter()
        .map(|d| d.and_then(CompassOctant::from_degrees))
        .collect();

    let smoothed = filled.map_channels(|c, values| match c {
        Channel::WindFromDirection => values.to_vec(),
        _ => smooth(values, config.smoothing.fraction),
    });

    let band = confidence_band(
        smoothed.channel(Channel::SnowDepth),
        validated.channel(Channel::SnowDepth),
        config.confidence.z,
    );

    let periods = missing_periods(
        timestamps,
        validated.channel(Channel::SnowDepth),
        config.missing_periods.merge_gap(),
    );

    let inputs = EventInputs {
        timestamps,
        air_temperature: temperature,
        wind_speed: wind,
        precipitation,
        snow_depth_change: &depth_change,
    };
    let alarms = alarm_events(&inputs, &snow_drift, &slippery_road);

    let summaries = Channel::ALL
        .iter()
        .map(|c| (*c, summarize(filled.channel(*c), *c == Channel::Precipitation)))
        .collect();

    logging::debug(
        DataSource::Pipeline,
        Some(station),
        &format!(
            "{} samples, {} alarm events, {} missing periods",
            series.len(),
            alarms.len(),
            periods.len()
        ),
    );

    HazardReport {
        station_id: station.to_string(),
        raw: filled,
        smoothed,
        snow_precipitation: snow_precip,
        snow_depth_change: depth_change,
        snow_drift_alarm: snow_drift,
        slippery_road_alarm: slippery_road,
        salting_recommended: salting,
        wind_direction_category: octants,
        confidence_band: band,
        missing_periods: periods,
        alarms,
        summaries,
    }
}

/// Fetch `start..end` for a station and run the pipeline over it.
pub fn fetch_and_process(
    source: &dyn ObservationSource,
    station_id: &str,
    start: DateTime<Tz>,
    end: DateTime<Tz>,
    now: DateTime<Utc>,
    config: &PipelineConfig,
) -> Result<HazardReport, WeatherError> {
    let series = fetch_series(source, station_id, start, end, now, &config.ingest)
        .inspect_err(|e| logging::log_frost_failure(station_id, "fetch", e))?;

    let report = run(&series, config);
    logging::info(
        DataSource::Pipeline,
        Some(station_id),
        &format!(
            "{} hours processed: {} snow drift, {} slippery road alarms",
            report.len(),
            report.alarm_count(AlarmKind::SnowDrift),
            report.alarm_count(AlarmKind::SlipperyRoad)
        ),
    );
    Ok(report)
}
