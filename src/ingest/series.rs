/// Turning a Frost response into an [`ObservationSeries`] in local time.

use chrono::{DateTime, Duration, LocalResult, NaiveDateTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use std::collections::BTreeSet;

use crate::config::IngestConfig;
use crate::ingest::frost::{FrostResponse, ObservationSource, element_coverage};
use crate::logging::{self, DataSource};
use crate::model::{Channel, ObservationSeries, Sample, WeatherError};

/// Zone every timestamp in the pipeline is expressed in.
pub const LOCAL_TZ: Tz = chrono_tz::Europe::Oslo;

// ---------------------------------------------------------------------------
// Time range
// ---------------------------------------------------------------------------

/// Check a requested window before any network call.
///
/// An `end` in the future is clamped to `now`. Returns the window to fetch.
pub fn validate_time_range(
    start: DateTime<Tz>,
    end: DateTime<Tz>,
    now: DateTime<Utc>,
) -> Result<(DateTime<Tz>, DateTime<Tz>), WeatherError> {
    let now_local = now.with_timezone(&start.timezone());
    let end = if end > now_local { now_local } else { end };

    if start > now_local {
        return Err(WeatherError::StartInFuture {
            start: start.to_rfc3339(),
            now: now_local.to_rfc3339(),
        });
    }
    if start >= end {
        return Err(WeatherError::InvalidTimeRange {
            start: start.to_rfc3339(),
            end: end.to_rfc3339(),
        });
    }
    Ok((start, end))
}

// ---------------------------------------------------------------------------
// Localization
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Localized {
    At(DateTime<Tz>),
    /// Naive wall-clock time occurring twice at the autumn DST change.
    Ambiguous,
    Unparseable,
}

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// Interpret a Frost reference time in [`LOCAL_TZ`].
///
/// Times with an offset or `Z` are converted. Naive times are read as Oslo
/// wall-clock; a time inside the spring-forward gap moves to the first
/// instant after the gap.
pub fn localize(reference_time: &str) -> Localized {
    let text = reference_time.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Localized::At(t.with_timezone(&LOCAL_TZ));
    }

    let Some(naive) = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
    else {
        return Localized::Unparseable;
    };

    match LOCAL_TZ.from_local_datetime(&naive) {
        LocalResult::Single(t) => Localized::At(t),
        LocalResult::Ambiguous(_, _) => Localized::Ambiguous,
        LocalResult::None => shift_past_gap(naive)
            .map(Localized::At)
            .unwrap_or(Localized::Unparseable),
    }
}

fn shift_past_gap(naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    let mut candidate = naive.with_minute(0)?.with_second(0)?.with_nanosecond(0)?;
    // Oslo gaps are one hour and start on the hour
    for _ in 0..3 {
        candidate = candidate + Duration::hours(1);
        if let LocalResult::Single(t) = LOCAL_TZ.from_local_datetime(&candidate) {
            return Some(t);
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Series construction
// ---------------------------------------------------------------------------

/// Build the hourly series for `station_id` from a Frost response.
///
/// Records with unusable timestamps are dropped, duplicate timestamps keep
/// the first record, and for each channel the first matching observation
/// in a record wins. Non-finite values become nulls.
pub fn to_series(
    station_id: &str,
    response: &FrostResponse,
    config: &IngestConfig,
) -> ObservationSeries {
    let mut samples = Vec::with_capacity(response.data.len());
    let mut ambiguous = 0;
    let mut unparseable = 0;

    for item in &response.data {
        let timestamp = match localize(&item.reference_time) {
            Localized::At(t) => t,
            Localized::Ambiguous => {
                ambiguous += 1;
                continue;
            }
            Localized::Unparseable => {
                unparseable += 1;
                continue;
            }
        };

        let mut sample = Sample::empty(timestamp);
        for channel in Channel::ALL {
            let value = item
                .observations
                .iter()
                .find(|o| o.element_id == channel.element_id())
                .and_then(|o| o.value)
                .filter(|v| v.is_finite());
            sample.set(channel, value);
        }
        samples.push(sample);
    }

    if ambiguous + unparseable > 0 {
        logging::warn(
            DataSource::Frost,
            Some(station_id),
            &format!(
                "dropped {} records ({} ambiguous, {} unparseable timestamps)",
                ambiguous + unparseable,
                ambiguous,
                unparseable
            ),
        );
    }

    let series = ObservationSeries::from_samples(station_id, samples);
    if config.reindex_hourly {
        reindex_hourly(&series)
    } else {
        series
    }
}

/// Insert all-null samples for every whole hour between the first and last
/// timestamp that the series lacks. Existing samples are kept as they are.
pub fn reindex_hourly(series: &ObservationSeries) -> ObservationSeries {
    let (Some(first), Some(last)) = (series.timestamps().first(), series.timestamps().last())
    else {
        return series.clone();
    };

    let present: BTreeSet<DateTime<Utc>> = series
        .timestamps()
        .iter()
        .map(|t| t.with_timezone(&Utc))
        .collect();

    // walk the grid in UTC so DST changes neither skip nor repeat an hour
    let first_utc = first.with_timezone(&Utc);
    let floored = first_utc
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(first_utc);
    let mut cursor = if floored < first_utc {
        floored + Duration::hours(1)
    } else {
        floored
    };
    let end = last.with_timezone(&Utc);

    let mut samples: Vec<Sample> = series.samples().collect();
    while cursor <= end {
        if !present.contains(&cursor) {
            samples.push(Sample::empty(cursor.with_timezone(&LOCAL_TZ)));
        }
        cursor = cursor + Duration::hours(1);
    }

    ObservationSeries::from_samples(series.station_id(), samples)
}

/// Fetch `start..end` for one station and build its series.
///
/// Validates the window against `now`, logs per-element coverage, and
/// fails with `NoDataAvailable` when no usable record came back.
pub fn fetch_series(
    source: &dyn ObservationSource,
    station_id: &str,
    start: DateTime<Tz>,
    end: DateTime<Tz>,
    now: DateTime<Utc>,
    config: &IngestConfig,
) -> Result<ObservationSeries, WeatherError> {
    let (start, end) = validate_time_range(start, end, now)?;

    let response =
        source.fetch_observations(station_id, start.with_timezone(&Utc), end.with_timezone(&Utc))?;

    for coverage in element_coverage(&response) {
        logging::info(
            DataSource::Frost,
            Some(station_id),
            &format!(
                "{}: {}/{} values ({:.1}%)",
                coverage.element_id,
                coverage.valid,
                coverage.total,
                coverage.percent()
            ),
        );
    }

    let series = to_series(station_id, &response, config);
    if series.is_empty() {
        return Err(WeatherError::NoDataAvailable(station_id.to_string()));
    }
    Ok(series)
}
