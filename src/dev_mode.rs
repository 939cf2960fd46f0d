/// Development mode utilities for working with recorded data
///
/// When the Frost API is unreachable (or no client id is at hand), replay a
/// previously saved observations response instead. Reference times can be
/// shifted forward so an old winter storm shows up as if it were current.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use chrono_tz::Tz;
use std::path::{Path, PathBuf};

use crate::ingest::frost::{FrostResponse, ObservationSource, parse_response};
use crate::ingest::series::{Localized, localize};
use crate::logging::{self, DataSource};
use crate::model::WeatherError;

/// Configuration for offline replay
pub struct DevMode {
    /// Shift recorded data this many days forward in time
    pub days_offset: i64,
}

impl DevMode {
    pub fn new(days_offset: i64) -> Self {
        Self { days_offset }
    }

    /// Load a saved Frost response and apply the day offset.
    pub fn load(&self, path: &Path) -> Result<ReplaySource, WeatherError> {
        let body = std::fs::read_to_string(path).map_err(|e| {
            WeatherError::ParseError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let response = self.shift(parse_response(&body)?);
        logging::info(
            DataSource::Frost,
            None,
            &format!(
                "replaying {} records from {} (offset {} days)",
                response.data.len(),
                path.display(),
                self.days_offset
            ),
        );
        Ok(ReplaySource { response })
    }

    /// Move every reference time `days_offset` days forward. Times that
    /// cannot be localized or shifted are left as they are.
    pub fn shift(&self, mut response: FrostResponse) -> FrostResponse {
        if self.days_offset == 0 {
            return response;
        }
        let Some(offset) = Duration::try_days(self.days_offset) else {
            logging::warn(
                DataSource::Frost,
                None,
                &format!("replay offset of {} days is out of range, ignored", self.days_offset),
            );
            return response;
        };
        for item in &mut response.data {
            if let Localized::At(t) = localize(&item.reference_time) {
                if let Some(shifted) = t.checked_add_signed(offset) {
                    item.reference_time = shifted
                        .with_timezone(&Utc)
                        .to_rfc3339_opts(SecondsFormat::Secs, true);
                }
            }
        }
        response
    }
}

/// Write `response` to `path` so it can be replayed later.
pub fn save_response(response: &FrostResponse, path: &Path) -> Result<(), WeatherError> {
    let body =
        serde_json::to_string_pretty(response).map_err(|e| WeatherError::ParseError(e.to_string()))?;
    std::fs::write(path, body).map_err(|e| {
        WeatherError::ParseError(format!("cannot write {}: {}", path.display(), e))
    })
}

/// Wraps a live source and saves every successful response to `path`.
pub struct RecordingSource<S> {
    inner: S,
    path: PathBuf,
}

impl<S: ObservationSource> RecordingSource<S> {
    pub fn new(inner: S, path: &Path) -> Self {
        Self {
            inner,
            path: path.to_path_buf(),
        }
    }
}

impl<S: ObservationSource> ObservationSource for RecordingSource<S> {
    fn fetch_observations(
        &self,
        station_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<FrostResponse, WeatherError> {
        let response = self.inner.fetch_observations(station_id, start, end)?;
        save_response(&response, &self.path)?;
        logging::info(
            DataSource::Frost,
            Some(station_id),
            &format!("recorded {} records to {}", response.data.len(), self.path.display()),
        );
        Ok(response)
    }
}

/// An in-memory response served as if it came from the API.
pub struct ReplaySource {
    response: FrostResponse,
}

impl ReplaySource {
    pub fn new(response: FrostResponse) -> Self {
        Self { response }
    }

    /// First and last localizable reference time in the recording.
    pub fn data_range(&self) -> Option<(DateTime<Tz>, DateTime<Tz>)> {
        let times: Vec<DateTime<Tz>> = self
            .response
            .data
            .iter()
            .filter_map(|item| match localize(&item.reference_time) {
                Localized::At(t) => Some(t),
                _ => None,
            })
            .collect();
        Some((*times.iter().min()?, *times.iter().max()?))
    }
}

impl ObservationSource for ReplaySource {
    /// Records within `[start, end)`. Station ids are not checked; a
    /// recording holds one station.
    fn fetch_observations(
        &self,
        station_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<FrostResponse, WeatherError> {
        let data = self
            .response
            .data
            .iter()
            .filter(|item| match localize(&item.reference_time) {
                Localized::At(t) => {
                    let t = t.with_timezone(&Utc);
                    t >= start && t < end
                }
                _ => false,
            })
            .cloned()
            .collect::<Vec<_>>();

        if data.is_empty() {
            return Err(WeatherError::NoDataAvailable(station_id.to_string()));
        }
        Ok(FrostResponse { data })
    }
}
