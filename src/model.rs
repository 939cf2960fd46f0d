/// Core data types for the cabin-road hazard monitoring service.
///
/// This module defines the shared domain model imported by all other modules:
/// the hourly observation series flowing through the pipeline, the values the
/// pipeline derives from it, and the error type of the ingestion boundary.
/// It contains no I/O.

use chrono::DateTime;
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::BTreeSet;

// ---------------------------------------------------------------------------
// Channels
// ---------------------------------------------------------------------------

/// One physical measurement's time series as it flows through the pipeline.
///
/// Each channel maps to exactly one Frost element id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Air temperature, °C.
    AirTemperature,
    /// Precipitation over the last hour, mm.
    Precipitation,
    /// Snow depth, cm.
    SnowDepth,
    /// Mean wind speed, m/s.
    WindSpeed,
    /// Maximum gust over the last hour, m/s.
    WindGust,
    /// Direction of the strongest wind over the last hour, degrees.
    WindFromDirection,
    /// Ground surface temperature, °C.
    SurfaceTemperature,
    /// Relative humidity, %.
    RelativeHumidity,
    /// Dew point, °C.
    DewPoint,
}

impl Channel {
    /// All channels, in output column order.
    pub const ALL: [Channel; 9] = [
        Channel::AirTemperature,
        Channel::Precipitation,
        Channel::SnowDepth,
        Channel::WindSpeed,
        Channel::WindGust,
        Channel::WindFromDirection,
        Channel::SurfaceTemperature,
        Channel::RelativeHumidity,
        Channel::DewPoint,
    ];

    /// Frost API element id for this channel.
    pub fn element_id(self) -> &'static str {
        match self {
            Channel::AirTemperature => "air_temperature",
            Channel::Precipitation => "sum(precipitation_amount PT1H)",
            Channel::SnowDepth => "surface_snow_thickness",
            Channel::WindSpeed => "wind_speed",
            Channel::WindGust => "max(wind_speed_of_gust PT1H)",
            Channel::WindFromDirection => "max_wind_speed(wind_from_direction PT1H)",
            Channel::SurfaceTemperature => "surface_temperature",
            Channel::RelativeHumidity => "relative_humidity",
            Channel::DewPoint => "dew_point_temperature",
        }
    }

    /// Column name used in exports.
    pub fn column_name(self) -> &'static str {
        match self {
            Channel::AirTemperature => "air_temperature",
            Channel::Precipitation => "precipitation_amount",
            Channel::SnowDepth => "surface_snow_thickness",
            Channel::WindSpeed => "wind_speed",
            Channel::WindGust => "max_wind_speed",
            Channel::WindFromDirection => "wind_from_direction",
            Channel::SurfaceTemperature => "surface_temperature",
            Channel::RelativeHumidity => "relative_humidity",
            Channel::DewPoint => "dew_point_temperature",
        }
    }

    pub fn from_element_id(element_id: &str) -> Option<Channel> {
        Channel::ALL.into_iter().find(|c| c.element_id() == element_id)
    }

    fn index(self) -> usize {
        Channel::ALL
            .iter()
            .position(|c| *c == self)
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Observation series
// ---------------------------------------------------------------------------

/// One hourly sample, assembled from the column-oriented series for row access.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub timestamp: DateTime<Tz>,
    pub air_temperature: Option<f64>,
    pub precipitation: Option<f64>,
    pub snow_depth: Option<f64>,
    pub wind_speed: Option<f64>,
    pub wind_gust: Option<f64>,
    pub wind_from_direction: Option<f64>,
    pub surface_temperature: Option<f64>,
    pub relative_humidity: Option<f64>,
    pub dew_point: Option<f64>,
}

impl Sample {
    /// A sample at `timestamp` with every reading absent.
    pub fn empty(timestamp: DateTime<Tz>) -> Self {
        Sample {
            timestamp,
            air_temperature: None,
            precipitation: None,
            snow_depth: None,
            wind_speed: None,
            wind_gust: None,
            wind_from_direction: None,
            surface_temperature: None,
            relative_humidity: None,
            dew_point: None,
        }
    }

    pub fn get(&self, channel: Channel) -> Option<f64> {
        match channel {
            Channel::AirTemperature => self.air_temperature,
            Channel::Precipitation => self.precipitation,
            Channel::SnowDepth => self.snow_depth,
            Channel::WindSpeed => self.wind_speed,
            Channel::WindGust => self.wind_gust,
            Channel::WindFromDirection => self.wind_from_direction,
            Channel::SurfaceTemperature => self.surface_temperature,
            Channel::RelativeHumidity => self.relative_humidity,
            Channel::DewPoint => self.dew_point,
        }
    }

    pub fn set(&mut self, channel: Channel, value: Option<f64>) {
        let slot = match channel {
            Channel::AirTemperature => &mut self.air_temperature,
            Channel::Precipitation => &mut self.precipitation,
            Channel::SnowDepth => &mut self.snow_depth,
            Channel::WindSpeed => &mut self.wind_speed,
            Channel::WindGust => &mut self.wind_gust,
            Channel::WindFromDirection => &mut self.wind_from_direction,
            Channel::SurfaceTemperature => &mut self.surface_temperature,
            Channel::RelativeHumidity => &mut self.relative_humidity,
            Channel::DewPoint => &mut self.dew_point,
        };
        *slot = value;
    }
}

/// An ordered-by-time sequence of hourly samples for one station.
///
/// Stored column-wise: each stage works on one channel at a time and returns
/// a new series via [`ObservationSeries::with_channel`]. Nothing mutates a
/// series after construction.
///
/// Invariant: timestamps are strictly increasing and every channel has the
/// same length as the timestamp vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationSeries {
    station_id: String,
    timestamps: Vec<DateTime<Tz>>,
    channels: Vec<Vec<Option<f64>>>,
}

impl ObservationSeries {
    /// Builds a series from samples. Samples are sorted by timestamp and
    /// duplicate timestamps keep the first occurrence.
    pub fn from_samples(station_id: &str, mut samples: Vec<Sample>) -> Self {
        // stable sort keeps first-seen order among equal timestamps
        samples.sort_by_key(|s| s.timestamp);
        let mut seen = BTreeSet::new();
        samples.retain(|s| seen.insert(s.timestamp));

        let timestamps = samples.iter().map(|s| s.timestamp).collect();
        let channels = Channel::ALL
            .iter()
            .map(|c| samples.iter().map(|s| s.get(*c)).collect())
            .collect();

        ObservationSeries {
            station_id: station_id.to_string(),
            timestamps,
            channels,
        }
    }

    pub fn station_id(&self) -> &str {
        &self.station_id
    }

    pub fn timestamps(&self) -> &[DateTime<Tz>] {
        &self.timestamps
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn channel(&self, channel: Channel) -> &[Option<f64>] {
        &self.channels[channel.index()]
    }

    /// Returns a new series with `channel` replaced by `values`.
    ///
    /// `values` shorter or longer than the series is padded with nulls or
    /// truncated so the length invariant holds.
    pub fn with_channel(&self, channel: Channel, mut values: Vec<Option<f64>>) -> Self {
        values.resize(self.len(), None);
        let mut next = self.clone();
        next.channels[channel.index()] = values;
        next
    }

    /// Returns a new series with every channel passed through `stage`.
    pub fn map_channels<F>(&self, mut stage: F) -> Self
    where
        F: FnMut(Channel, &[Option<f64>]) -> Vec<Option<f64>>,
    {
        let channels = Channel::ALL
            .iter()
            .map(|c| {
                let mut values = stage(*c, self.channel(*c));
                values.resize(self.len(), None);
                values
            })
            .collect();
        ObservationSeries {
            station_id: self.station_id.clone(),
            timestamps: self.timestamps.clone(),
            channels,
        }
    }

    /// Row view of sample `i`.
    pub fn sample(&self, i: usize) -> Option<Sample> {
        let timestamp = *self.timestamps.get(i)?;
        let mut sample = Sample::empty(timestamp);
        for channel in Channel::ALL {
            sample.set(channel, self.channel(channel)[i]);
        }
        Some(sample)
    }

    pub fn samples(&self) -> impl Iterator<Item = Sample> + '_ {
        (0..self.len()).filter_map(|i| self.sample(i))
    }

    /// Number of non-null readings in `channel`.
    pub fn valid_count(&self, channel: Channel) -> usize {
        self.channel(channel).iter().flatten().count()
    }
}

// ---------------------------------------------------------------------------
// Derived values
// ---------------------------------------------------------------------------

/// A contiguous run of missing snow-depth samples, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingPeriod {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlarmKind {
    SnowDrift,
    SlipperyRoad,
}

impl std::fmt::Display for AlarmKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlarmKind::SnowDrift => write!(f, "snow drift"),
            AlarmKind::SlipperyRoad => write!(f, "slippery road"),
        }
    }
}

/// Channel readings at the moment an alarm fired, kept for display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlarmReadings {
    pub air_temperature: Option<f64>,
    pub wind_speed: Option<f64>,
    pub precipitation: Option<f64>,
    pub snow_depth_change: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlarmEvent {
    pub timestamp: DateTime<Tz>,
    pub kind: AlarmKind,
    pub readings: AlarmReadings,
}

/// Lower/upper bound around the smoothed snow depth at one timestamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceBand {
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

/// Compass octant of a wind bearing, 45° sectors centred on the eight
/// principal directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompassOctant {
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
}

impl CompassOctant {
    /// Octant containing `degrees`. Bearings outside [0, 360) are wrapped.
    pub fn from_degrees(degrees: f64) -> Option<CompassOctant> {
        if !degrees.is_finite() {
            return None;
        }
        const OCTANTS: [CompassOctant; 8] = [
            CompassOctant::N,
            CompassOctant::NE,
            CompassOctant::E,
            CompassOctant::SE,
            CompassOctant::S,
            CompassOctant::SW,
            CompassOctant::W,
            CompassOctant::NW,
        ];
        let shifted = (degrees + 22.5).rem_euclid(360.0);
        let sector = ((shifted / 45.0) as usize).min(7);
        Some(OCTANTS[sector])
    }

    pub fn label(self) -> &'static str {
        match self {
            CompassOctant::N => "N",
            CompassOctant::NE => "NE",
            CompassOctant::E => "E",
            CompassOctant::SE => "SE",
            CompassOctant::S => "S",
            CompassOctant::SW => "SW",
            CompassOctant::W => "W",
            CompassOctant::NW => "NW",
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Fatal errors at the ingestion boundary. Data-quality problems are never
/// reported through this type; the pipeline degrades to nulls instead.
#[derive(Debug, Clone, PartialEq)]
pub enum WeatherError {
    /// The requested start is not before the (clamped) end.
    InvalidTimeRange { start: String, end: String },
    /// The requested start lies in the future.
    StartInFuture { start: String, now: String },
    /// Non-2xx HTTP response from the Frost API.
    HttpError(u16),
    /// The request never produced a response (DNS, TLS, timeout, ...).
    NetworkError(String),
    /// The response body could not be deserialized.
    ParseError(String),
    /// The response parsed but carried no observations.
    NoDataAvailable(String),
}

impl WeatherError {
    /// True for precondition failures on the requested time range.
    pub fn is_invalid_range(&self) -> bool {
        matches!(
            self,
            WeatherError::InvalidTimeRange { .. } | WeatherError::StartInFuture { .. }
        )
    }

    /// True for connectivity and upstream API failures.
    pub fn is_network(&self) -> bool {
        !self.is_invalid_range()
    }
}

impl std::fmt::Display for WeatherError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WeatherError::InvalidTimeRange { start, end } => {
                write!(f, "Invalid time range: start ({}) must be before end ({})", start, end)
            }
            WeatherError::StartInFuture { start, now } => {
                write!(f, "Invalid time range: start ({}) is in the future (now {})", start, now)
            }
            WeatherError::HttpError(code) => write!(f, "HTTP error: {}", code),
            WeatherError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            WeatherError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            WeatherError::NoDataAvailable(station) => {
                write!(f, "No data available for station: {}", station)
            }
        }
    }
}

impl std::error::Error for WeatherError {}
