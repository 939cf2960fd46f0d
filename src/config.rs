/// Service and pipeline configuration.
///
/// Every threshold the hazard pipeline uses is a named, overridable field
/// here. Configuration is read from a TOML file in which every table and
/// every field is optional; omitted values fall back to the defaults below.
///
/// ```toml
/// [frost]
/// station_id = "SN46220"
///
/// [pipeline.snow_drift]
/// min_wind_speed = 7.0
/// wind_channel = "gust"
/// ```

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::Path;

/// Upper bound for durations configured in minutes (one leap year).
pub const MAX_DURATION_MINUTES: i64 = 366 * 24 * 60;

/// Upper bound for `export.decimals`.
pub const MAX_DECIMALS: usize = 6;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config: {}", e),
            ConfigError::Parse(msg) => write!(f, "Failed to parse config: {}", msg),
            ConfigError::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

// ---------------------------------------------------------------------------
// Service-level configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub frost: FrostConfig,
    pub cache: CacheConfig,
    pub pipeline: PipelineConfig,
    pub export: ExportConfig,
}

impl ServiceConfig {
    /// Parse a configuration from TOML text and validate it.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: ServiceConfig =
            toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline.validate()?;
        if !(0..=MAX_DURATION_MINUTES).contains(&self.cache.ttl_minutes) {
            return Err(ConfigError::Invalid(format!(
                "cache ttl must be between 0 and {} minutes, got {}",
                MAX_DURATION_MINUTES, self.cache.ttl_minutes
            )));
        }
        if self.export.decimals > MAX_DECIMALS {
            return Err(ConfigError::Invalid(format!(
                "export decimals must be at most {}, got {}",
                MAX_DECIMALS, self.export.decimals
            )));
        }
        Ok(())
    }
}

/// Load and validate a configuration file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ServiceConfig, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    ServiceConfig::from_toml_str(&text)
}

/// Frost API connection settings. The client id is not stored here; it is
/// read from the `FROST_CLIENT_ID` environment variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrostConfig {
    pub api_url: String,
    pub station_id: String,
    pub time_resolution: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for FrostConfig {
    fn default() -> Self {
        Self {
            api_url: "https://frost.met.no/observations/v0.jsonld".to_string(),
            station_id: "SN46220".to_string(),
            time_resolution: "PT1H".to_string(),
            timeout_secs: 30,
            max_retries: 2,
            retry_backoff_ms: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_minutes: i64,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: 60,
            max_entries: 32,
        }
    }
}

impl CacheConfig {
    /// Entry lifetime, clamped to `[0, MAX_DURATION_MINUTES]`.
    pub fn ttl(&self) -> Duration {
        Duration::minutes(self.ttl_minutes.clamp(0, MAX_DURATION_MINUTES))
    }
}

/// CSV and workbook number formatting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Digits after the decimal comma.
    pub decimals: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self { decimals: 1 }
    }
}

// ---------------------------------------------------------------------------
// Pipeline configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub ingest: IngestConfig,
    pub outliers: OutlierConfig,
    pub gap_fill: GapFillConfig,
    pub smoothing: SmoothingConfig,
    pub snow_drift: SnowDriftThresholds,
    pub slippery_road: SlipperyRoadThresholds,
    pub snow_precipitation: SnowPrecipitationThresholds,
    pub salting: SaltingThresholds,
    pub missing_periods: MissingPeriodConfig,
    pub confidence: ConfidenceConfig,
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.outliers.snow_depth_sigma > 0.0) || !(self.outliers.default_sigma > 0.0) {
            return Err(ConfigError::Invalid(
                "outlier sigma multipliers must be positive".to_string(),
            ));
        }
        let fraction = self.smoothing.fraction;
        if !(fraction > 0.0 && fraction <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "smoothing fraction must be in (0, 1], got {}",
                fraction
            )));
        }
        if !(0..=MAX_DURATION_MINUTES).contains(&self.missing_periods.merge_gap_minutes) {
            return Err(ConfigError::Invalid(format!(
                "missing period merge gap must be between 0 and {} minutes, got {}",
                MAX_DURATION_MINUTES, self.missing_periods.merge_gap_minutes
            )));
        }
        if !(self.confidence.z >= 0.0) {
            return Err(ConfigError::Invalid(
                "confidence multiplier cannot be negative".to_string(),
            ));
        }
        Ok(())
    }

    /// Stable hash of the full configuration, used to key cached reports so
    /// a retuned threshold never serves a stale result.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        toml::to_string(self)
            .unwrap_or_else(|_| format!("{:?}", self))
            .hash(&mut hasher);
        hasher.finish()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Insert all-null samples for hours absent from the API response.
    pub reindex_hourly: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            reindex_hourly: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlierConfig {
    /// σ multiplier for snow depth.
    pub snow_depth_sigma: f64,
    /// σ multiplier for every other channel.
    pub default_sigma: f64,
    /// Bearings are circular, so median ± kσ is off by default.
    pub reject_wind_direction: bool,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            snow_depth_sigma: 3.0,
            default_sigma: 5.0,
            reject_wind_direction: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpolationMethod {
    /// Linear in elapsed wall-clock time between the surrounding samples.
    Time,
    /// Linear in sample position.
    Linear,
    /// Value of the nearest valid sample in time.
    Nearest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GapFillConfig {
    pub default_method: InterpolationMethod,
    pub precipitation_method: InterpolationMethod,
    pub wind_direction_method: InterpolationMethod,
}

impl Default for GapFillConfig {
    fn default() -> Self {
        Self {
            default_method: InterpolationMethod::Time,
            precipitation_method: InterpolationMethod::Time,
            wind_direction_method: InterpolationMethod::Nearest,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// LOWESS bandwidth as a fraction of the valid points.
    pub fraction: f64,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self { fraction: 0.1 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindChannel {
    Mean,
    Gust,
}

/// Snow-drift alarm thresholds.
///
/// Fires when wind > `min_wind_speed`, air temperature ≤ `max_air_temperature`
/// and either
///   precipitation ≤ `dry_precipitation_limit` and |Δdepth| ≥ `dry_depth_change`, or
///   precipitation > `dry_precipitation_limit` and Δdepth ≤ −`scouring_depth_loss`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnowDriftThresholds {
    pub wind_channel: WindChannel,
    pub min_wind_speed: f64,
    pub max_air_temperature: f64,
    pub dry_precipitation_limit: f64,
    pub dry_depth_change: f64,
    pub scouring_depth_loss: f64,
}

impl Default for SnowDriftThresholds {
    fn default() -> Self {
        Self {
            wind_channel: WindChannel::Mean,
            min_wind_speed: 6.0,
            max_air_temperature: -1.0,
            dry_precipitation_limit: 0.1,
            dry_depth_change: 1.0,
            scouring_depth_loss: 0.5,
        }
    }
}

/// Slippery-road alarm thresholds: air temperature > `min_air_temperature`,
/// precipitation > `min_precipitation`, snow depth ≥ `min_snow_depth`, and
/// snow depth falling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlipperyRoadThresholds {
    pub min_air_temperature: f64,
    pub min_precipitation: f64,
    pub min_snow_depth: f64,
}

impl Default for SlipperyRoadThresholds {
    fn default() -> Self {
        Self {
            min_air_temperature: 0.0,
            min_precipitation: 1.5,
            min_snow_depth: 20.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnowPrecipitationThresholds {
    /// Precipitation counts as snow at or below this temperature when depth grew.
    pub accumulation_max_temperature: f64,
    /// Precipitation counts as snow at or below this temperature regardless of depth.
    pub snowfall_max_temperature: f64,
}

impl Default for SnowPrecipitationThresholds {
    fn default() -> Self {
        Self {
            accumulation_max_temperature: 1.5,
            snowfall_max_temperature: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaltingThresholds {
    pub max_air_temperature: f64,
    pub min_precipitation: f64,
}

impl Default for SaltingThresholds {
    fn default() -> Self {
        Self {
            max_air_temperature: 2.0,
            min_precipitation: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MissingPeriodConfig {
    pub merge_gap_minutes: i64,
}

impl Default for MissingPeriodConfig {
    fn default() -> Self {
        Self {
            merge_gap_minutes: 60,
        }
    }
}

impl MissingPeriodConfig {
    pub fn merge_gap(&self) -> Duration {
        Duration::minutes(self.merge_gap_minutes.clamp(0, MAX_DURATION_MINUTES))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    /// Multiplier on the whole-series standard deviation.
    pub z: f64,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self { z: 1.96 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_yields_defaults() {
        let config = ServiceConfig::from_toml_str("").expect("empty config should parse");
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.pipeline.snow_drift.min_wind_speed, 6.0);
        assert_eq!(config.pipeline.slippery_road.min_precipitation, 1.5);
        assert_eq!(config.pipeline.outliers.snow_depth_sigma, 3.0);
        assert_eq!(config.pipeline.outliers.default_sigma, 5.0);
        assert_eq!(config.pipeline.missing_periods.merge_gap_minutes, 60);
        assert_eq!(config.frost.station_id, "SN46220");
        assert_eq!(config.export.decimals, 1);
    }

    #[test]
    fn test_shipped_config_matches_defaults() {
        let config = ServiceConfig::from_toml_str(include_str!("../hazard.toml"))
            .expect("hazard.toml should parse");
        assert_eq!(config, ServiceConfig::default());
    }

    #[test]
    fn test_partial_table_overrides_only_named_fields() {
        let text = r#"
            [pipeline.snow_drift]
            min_wind_speed = 7.0
            wind_channel = "gust"

            [pipeline.gap_fill]
            precipitation_method = "nearest"
        "#;
        let config = ServiceConfig::from_toml_str(text).expect("valid config");
        let drift = &config.pipeline.snow_drift;
        assert_eq!(drift.min_wind_speed, 7.0);
        assert_eq!(drift.wind_channel, WindChannel::Gust);
        assert_eq!(drift.max_air_temperature, -1.0, "untouched field keeps default");
        assert_eq!(
            config.pipeline.gap_fill.precipitation_method,
            InterpolationMethod::Nearest
        );
        assert_eq!(config.pipeline.gap_fill.default_method, InterpolationMethod::Time);
    }

    #[test]
    fn test_invalid_smoothing_fraction_is_rejected() {
        let text = "[pipeline.smoothing]\nfraction = 0.0\n";
        let result = ServiceConfig::from_toml_str(text);
        assert!(matches!(result, Err(ConfigError::Invalid(_))), "got {:?}", result);
    }

    #[test]
    fn test_out_of_range_durations_are_rejected() {
        for text in [
            "[pipeline.missing_periods]\nmerge_gap_minutes = 9000000000000000000\n",
            "[pipeline.missing_periods]\nmerge_gap_minutes = -1\n",
            "[cache]\nttl_minutes = 9000000000000000000\n",
            "[cache]\nttl_minutes = -5\n",
        ] {
            let result = ServiceConfig::from_toml_str(text);
            assert!(matches!(result, Err(ConfigError::Invalid(_))), "{:?} accepted", text);
        }
        assert!(ServiceConfig::from_toml_str("[cache]\nttl_minutes = 0\n").is_ok());
    }

    #[test]
    fn test_export_decimals_are_bounded() {
        let result = ServiceConfig::from_toml_str("[export]\ndecimals = 400\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))), "got {:?}", result);
        assert!(ServiceConfig::from_toml_str("[export]\ndecimals = 6\n").is_ok());
    }

    #[test]
    fn test_duration_accessors_clamp() {
        let mut config = ServiceConfig::default();
        assert_eq!(config.cache.ttl(), Duration::minutes(60));
        assert_eq!(config.pipeline.missing_periods.merge_gap(), Duration::hours(1));

        config.cache.ttl_minutes = i64::MAX;
        config.pipeline.missing_periods.merge_gap_minutes = i64::MIN;
        assert_eq!(config.cache.ttl(), Duration::minutes(MAX_DURATION_MINUTES));
        assert_eq!(config.pipeline.missing_periods.merge_gap(), Duration::zero());
    }

    #[test]
    fn test_malformed_toml_is_a_parse_error() {
        let result = ServiceConfig::from_toml_str("[pipeline\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))), "got {:?}", result);
    }

    #[test]
    fn test_fingerprint_tracks_threshold_changes() {
        let base = PipelineConfig::default();
        let mut tuned = base.clone();
        tuned.slippery_road.min_precipitation = 0.5;

        assert_eq!(base.fingerprint(), PipelineConfig::default().fingerprint());
        assert_ne!(base.fingerprint(), tuned.fingerprint());
    }
}
