/// Frost (MET Norway) Observations API Client
///
/// Retrieves hourly station observations from the Norwegian Meteorological
/// Institute's Frost service for the cabin-road hazard pipeline.
///
/// API Documentation: https://frost.met.no/api.html#!/observations/observations
/// Authentication: HTTP basic auth, client id as user name, empty password.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::{ConfigError, FrostConfig};
use crate::logging::{self, DataSource};
use crate::model::{Channel, WeatherError};

/// Environment variable holding the Frost client id.
pub const CLIENT_ID_ENV: &str = "FROST_CLIENT_ID";

// ============================================================================
// Frost API Response Structures
// ============================================================================

/// Top-level observations response
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct FrostResponse {
    #[serde(default)]
    pub data: Vec<FrostItem>,
}

/// All observations sharing one reference time
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FrostItem {
    #[serde(rename = "sourceId", default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(rename = "referenceTime")]
    pub reference_time: String, // ISO 8601, normally UTC with a Z suffix
    #[serde(default)]
    pub observations: Vec<FrostObservation>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FrostObservation {
    #[serde(rename = "elementId")]
    pub element_id: String,
    #[serde(default)]
    pub value: Option<f64>,
}

/// Anything that can hand back a Frost response for a station and window.
///
/// Implemented by the live client and by the offline replay in
/// [`crate::dev_mode`].
pub trait ObservationSource {
    fn fetch_observations(
        &self,
        station_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<FrostResponse, WeatherError>;
}

// ============================================================================
// Request Construction
// ============================================================================

/// Comma-separated element list covering every channel.
pub fn element_list() -> String {
    Channel::ALL
        .iter()
        .map(|c| c.element_id())
        .collect::<Vec<_>>()
        .join(",")
}

/// Query parameters for one observations request.
pub fn build_query(
    station_id: &str,
    time_resolution: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<(&'static str, String)> {
    let reference_time = format!(
        "{}/{}",
        start.to_rfc3339_opts(SecondsFormat::Secs, true),
        end.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    vec![
        ("sources", station_id.to_string()),
        ("elements", element_list()),
        ("timeresolutions", time_resolution.to_string()),
        ("referencetime", reference_time),
    ]
}

/// Parse a Frost response body.
pub fn parse_response(body: &str) -> Result<FrostResponse, WeatherError> {
    serde_json::from_str(body).map_err(|e| WeatherError::ParseError(e.to_string()))
}

// ============================================================================
// Element Coverage
// ============================================================================

/// How many non-null values one element contributed to a response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementCoverage {
    pub channel: Channel,
    pub element_id: String,
    pub valid: usize,
    pub total: usize,
    pub first_value: Option<f64>,
}

impl ElementCoverage {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            100.0 * self.valid as f64 / self.total as f64
        }
    }
}

/// Per-channel count of valid values relative to the number of reference
/// times in the response.
pub fn element_coverage(response: &FrostResponse) -> Vec<ElementCoverage> {
    let total = response.data.len();
    Channel::ALL
        .iter()
        .map(|channel| {
            let values: Vec<f64> = response
                .data
                .iter()
                .filter_map(|item| {
                    item.observations
                        .iter()
                        .find(|o| o.element_id == channel.element_id())
                        .and_then(|o| o.value)
                        .filter(|v| v.is_finite())
                })
                .collect();
            ElementCoverage {
                channel: *channel,
                element_id: channel.element_id().to_string(),
                valid: values.len(),
                total,
                first_value: values.first().copied(),
            }
        })
        .collect()
}

// ============================================================================
// API Client
// ============================================================================

pub struct FrostClient {
    http: reqwest::blocking::Client,
    client_id: String,
    config: FrostConfig,
}

impl FrostClient {
    pub fn new(client_id: &str, config: &FrostConfig) -> Result<Self, WeatherError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| WeatherError::NetworkError(e.to_string()))?;

        Ok(FrostClient {
            http,
            client_id: client_id.to_string(),
            config: config.clone(),
        })
    }

    /// Build a client with the id from `FROST_CLIENT_ID` (a `.env` file in
    /// the working directory is honoured).
    pub fn from_env(config: &FrostConfig) -> Result<Self, Box<dyn std::error::Error>> {
        dotenv::dotenv().ok();
        let client_id = std::env::var(CLIENT_ID_ENV)
            .map_err(|_| ConfigError::Invalid(format!("{} is not set", CLIENT_ID_ENV)))?;
        Ok(FrostClient::new(&client_id, config)?)
    }

    pub fn config(&self) -> &FrostConfig {
        &self.config
    }

    fn fetch_once(&self, query: &[(&'static str, String)]) -> Result<String, WeatherError> {
        let response = self
            .http
            .get(&self.config.api_url)
            .basic_auth(&self.client_id, Some(""))
            .header("Accept", "application/json")
            .query(query)
            .send()
            .map_err(|e| WeatherError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WeatherError::HttpError(status.as_u16()));
        }

        response
            .text()
            .map_err(|e| WeatherError::NetworkError(e.to_string()))
    }
}

/// Transport failures and 5xx responses are worth another attempt; 4xx and
/// malformed bodies are not.
pub fn is_retryable(err: &WeatherError) -> bool {
    match err {
        WeatherError::NetworkError(_) => true,
        WeatherError::HttpError(code) => *code >= 500,
        _ => false,
    }
}

/// Linear backoff: attempt n waits n × base.
pub fn retry_delay(base_ms: u64, attempt: u32) -> Duration {
    Duration::from_millis(base_ms.saturating_mul(attempt as u64))
}

impl ObservationSource for FrostClient {
    fn fetch_observations(
        &self,
        station_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<FrostResponse, WeatherError> {
        let query = build_query(station_id, &self.config.time_resolution, start, end);
        logging::debug(
            DataSource::Frost,
            Some(station_id),
            &format!("GET {} referencetime={}", self.config.api_url, query[3].1),
        );

        let mut attempt = 0;
        loop {
            match self.fetch_once(&query) {
                Ok(body) => return parse_response(&body),
                Err(e) if is_retryable(&e) && attempt < self.config.max_retries => {
                    attempt += 1;
                    let delay = retry_delay(self.config.retry_backoff_ms, attempt);
                    logging::warn(
                        DataSource::Frost,
                        Some(station_id),
                        &format!(
                            "attempt {} failed ({}), retrying in {} ms",
                            attempt,
                            e,
                            delay.as_millis()
                        ),
                    );
                    std::thread::sleep(delay);
                }
                // Frost answers 404 when the window holds no observations
                Err(WeatherError::HttpError(404)) => {
                    return Err(WeatherError::NoDataAvailable(station_id.to_string()));
                }
                Err(e) => return Err(e),
            }
        }
    }
}
