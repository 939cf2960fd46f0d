/// Station Verification Module
///
/// Checks a Frost station against the live API: fetches the last 24 hours
/// and reports, per expected element, whether any usable values came back.
///
/// Run this before adding a station to the registry or when alarms look
/// suspiciously quiet.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::ingest::frost::{FrostResponse, ObservationSource, element_coverage};
use crate::logging::{self, DataSource};
use crate::stations::{expected_channels, find_station};

/// Window fetched by [`verify_station`].
pub const VERIFICATION_WINDOW_HOURS: i64 = 24;

// ============================================================================
// Verification Results
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct VerificationReport {
    pub timestamp: String,
    pub station_id: String,
    pub name: Option<String>,
    pub status: VerificationStatus,
    pub records_returned: usize,
    pub elements: Vec<ElementCheck>,
    pub channels_missing: Vec<String>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ElementCheck {
    pub element_id: String,
    pub column: String,
    pub expected: bool,
    pub valid_values: usize,
    pub coverage_percent: f64,
    pub sample_value: Option<f64>,
}

impl ElementCheck {
    pub fn available(&self) -> bool {
        self.valid_values > 0
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum VerificationStatus {
    /// Every expected element returned data
    Success,
    /// Some expected elements are missing
    PartialSuccess,
    /// Nothing expected came back, or the fetch failed
    Failed,
}

// ============================================================================
// Verification
// ============================================================================

fn empty_report(station_id: &str, now: DateTime<Utc>) -> VerificationReport {
    VerificationReport {
        timestamp: now.to_rfc3339(),
        station_id: station_id.to_string(),
        name: find_station(station_id).map(|s| s.name.to_string()),
        status: VerificationStatus::Failed,
        records_returned: 0,
        elements: Vec::new(),
        channels_missing: Vec::new(),
        error_message: None,
    }
}

/// Judge an already-fetched response.
pub fn verify_from_response(
    station_id: &str,
    response: &FrostResponse,
    now: DateTime<Utc>,
) -> VerificationReport {
    let mut report = empty_report(station_id, now);
    let expected = expected_channels(station_id);

    report.records_returned = response.data.len();
    report.elements = element_coverage(response)
        .into_iter()
        .map(|c| ElementCheck {
            element_id: c.element_id.clone(),
            column: c.channel.column_name().to_string(),
            expected: expected.contains(&c.channel),
            valid_values: c.valid,
            coverage_percent: c.percent(),
            sample_value: c.first_value,
        })
        .collect();

    report.channels_missing = report
        .elements
        .iter()
        .filter(|e| e.expected && !e.available())
        .map(|e| e.column.clone())
        .collect();

    let expected_count = report.elements.iter().filter(|e| e.expected).count();
    report.status = if expected_count == 0 || report.channels_missing.len() == expected_count {
        VerificationStatus::Failed
    } else if report.channels_missing.is_empty() {
        VerificationStatus::Success
    } else {
        VerificationStatus::PartialSuccess
    };

    report
}

/// Fetch the last 24 hours for `station_id` and verify them.
pub fn verify_station(
    source: &dyn ObservationSource,
    station_id: &str,
    now: DateTime<Utc>,
) -> VerificationReport {
    let start = now - Duration::hours(VERIFICATION_WINDOW_HOURS);
    match source.fetch_observations(station_id, start, now) {
        Ok(response) => verify_from_response(station_id, &response, now),
        Err(e) => {
            logging::log_frost_failure(station_id, "verification", &e);
            let mut report = empty_report(station_id, now);
            report.error_message = Some(e.to_string());
            report
        }
    }
}

/// Verify several stations and log the overall outcome.
pub fn verify_stations(
    source: &dyn ObservationSource,
    station_ids: &[&str],
    now: DateTime<Utc>,
) -> Vec<VerificationReport> {
    let reports: Vec<VerificationReport> = station_ids
        .iter()
        .map(|id| verify_station(source, id, now))
        .collect();

    let failed = reports
        .iter()
        .filter(|r| r.status == VerificationStatus::Failed)
        .count();
    logging::log_fetch_summary(DataSource::Frost, reports.len(), reports.len() - failed, failed);
    reports
}

pub fn print_summary(reports: &[VerificationReport]) {
    println!("\n═══════════════════════════════════════════");
    println!("STATION VERIFICATION");
    println!("═══════════════════════════════════════════");
    for report in reports {
        let name = report.name.as_deref().unwrap_or("unregistered");
        match report.status {
            VerificationStatus::Success => {
                println!("✓ {} ({}): {} records", report.station_id, name, report.records_returned)
            }
            VerificationStatus::PartialSuccess => println!(
                "⚠ {} ({}): missing {}",
                report.station_id,
                name,
                report.channels_missing.join(", ")
            ),
            VerificationStatus::Failed => println!(
                "✗ {} ({}): {}",
                report.station_id,
                name,
                report.error_message.as_deref().unwrap_or("no expected element returned data")
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::frost::parse_response;
    use crate::model::WeatherError;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap()
    }

    fn body_with(elements: &[&str]) -> String {
        let observations: Vec<String> = elements
            .iter()
            .map(|e| format!(r#"{{"elementId":"{}","value":1.0}}"#, e))
            .collect();
        format!(
            r#"{{"data":[{{"referenceTime":"2024-01-10T11:00:00Z","observations":[{}]}}]}}"#,
            observations.join(",")
        )
    }

    #[test]
    fn test_all_elements_present_is_success() {
        let ids: Vec<&str> = crate::model::Channel::ALL.iter().map(|c| c.element_id()).collect();
        let response = parse_response(&body_with(&ids)).unwrap();

        let report = verify_from_response("SN46220", &response, now());
        assert_eq!(report.status, VerificationStatus::Success);
        assert!(report.channels_missing.is_empty());
        assert_eq!(report.name.as_deref(), Some("Gullingen"));
    }

    #[test]
    fn test_some_elements_missing_is_partial() {
        let response =
            parse_response(&body_with(&["air_temperature", "surface_snow_thickness"])).unwrap();

        let report = verify_from_response("SN46220", &response, now());
        assert_eq!(report.status, VerificationStatus::PartialSuccess);
        assert!(report.channels_missing.contains(&"wind_speed".to_string()));
        assert!(!report.channels_missing.contains(&"air_temperature".to_string()));
    }

    #[test]
    fn test_empty_response_fails() {
        let report = verify_from_response("SN46220", &FrostResponse::default(), now());
        assert_eq!(report.status, VerificationStatus::Failed);
        assert_eq!(report.records_returned, 0);
    }

    struct FailingSource;

    impl ObservationSource for FailingSource {
        fn fetch_observations(
            &self,
            _station_id: &str,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<FrostResponse, WeatherError> {
            Err(WeatherError::HttpError(503))
        }
    }

    #[test]
    fn test_fetch_error_is_reported() {
        let report = verify_station(&FailingSource, "SN46220", now());
        assert_eq!(report.status, VerificationStatus::Failed);
        assert_eq!(report.error_message.as_deref(), Some("HTTP error: 503"));
    }

    #[test]
    fn test_report_serializes() {
        let report = verify_station(&FailingSource, "SN46220", now());
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"status\":\"Failed\""));
        assert!(json.contains("\"station_id\":\"SN46220\""));
    }
}
