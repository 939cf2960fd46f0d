/// Observation ingestion.
///
/// - `frost`: Frost API client, response types and element coverage
/// - `series`: time-range checks, localization to Europe/Oslo and hourly
///   series construction

pub mod frost;
pub mod series;
