/// Station registry for the cabin-road hazard monitoring service.
///
/// Defines the Frost weather stations this service knows how to monitor,
/// with the channels each one is expected to report. Other modules look
/// stations up here instead of hardcoding source ids.

use crate::model::Channel;

// ---------------------------------------------------------------------------
// Station metadata
// ---------------------------------------------------------------------------

/// Metadata for a single Frost observation source.
pub struct Station {
    /// Frost source id, `SN` followed by the station number.
    pub station_id: &'static str,
    pub name: &'static str,
    /// Human-readable description of the station's role.
    pub description: &'static str,
    /// Channels the station is expected to report at hourly resolution.
    /// Verification flags any of these that come back empty.
    pub expected_channels: &'static [Channel],
}

/// All monitored stations.
pub static STATION_REGISTRY: &[Station] = &[Station {
    station_id: "SN46220",
    name: "Gullingen",
    description: "Automatic weather station by the cabin area road. \
                  Snow depth, wind and precipitation drive the drift and \
                  slush alarms for the access road.",
    expected_channels: &[
        Channel::AirTemperature,
        Channel::Precipitation,
        Channel::SnowDepth,
        Channel::WindSpeed,
        Channel::WindGust,
        Channel::WindFromDirection,
        Channel::SurfaceTemperature,
        Channel::RelativeHumidity,
        Channel::DewPoint,
    ],
}];

// ---------------------------------------------------------------------------
// Lookup helpers
// ---------------------------------------------------------------------------

pub fn all_station_ids() -> Vec<&'static str> {
    STATION_REGISTRY.iter().map(|s| s.station_id).collect()
}

pub fn find_station(station_id: &str) -> Option<&'static Station> {
    STATION_REGISTRY.iter().find(|s| s.station_id == station_id)
}

/// Stations expected to report `channel`.
pub fn stations_with_channel(channel: Channel) -> Vec<&'static str> {
    STATION_REGISTRY
        .iter()
        .filter(|s| s.expected_channels.contains(&channel))
        .map(|s| s.station_id)
        .collect()
}

/// Channels to expect from `station_id`. Unknown stations are assumed to
/// report everything.
pub fn expected_channels(station_id: &str) -> &'static [Channel] {
    find_station(station_id)
        .map(|s| s.expected_channels)
        .unwrap_or(&Channel::ALL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_station_ids_are_valid_frost_format() {
        for station in STATION_REGISTRY {
            let digits = station.station_id.strip_prefix("SN");
            assert!(
                digits.is_some_and(|d| !d.is_empty() && d.chars().all(|c| c.is_ascii_digit())),
                "{} is not an SN source id",
                station.station_id
            );
        }
    }

    #[test]
    fn test_no_duplicate_station_ids() {
        let mut ids = all_station_ids();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), STATION_REGISTRY.len());
    }

    #[test]
    fn test_find_station() {
        let station = find_station("SN46220").expect("Gullingen is registered");
        assert_eq!(station.name, "Gullingen");
        assert!(find_station("SN00000").is_none());
    }

    #[test]
    fn test_default_station_is_registered() {
        let config = crate::config::FrostConfig::default();
        assert!(find_station(&config.station_id).is_some());
    }

    #[test]
    fn test_snow_depth_stations() {
        assert_eq!(stations_with_channel(Channel::SnowDepth), vec!["SN46220"]);
    }

    #[test]
    fn test_unknown_station_expects_every_channel() {
        assert_eq!(expected_channels("SN99999"), &Channel::ALL);
        assert!(expected_channels("SN46220").contains(&Channel::SnowDepth));
    }
}
