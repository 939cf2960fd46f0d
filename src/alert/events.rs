/// Alarm events: the timestamps at which a hazard flag fired, with the
/// readings that triggered it, and the latest event of each kind for the
/// "last alarm" display.

use chrono::DateTime;
use chrono_tz::Tz;

use crate::model::{AlarmEvent, AlarmKind, AlarmReadings};

/// Readings backing the events, aligned with `timestamps`.
pub struct EventInputs<'a> {
    pub timestamps: &'a [DateTime<Tz>],
    pub air_temperature: &'a [Option<f64>],
    pub wind_speed: &'a [Option<f64>],
    pub precipitation: &'a [Option<f64>],
    pub snow_depth_change: &'a [Option<f64>],
}

impl EventInputs<'_> {
    fn readings(&self, i: usize) -> AlarmReadings {
        let at = |channel: &[Option<f64>]| channel.get(i).copied().flatten();
        AlarmReadings {
            air_temperature: at(self.air_temperature),
            wind_speed: at(self.wind_speed),
            precipitation: at(self.precipitation),
            snow_depth_change: at(self.snow_depth_change),
        }
    }
}

/// One event per raised flag, ordered by time, snow drift before slippery
/// road at equal timestamps.
pub fn alarm_events(
    inputs: &EventInputs<'_>,
    snow_drift: &[bool],
    slippery_road: &[bool],
) -> Vec<AlarmEvent> {
    let mut events = Vec::new();
    for (i, timestamp) in inputs.timestamps.iter().enumerate() {
        let raised = [
            (AlarmKind::SnowDrift, snow_drift.get(i).copied().unwrap_or(false)),
            (AlarmKind::SlipperyRoad, slippery_road.get(i).copied().unwrap_or(false)),
        ];
        for (kind, fired) in raised {
            if fired {
                events.push(AlarmEvent {
                    timestamp: *timestamp,
                    kind,
                    readings: inputs.readings(i),
                });
            }
        }
    }
    events
}

/// Most recent event of each kind.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LatestAlarms {
    pub snow_drift: Option<AlarmEvent>,
    pub slippery_road: Option<AlarmEvent>,
}

pub fn latest_alarms(events: &[AlarmEvent]) -> LatestAlarms {
    let latest = |kind: AlarmKind| {
        events
            .iter()
            .filter(|e| e.kind == kind)
            .max_by_key(|e| e.timestamp)
            .copied()
    };
    LatestAlarms {
        snow_drift: latest(AlarmKind::SnowDrift),
        slippery_road: latest(AlarmKind::SlipperyRoad),
    }
}
