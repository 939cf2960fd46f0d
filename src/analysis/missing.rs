/// Missing-period summarization for reporting.
///
/// Scans the null positions of a channel (normally the snow depth after
/// outlier rejection, before gap filling) in order and groups them into
/// inclusive [`MissingPeriod`]s. A null joins the open period when its
/// timestamp is within `merge_gap` of the period's current end.

use chrono::{DateTime, Duration};
use chrono_tz::Tz;

use crate::model::MissingPeriod;

pub fn missing_periods(
    timestamps: &[DateTime<Tz>],
    values: &[Option<f64>],
    merge_gap: Duration,
) -> Vec<MissingPeriod> {
    let mut periods = Vec::new();
    let mut current: Option<MissingPeriod> = None;

    let nulls = timestamps
        .iter()
        .zip(values)
        .filter(|(_, v)| v.is_none())
        .map(|(t, _)| *t);

    for timestamp in nulls {
        current = match current {
            Some(mut open) if (timestamp - open.end).abs() <= merge_gap => {
                open.end = timestamp;
                Some(open)
            }
            Some(closed) => {
                periods.push(closed);
                Some(MissingPeriod {
                    start: timestamp,
                    end: timestamp,
                })
            }
            None => Some(MissingPeriod {
                start: timestamp,
                end: timestamp,
            }),
        };
    }

    periods.extend(current);
    periods
}
