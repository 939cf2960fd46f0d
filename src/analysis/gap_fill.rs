/// Gap filling for nullable channels.
///
/// Interior gaps are interpolated between the surrounding valid samples with
/// the requested [`InterpolationMethod`]; leading and trailing gaps take the
/// nearest valid value (back-fill / forward-fill). Any channel with at least
/// one valid value therefore comes out fully numeric.
///
/// This stage never fails. An all-null channel comes back unchanged, and a
/// channel with a single valid value skips interpolation and is edge-filled
/// to a constant.

use chrono::DateTime;
use chrono_tz::Tz;

use crate::config::{GapFillConfig, InterpolationMethod};
use crate::model::Channel;

pub fn fill_gaps(
    timestamps: &[DateTime<Tz>],
    values: &[Option<f64>],
    method: InterpolationMethod,
) -> Vec<Option<f64>> {
    let valid: Vec<usize> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|_| i))
        .collect();

    let (Some(&first), Some(&last)) = (valid.first(), valid.last()) else {
        return values.to_vec();
    };

    let mut filled = values.to_vec();

    if valid.len() >= 2 {
        for pair in valid.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            for i in (a + 1)..b {
                filled[i] = interpolate(timestamps, values, a, b, i, method);
            }
        }
    }

    let head = values[first];
    for slot in filled.iter_mut().take(first) {
        *slot = head;
    }
    let tail = values[last];
    for slot in filled.iter_mut().skip(last + 1) {
        *slot = tail;
    }

    filled
}

/// Gap-fill `channel` with the method configured for it.
pub fn fill_channel(
    channel: Channel,
    timestamps: &[DateTime<Tz>],
    values: &[Option<f64>],
    config: &GapFillConfig,
) -> Vec<Option<f64>> {
    let method = match channel {
        Channel::Precipitation => config.precipitation_method,
        Channel::WindFromDirection => config.wind_direction_method,
        _ => config.default_method,
    };
    fill_gaps(timestamps, values, method)
}

fn interpolate(
    timestamps: &[DateTime<Tz>],
    values: &[Option<f64>],
    a: usize,
    b: usize,
    i: usize,
    method: InterpolationMethod,
) -> Option<f64> {
    let (va, vb) = (values[a]?, values[b]?);

    // Timestamps may be shorter than values if a caller passed a mismatched
    // slice; fall back to positional weights in that case.
    let elapsed = |from: usize, to: usize| -> Option<f64> {
        let (t0, t1) = (timestamps.get(from)?, timestamps.get(to)?);
        Some((*t1 - *t0).num_milliseconds() as f64)
    };

    match method {
        InterpolationMethod::Linear => Some(lerp(va, vb, (i - a) as f64 / (b - a) as f64)),
        InterpolationMethod::Time => {
            let weight = match (elapsed(a, i), elapsed(a, b)) {
                (Some(part), Some(whole)) if whole > 0.0 => part / whole,
                _ => (i - a) as f64 / (b - a) as f64,
            };
            Some(lerp(va, vb, weight))
        }
        InterpolationMethod::Nearest => {
            let (to_a, to_b) = match (elapsed(a, i), elapsed(i, b)) {
                (Some(x), Some(y)) => (x, y),
                _ => ((i - a) as f64, (b - i) as f64),
            };
            Some(if to_b < to_a { vb } else { va })
        }
    }
}

fn lerp(from: f64, to: f64, weight: f64) -> f64 {
    from + (to - from) * weight
}
