/// Hazard alarms.
///
/// Submodules:
/// - `thresholds`: snow-drift, slippery-road and salting rules, and the
///   snow-only precipitation estimate.
/// - `events`: alarm events with their triggering readings.

pub mod events;
pub mod thresholds;
