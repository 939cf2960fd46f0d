/// Cabin-road hazard monitoring.
///
/// Fetches hourly observations for a MET Norway Frost station, cleans and
/// smooths them, and derives snow-drift and slippery-road alarms plus a
/// snow-only precipitation estimate.

pub mod alert;
pub mod analysis;
pub mod cache;
pub mod config;
pub mod dev_mode;
pub mod export;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod stations;
pub mod verify;
