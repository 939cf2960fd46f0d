/// Signal-processing stages of the hazard pipeline.
///
/// Each submodule is a pure function over one channel: it borrows its input
/// and returns a new vector of the same length.
///
/// Submodules:
/// - `outliers`: median ± kσ rejection.
/// - `gap_fill`: time-aware interpolation plus edge fill.
/// - `smoothing`: LOWESS trend for display.
/// - `missing`: contiguous missing-data periods.
/// - `statistics`: median/σ helpers, confidence band, channel summaries.

pub mod gap_fill;
pub mod missing;
pub mod outliers;
pub mod smoothing;
pub mod statistics;
