//! Water level classification of peaks.
//!
//! Every gauge has a level group threshold separating ordinary peaks from
//! flood peaks. The threshold is a property of the station, so it lives in
//! the registry; this module only applies it.

use crate::model::WaterLevel;

/// Classifies a peak value against the gauge's level group threshold.
///
/// A value strictly below the threshold is `Low`, anything at or above it is
/// `High`. Without a threshold every peak is `Low`.
pub fn classify(value: f64, threshold: Option<f64>) -> WaterLevel {
    match threshold {
        Some(limit) if value >= limit => WaterLevel::High,
        _ => WaterLevel::Low,
    }
}

/// Number of `Low` and `High` entries among `levels`.
pub fn count_levels<'a>(levels: impl IntoIterator<Item = &'a WaterLevel>) -> (usize, usize) {
    levels.into_iter().fold((0, 0), |(low, high), level| match level {
        WaterLevel::Low => (low + 1, high),
        WaterLevel::High => (low, high + 1),
    })
}
