//! Edges between the peaks of neighbouring gauges.
//!
//! A peak at the current gauge continues at the next gauge downstream on
//! every peak date of the next gauge within `[date - backward, date + forward]`.
//! Each continuation carries the slope of the water surface between the two
//! peaks in cm/km.

use chrono::{Duration, NaiveDate};

use crate::model::{
    DetectionParams, EdgeCandidates, FloodWaveError, GaugeVertices, PairEdges,
};
use crate::stations::StationRegistry;

/// Dates of `next_vertices` within the continuation window of `date`, inclusive.
pub fn candidate_dates(
    date: NaiveDate,
    backward_days: i64,
    forward_days: i64,
    next_vertices: &GaugeVertices,
) -> Vec<NaiveDate> {
    let from = Duration::try_days(backward_days)
        .and_then(|d| date.checked_sub_signed(d))
        .unwrap_or(NaiveDate::MIN);
    let to = Duration::try_days(forward_days)
        .and_then(|d| date.checked_add_signed(d))
        .unwrap_or(NaiveDate::MAX);
    if from > to {
        return Vec::new();
    }
    next_vertices.range(from..=to).map(|(d, _)| *d).collect()
}

/// Slopes between peaks of two gauges at a fixed river distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlopeCalculator {
    distance_km: f64,
}

impl SlopeCalculator {
    /// `distance_km` is upstream km minus downstream km and must not be zero.
    pub fn new(upstream: &str, downstream: &str, distance_km: f64) -> Result<Self, FloodWaveError> {
        if distance_km == 0.0 || !distance_km.is_finite() {
            return Err(FloodWaveError::ZeroDistance {
                upstream: upstream.to_string(),
                downstream: downstream.to_string(),
            });
        }
        Ok(Self { distance_km })
    }

    pub fn for_gauges(
        registry: &StationRegistry,
        upstream: &str,
        downstream: &str,
    ) -> Result<Self, FloodWaveError> {
        let distance = registry.distance_km(upstream, downstream)?;
        Self::new(upstream, downstream, distance)
    }

    pub fn distance_km(&self) -> f64 {
        self.distance_km
    }

    /// Slope in cm/km from a peak of `current` cm to a peak of `next` cm.
    pub fn slope(&self, current: f64, next: f64) -> f64 {
        (next - current) / self.distance_km
    }
}

/// Continuations of every vertex in `current` among `next`.
///
/// Vertices without any candidate are left out.
pub fn find_edges(
    current: &GaugeVertices,
    next: &GaugeVertices,
    params: DetectionParams,
    slopes: &SlopeCalculator,
) -> PairEdges {
    let mut edges = PairEdges::new();
    for (date, peak) in current {
        let next_dates = candidate_dates(*date, params.backward_days, params.forward_days, next);
        if next_dates.is_empty() {
            continue;
        }
        let slope_values = next_dates
            .iter()
            .filter_map(|d| next.get(d))
            .map(|next_peak| slopes.slope(peak.value, next_peak.value))
            .collect();
        edges.insert(
            *date,
            EdgeCandidates {
                next_dates,
                slopes: slope_values,
            },
        );
    }
    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PeakRecord, WaterLevel};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2006, 4, d).unwrap()
    }

    fn vertices(entries: &[(u32, f64)]) -> GaugeVertices {
        entries
            .iter()
            .map(|(d, v)| {
                (
                    day(*d),
                    PeakRecord {
                        value: *v,
                        level: WaterLevel::Low,
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_candidate_window_is_inclusive() {
        let next = vertices(&[(9, 1.0), (10, 1.0), (13, 1.0), (14, 1.0)]);
        assert_eq!(candidate_dates(day(10), 0, 3, &next), vec![day(10), day(13)]);
        assert_eq!(
            candidate_dates(day(10), 1, 4, &next),
            vec![day(9), day(10), day(13), day(14)]
        );
        assert!(candidate_dates(day(20), 0, 3, &next).is_empty());
    }

    #[test]
    fn test_oversized_window_clamps_to_calendar() {
        let next = vertices(&[(9, 1.0), (13, 1.0)]);
        assert_eq!(
            candidate_dates(day(10), 1_000_000_000, 1_000_000_000, &next),
            vec![day(9), day(13)]
        );
    }

    #[test]
    fn test_zero_distance_is_rejected() {
        assert_eq!(
            SlopeCalculator::new("1514", "1515", 0.0),
            Err(FloodWaveError::ZeroDistance {
                upstream: "1514".to_string(),
                downstream: "1515".to_string(),
            })
        );
    }

    #[test]
    fn test_slope_is_level_difference_per_km() {
        let calc = SlopeCalculator::new("1514", "1515", 50.0).unwrap();
        assert!((calc.slope(400.0, 300.0) - (-2.0)).abs() < 1e-12);
        assert!((calc.slope(300.0, 400.0) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_find_edges_pairs_dates_with_slopes() {
        let current = vertices(&[(1, 500.0), (10, 420.0), (25, 380.0)]);
        let next = vertices(&[(2, 450.0), (4, 400.0), (12, 420.0)]);
        let calc = SlopeCalculator::new("a", "b", 10.0).unwrap();
        let params = DetectionParams {
            backward_days: 0,
            forward_days: 3,
            window_radius: 2,
        };

        let edges = find_edges(&current, &next, params, &calc);
        assert_eq!(edges.len(), 2, "the peak on day 25 has no continuation");

        let first = &edges[&day(1)];
        assert_eq!(first.next_dates, vec![day(2), day(4)]);
        assert_eq!(first.slopes.len(), first.next_dates.len());
        assert!((first.slopes[0] - (-5.0)).abs() < 1e-12);
        assert!((first.slopes[1] - (-10.0)).abs() < 1e-12);

        assert_eq!(edges[&day(10)].next_dates, vec![day(12)]);
        assert!(edges[&day(10)].slopes[0].abs() < 1e-12);
    }
}
