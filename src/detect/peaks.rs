//! Local peak detection on a gauge's water level series.

use chrono::NaiveDate;

use crate::detect::levels;
use crate::logging::{self, Stage};
use crate::model::{GaugeVertices, PeakRecord};

/// Flags the local peaks of `values` for a centered window of `radius`.
///
/// Index `k` is a peak when, for every shift `s` in `1..=radius`, it is
/// strictly greater than `values[k - s]` and not smaller than
/// `values[k + s]`. Both neighbours must exist, so the first and last
/// `radius` entries are never peaks. A plateau is reported once, at its
/// first day.
pub fn local_peak_flags(values: &[f64], radius: usize) -> Vec<bool> {
    let n = values.len();
    (0..n)
        .map(|k| {
            (1..=radius).all(|s| {
                k >= s && k + s < n && values[k] > values[k - s] && values[k] >= values[k + s]
            })
        })
        .collect()
}

/// Finds the candidate vertices of one gauge.
///
/// `series` is the gauge's (date, value) series with missing days already
/// dropped, so window neighbours are neighbouring observations. Every peak
/// is classified against `threshold`.
pub fn find_vertices(
    gauge: &str,
    series: &[(NaiveDate, f64)],
    radius: usize,
    threshold: Option<f64>,
) -> GaugeVertices {
    if series.len() < radius + 1 {
        logging::info(Stage::Vertices, Some(gauge), "No peaks found");
        return GaugeVertices::new();
    }

    let values: Vec<f64> = series.iter().map(|(_, v)| *v).collect();
    let flags = local_peak_flags(&values, radius);

    let vertices: GaugeVertices = series
        .iter()
        .zip(flags)
        .filter(|(_, is_peak)| *is_peak)
        .map(|((date, value), _)| {
            (
                *date,
                PeakRecord {
                    value: *value,
                    level: levels::classify(*value, threshold),
                },
            )
        })
        .collect();

    logging::debug(
        Stage::Vertices,
        Some(gauge),
        &format!("{} peaks in {} observations", vertices.len(), series.len()),
    );
    vertices
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WaterLevel;

    fn series(values: &[f64]) -> Vec<(NaiveDate, f64)> {
        let start = NaiveDate::from_ymd_opt(2006, 3, 1).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| (start + chrono::Duration::days(i as i64), *v))
            .collect()
    }

    #[test]
    fn test_single_peak_is_flagged() {
        let flags = local_peak_flags(&[1.0, 2.0, 5.0, 3.0, 1.0], 2);
        assert_eq!(flags, vec![false, false, true, false, false]);
    }

    #[test]
    fn test_plateau_is_flagged_at_first_day() {
        let flags = local_peak_flags(&[1.0, 2.0, 5.0, 5.0, 3.0, 1.0], 2);
        assert_eq!(flags, vec![false, false, true, false, false, false]);
    }

    #[test]
    fn test_edges_of_series_are_never_peaks() {
        let flags = local_peak_flags(&[9.0, 1.0, 1.0, 1.0, 9.0], 1);
        assert!(!flags[0] && !flags[4]);
    }

    #[test]
    fn test_radius_requires_every_shift() {
        // 4.0 beats its direct neighbours but not the value two days before.
        let flags = local_peak_flags(&[6.0, 3.0, 4.0, 2.0, 1.0], 2);
        assert!(flags.iter().all(|f| !f), "got {:?}", flags);
        let flags = local_peak_flags(&[6.0, 3.0, 4.0, 2.0, 1.0], 1);
        assert_eq!(flags, vec![false, false, true, false, false]);
    }

    #[test]
    fn test_find_vertices_classifies_peaks() {
        let data = series(&[100.0, 200.0, 300.0, 250.0, 100.0, 150.0, 180.0, 120.0, 90.0]);
        let vertices = find_vertices("1514", &data, 2, Some(250.0));
        assert_eq!(vertices.len(), 2);
        let dates: Vec<_> = vertices.keys().copied().collect();
        assert_eq!(dates, vec![data[2].0, data[6].0]);
        assert_eq!(vertices[&data[2].0].level, WaterLevel::High);
        assert_eq!(vertices[&data[6].0].level, WaterLevel::Low);
    }

    #[test]
    fn test_short_series_has_no_vertices() {
        assert!(find_vertices("1514", &series(&[1.0, 5.0]), 2, None).is_empty());
        assert!(find_vertices("1514", &[], 2, None).is_empty());
    }
}
