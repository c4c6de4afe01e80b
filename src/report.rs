//! CSV output of analysis results.
//!
//! Each writer takes any `io::Write`, so the CLI can target stdout or a file.
//! Missing values are written as empty cells.

use std::collections::BTreeMap;
use std::io::Write;

use crate::analysis::descriptive::Summary;
use crate::analysis::extractor::Wave;
use crate::analysis::graph_analysis::FloodMapEdge;
use crate::analysis::statistics::{GaugeLevelsOfYear, MovingAverage, PeriodRatio, PeriodSlopes, YearlyStatistics};
use crate::model::{format_date, FloodWaveError, NodeKey};

const SUMMARY_HEADERS: [&str; 5] = ["min", "max", "mean", "median", "std"];

fn opt(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn summary_cells(summary: Option<&Summary>) -> Vec<String> {
    match summary {
        Some(s) => [s.min, s.max, s.mean, s.median, s.std].iter().map(f64::to_string).collect(),
        None => vec![String::new(); SUMMARY_HEADERS.len()],
    }
}

fn period_label(start: chrono::NaiveDate, end: chrono::NaiveDate) -> String {
    format!("{}_{}", format_date(start), format_date(end))
}

fn node_label(key: &NodeKey) -> String {
    format!("{}@{}", key.gauge, format_date(key.date))
}

pub fn write_yearly_statistics<W: Write>(out: W, rows: &[YearlyStatistics]) -> Result<(), FloodWaveError> {
    let mut writer = csv::Writer::from_writer(out);
    let headers = [
        "year",
        "flood_waves",
        "low",
        "high",
        "min_velocity",
        "max_velocity",
        "mean_velocity",
        "median_velocity",
        "std_velocity",
    ];
    writer.write_record(&headers)?;

    for row in rows {
        let mut record = vec![
            row.year.to_string(),
            row.flood_waves.to_string(),
            row.low.to_string(),
            row.high.to_string(),
        ];
        record.extend(summary_cells(row.velocity.as_ref()));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// One row per year, a low and a high column per gauge.
pub fn write_low_high<W: Write>(out: W, gauges: &[String], rows: &[GaugeLevelsOfYear]) -> Result<(), FloodWaveError> {
    let mut writer = csv::Writer::from_writer(out);
    let mut headers = vec!["year".to_string()];
    for gauge in gauges {
        headers.push(format!("{} (low)", gauge));
        headers.push(format!("{} (high)", gauge));
    }
    writer.write_record(&headers)?;

    for row in rows {
        let mut record = vec![row.year.to_string()];
        for gauge in gauges {
            let count = row.counts.get(gauge).copied().unwrap_or_default();
            record.push(count.low.to_string());
            record.push(count.high.to_string());
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_period_ratios<W: Write>(out: W, rows: &[PeriodRatio]) -> Result<(), FloodWaveError> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(["period", "ratio"])?;
    for row in rows {
        writer.write_record([period_label(row.start, row.end), opt(row.ratio)])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_period_slopes<W: Write>(out: W, rows: &[PeriodSlopes]) -> Result<(), FloodWaveError> {
    let mut writer = csv::Writer::from_writer(out);
    let mut headers = vec!["period", "count"];
    headers.extend(SUMMARY_HEADERS);
    writer.write_record(&headers)?;
    for row in rows {
        let count = row.summary.map(|s| s.count).unwrap_or(0);
        let mut record = vec![period_label(row.start, row.end), count.to_string()];
        record.extend(summary_cells(row.summary.as_ref()));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Period slopes of every gauge pair, the pair in the first column.
pub fn write_pair_slopes<W: Write>(out: W, pairs: &BTreeMap<String, Vec<PeriodSlopes>>) -> Result<(), FloodWaveError> {
    let mut writer = csv::Writer::from_writer(out);
    let mut headers = vec!["pair", "period", "count"];
    headers.extend(SUMMARY_HEADERS);
    writer.write_record(&headers)?;
    for (pair, rows) in pairs {
        for row in rows {
            let count = row.summary.map(|s| s.count).unwrap_or(0);
            let mut record = vec![pair.clone(), period_label(row.start, row.end), count.to_string()];
            record.extend(summary_cells(row.summary.as_ref()));
            writer.write_record(&record)?;
        }
    }
    writer.flush()?;
    Ok(())
}

pub fn write_moving_average<W: Write>(out: W, rows: &[MovingAverage]) -> Result<(), FloodWaveError> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(["year", "mean_velocity"])?;
    for row in rows {
        writer.write_record([row.year.to_string(), opt(row.mean_velocity)])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_wave_counts<W: Write>(out: W, rows: &[(i32, usize)]) -> Result<(), FloodWaveError> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(["year", "flood_waves"])?;
    for (year, count) in rows {
        writer.write_record([year.to_string(), count.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

/// One row per flood wave: its ends, length in gauges and travel days.
pub fn write_waves<W: Write>(out: W, waves: &[Wave]) -> Result<(), FloodWaveError> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(["start", "end", "gauges", "days", "path"])?;
    for wave in waves {
        let (Some(first), Some(last)) = (wave.first(), wave.last()) else {
            continue;
        };
        let path: Vec<String> = wave.iter().map(node_label).collect();
        writer.write_record([
            node_label(first),
            node_label(last),
            wave.len().to_string(),
            (last.date - first.date).num_days().to_string(),
            path.join(" "),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_flood_map<W: Write>(out: W, edges: &[FloodMapEdge]) -> Result<(), FloodWaveError> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(["from", "to", "paths"])?;
    for edge in edges {
        writer.write_record([node_label(&edge.from), node_label(&edge.to), edge.paths.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

/// Start, end and size of each branch.
pub fn write_branches<W: Write>(out: W, branches: &[(NodeKey, NodeKey, usize)]) -> Result<(), FloodWaveError> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(["start", "end", "nodes"])?;
    for (start, end, nodes) in branches {
        writer.write_record([node_label(start), node_label(end), nodes.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_velocities<W: Write>(out: W, velocities: &[f64]) -> Result<(), FloodWaveError> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(["velocity_km_per_day"])?;
    for v in velocities {
        writer.write_record([v.to_string()])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn written(f: impl FnOnce(&mut Vec<u8>) -> Result<(), FloodWaveError>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_yearly_statistics_leave_missing_velocity_empty() {
        let rows = vec![YearlyStatistics {
            year: 1900,
            flood_waves: 0,
            low: 3,
            high: 1,
            velocity: None,
        }];
        let text = written(|buf| write_yearly_statistics(buf, &rows));
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("year,flood_waves,low,high,min_velocity,max_velocity,mean_velocity,median_velocity,std_velocity")
        );
        assert_eq!(lines.next(), Some("1900,0,3,1,,,,,"));
    }

    #[test]
    fn test_waves_and_ratios() {
        let waves = vec![vec![
            NodeKey::new("a", date(2006, 4, 1)),
            NodeKey::new("b", date(2006, 4, 3)),
        ]];
        let text = written(|buf| write_waves(buf, &waves));
        assert!(text.contains("a@2006-04-01,b@2006-04-03,2,2,a@2006-04-01 b@2006-04-03"), "{}", text);

        let ratios = vec![PeriodRatio {
            start: date(1900, 1, 1),
            end: date(1909, 12, 31),
            ratio: Some(0.25),
        }];
        let text = written(|buf| write_period_ratios(buf, &ratios));
        assert!(text.ends_with("1900-01-01_1909-12-31,0.25\n"), "{}", text);
    }

    #[test]
    fn test_low_high_has_two_columns_per_gauge() {
        let mut counts = BTreeMap::new();
        counts.insert("a".to_string(), crate::store::LevelCount { low: 2, high: 1 });
        let rows = vec![GaugeLevelsOfYear { year: 2000, counts }];
        let gauges = vec!["a".to_string(), "b".to_string()];
        let text = written(|buf| write_low_high(buf, &gauges, &rows));
        assert_eq!(text, "year,a (low),a (high),b (low),b (high)\n2000,2,1,0,0\n");
    }
}
