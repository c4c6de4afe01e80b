/// Daily water level table reader.
///
/// The table is a `;`-separated CSV: the first column is a row index and is
/// ignored, a `Date` column holds the day, and every other column holds the
/// water levels of one gauge (cm). Cells that are empty or do not parse as a
/// number count as missing.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use crate::model::{parse_date, FloodWaveError};

const DATE_COLUMN: &str = "Date";

/// Water levels of every gauge, aligned on a common date column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GaugeTable {
    pub dates: Vec<NaiveDate>,
    pub columns: BTreeMap<String, Vec<Option<f64>>>,
}

impl GaugeTable {
    /// Gauge ids present in the table.
    pub fn gauges(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn has_gauge(&self, gauge: &str) -> bool {
        self.columns.contains_key(gauge)
    }

    /// The (date, value) series of `gauge` between `start` and `end`
    /// inclusive, with missing values dropped, in date order.
    ///
    /// Returns `UnknownGauge` when the table has no column for the gauge.
    pub fn series(
        &self,
        gauge: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<(NaiveDate, f64)>, FloodWaveError> {
        let column = self
            .columns
            .get(gauge)
            .ok_or_else(|| FloodWaveError::UnknownGauge(gauge.to_string()))?;

        let mut series: Vec<(NaiveDate, f64)> = self
            .dates
            .iter()
            .zip(column.iter())
            .filter(|(date, _)| start <= **date && **date <= end)
            .filter_map(|(date, value)| value.map(|v| (*date, v)))
            .collect();
        series.sort_by_key(|(date, _)| *date);
        Ok(series)
    }
}

/// Parses one cell; anything that is not a finite number is missing.
fn parse_level(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Reads a gauge table from any reader.
pub fn parse_gauge_table<R: Read>(reader: R) -> Result<GaugeTable, FloodWaveError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let date_idx = headers
        .iter()
        .position(|h| h.trim() == DATE_COLUMN)
        .ok_or_else(|| FloodWaveError::Parse(format!("missing '{}' column", DATE_COLUMN)))?;

    // Column 0 is the row index unless it is the date itself.
    let gauge_columns: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx != date_idx && *idx != 0)
        .map(|(idx, name)| (idx, name.trim().to_string()))
        .filter(|(_, name)| !name.is_empty())
        .collect();

    let mut table = GaugeTable::default();
    for (_, name) in &gauge_columns {
        table.columns.insert(name.clone(), Vec::new());
    }

    for (line, record) in csv_reader.records().enumerate() {
        let record = record?;
        let raw_date = record.get(date_idx).unwrap_or("");
        if raw_date.trim().is_empty() {
            continue;
        }
        let date = parse_date(raw_date).map_err(|_| {
            FloodWaveError::Parse(format!("row {}: invalid date '{}'", line + 2, raw_date))
        })?;
        table.dates.push(date);

        for (idx, name) in &gauge_columns {
            let value = record.get(*idx).and_then(parse_level);
            if let Some(column) = table.columns.get_mut(name) {
                column.push(value);
            }
        }
    }

    Ok(table)
}

/// Reads the gauge table at `path`.
pub fn read_gauge_table(path: &Path) -> Result<GaugeTable, FloodWaveError> {
    if !path.exists() {
        return Err(FloodWaveError::MissingFile(path.display().to_string()));
    }
    let file = std::fs::File::open(path).map_err(|e| FloodWaveError::io(path, e))?;
    parse_gauge_table(file)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
