/// Station metadata readers.
///
/// Three files describe the gauges besides their water levels:
/// - a `;`-separated metadata table (first column gauge id, then `river`,
///   `river_km`, `h_table` and optionally `station_name`),
/// - a JSON map of operating periods `{gauge: {"start": .., "end": ..}}`,
/// - a JSON map of level group thresholds `{gauge: cm}`.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use crate::model::{FloodWaveError, LifeInterval};

/// One row of the metadata table.
#[derive(Debug, Clone, PartialEq)]
pub struct StationMeta {
    pub id: String,
    pub name: Option<String>,
    pub river: String,
    pub river_km: f64,
    /// Whether the gauge has a rating table; only these take part in detection.
    pub has_table: bool,
}

fn column(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.trim() == name)
}

/// Reads the metadata rows of `river`, ordered upstream first (river km descending).
pub fn parse_station_meta<R: Read>(reader: R, river: &str) -> Result<Vec<StationMeta>, FloodWaveError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_reader(reader);

    let headers = csv_reader.headers()?.clone();
    let river_idx = column(&headers, "river")
        .ok_or_else(|| FloodWaveError::Parse("metadata has no 'river' column".to_string()))?;
    let km_idx = column(&headers, "river_km")
        .ok_or_else(|| FloodWaveError::Parse("metadata has no 'river_km' column".to_string()))?;
    let table_idx = column(&headers, "h_table")
        .ok_or_else(|| FloodWaveError::Parse("metadata has no 'h_table' column".to_string()))?;
    let name_idx = column(&headers, "station_name");

    let mut stations = Vec::new();
    for record in csv_reader.records() {
        let record = record?;
        let id = record.get(0).unwrap_or("").trim().to_string();
        if id.is_empty() {
            continue;
        }
        let row_river = record.get(river_idx).unwrap_or("").trim();
        if row_river != river {
            continue;
        }
        let raw_km = record.get(km_idx).unwrap_or("").trim();
        let river_km = raw_km.parse::<f64>().map_err(|_| {
            FloodWaveError::Parse(format!("gauge {}: invalid river_km '{}'", id, raw_km))
        })?;
        let has_table = record
            .get(table_idx)
            .map(|raw| {
                let raw = raw.trim();
                !raw.is_empty() && !raw.eq_ignore_ascii_case("nan")
            })
            .unwrap_or(false);
        let name = name_idx
            .and_then(|idx| record.get(idx))
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty());

        stations.push(StationMeta {
            id,
            name,
            river: row_river.to_string(),
            river_km,
            has_table,
        });
    }

    stations.sort_by(|a, b| b.river_km.total_cmp(&a.river_km));
    Ok(stations)
}

pub fn read_station_meta(path: &Path, river: &str) -> Result<Vec<StationMeta>, FloodWaveError> {
    if !path.exists() {
        return Err(FloodWaveError::MissingFile(path.display().to_string()));
    }
    let file = std::fs::File::open(path).map_err(|e| FloodWaveError::io(path, e))?;
    parse_station_meta(file, river)
}

#[derive(Deserialize)]
struct RawLife {
    start: String,
    end: String,
}

/// Parses the operating periods. Dates may carry a time part.
pub fn parse_life_intervals(text: &str) -> Result<HashMap<String, LifeInterval>, FloodWaveError> {
    let raw: HashMap<String, RawLife> = serde_json::from_str(text)?;
    raw.into_iter()
        .map(|(gauge, life)| {
            let interval = LifeInterval {
                start: crate::model::parse_date(&life.start)?,
                end: crate::model::parse_date(&life.end)?,
            };
            Ok((gauge, interval))
        })
        .collect()
}

pub fn read_life_intervals(path: &Path) -> Result<HashMap<String, LifeInterval>, FloodWaveError> {
    let text = read_text(path)?;
    parse_life_intervals(&text)
}

pub fn parse_level_groups(text: &str) -> Result<HashMap<String, f64>, FloodWaveError> {
    Ok(serde_json::from_str(text)?)
}

pub fn read_level_groups(path: &Path) -> Result<HashMap<String, f64>, FloodWaveError> {
    let text = read_text(path)?;
    parse_level_groups(&text)
}

fn read_text(path: &Path) -> Result<String, FloodWaveError> {
    if !path.exists() {
        return Err(FloodWaveError::MissingFile(path.display().to_string()));
    }
    std::fs::read_to_string(path).map_err(|e| FloodWaveError::io(path, e))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
