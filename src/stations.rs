/// Station registry for the flood wave detector.
///
/// Joins the metadata table, the operating periods and the level groups into
/// one ordered list of gauges along the river, upstream first. This is the
/// single source of truth for gauge order and river km: detection walks the
/// gauges in this order and every graph node takes its river km from here.

use std::collections::HashMap;

use crate::ingest::metadata::StationMeta;
use crate::model::{FloodWaveError, GaugePair, LifeInterval};

// ---------------------------------------------------------------------------
// Station metadata
// ---------------------------------------------------------------------------

/// Metadata for a single gauge station.
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    /// Gauge registration number.
    pub id: String,
    /// Station name, when the metadata table has one.
    pub name: Option<String>,
    pub river: String,
    /// Distance from the river mouth in km. Decreases downstream.
    pub river_km: f64,
    /// Whether the gauge has a rating table. Gauges without one are kept
    /// for lookups but do not take part in detection.
    pub has_table: bool,
    /// Water level (cm) separating low and high peaks, if known.
    pub level_group: Option<f64>,
    /// Operating period, if known. Unknown means always operating.
    pub life: Option<LifeInterval>,
}

/// All stations of one river, ordered upstream to downstream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationRegistry {
    stations: Vec<Station>,
}

impl StationRegistry {
    /// Builds the registry. `meta` is re-sorted by river km descending.
    pub fn from_parts(
        meta: Vec<StationMeta>,
        lifes: HashMap<String, LifeInterval>,
        levels: HashMap<String, f64>,
    ) -> Self {
        let mut stations: Vec<Station> = meta
            .into_iter()
            .map(|m| Station {
                level_group: levels.get(&m.id).copied(),
                life: lifes.get(&m.id).copied(),
                id: m.id,
                name: m.name,
                river: m.river,
                river_km: m.river_km,
                has_table: m.has_table,
            })
            .collect();
        stations.sort_by(|a, b| b.river_km.total_cmp(&a.river_km));
        Self { stations }
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// Ids of the gauges taking part in detection, upstream first.
    pub fn gauges(&self) -> Vec<String> {
        self.stations
            .iter()
            .filter(|s| s.has_table)
            .map(|s| s.id.clone())
            .collect()
    }

    /// Ids of every station, upstream first.
    pub fn sorted_ids(&self) -> Vec<String> {
        self.stations.iter().map(|s| s.id.clone()).collect()
    }

    /// Looks up a station by id. Returns `None` if not found.
    pub fn find_station(&self, id: &str) -> Option<&Station> {
        self.stations.iter().find(|s| s.id == id)
    }

    pub fn river_km(&self, id: &str) -> Result<f64, FloodWaveError> {
        self.find_station(id)
            .map(|s| s.river_km)
            .ok_or_else(|| FloodWaveError::UnknownGauge(id.to_string()))
    }

    pub fn level_group(&self, id: &str) -> Option<f64> {
        self.find_station(id).and_then(|s| s.level_group)
    }

    pub fn life(&self, id: &str) -> Option<LifeInterval> {
        self.find_station(id).and_then(|s| s.life)
    }

    /// River distance between two gauges, positive when `upstream` really is upstream.
    pub fn distance_km(&self, upstream: &str, downstream: &str) -> Result<f64, FloodWaveError> {
        Ok(self.river_km(upstream)? - self.river_km(downstream)?)
    }

    /// Consecutive pairs of `gauges`, in the given order.
    pub fn consecutive_pairs(gauges: &[String]) -> Vec<GaugePair> {
        gauges
            .windows(2)
            .map(|w| GaugePair::new(w[0].clone(), w[1].clone()))
            .collect()
    }

    /// Keeps only the requested gauges, preserving river order. Unknown ids are an error.
    pub fn select(&self, requested: &[String]) -> Result<Vec<String>, FloodWaveError> {
        for id in requested {
            if self.find_station(id).is_none() {
                return Err(FloodWaveError::UnknownGauge(id.clone()));
            }
        }
        Ok(self
            .stations
            .iter()
            .filter(|s| requested.contains(&s.id))
            .map(|s| s.id.clone())
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
