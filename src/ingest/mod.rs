/// Input data loading.
///
/// Submodules:
/// - `gauge_csv`: daily water levels, one column per gauge.
/// - `metadata`: station metadata, operating periods and level groups.

pub mod gauge_csv;
pub mod metadata;

use std::collections::HashMap;

use crate::config::DataConfig;
use crate::logging::{self, Stage};
use crate::model::FloodWaveError;
use crate::stations::StationRegistry;

pub use gauge_csv::GaugeTable;

/// Everything the detection reads from the data directory.
#[derive(Debug, Clone)]
pub struct FloodWaveData {
    pub table: GaugeTable,
    pub registry: StationRegistry,
}

/// Loads the station registry: metadata, operating periods and level groups.
///
/// The operating periods and level groups are optional: when a file is
/// missing every gauge counts as always operating, or as having no level
/// group, and a warning is logged.
pub fn load_registry(config: &DataConfig) -> Result<StationRegistry, FloodWaveError> {
    let meta = metadata::read_station_meta(&config.meta_path(), &config.river)?;
    logging::info(
        Stage::Ingest,
        None,
        &format!("Loaded metadata of {} stations on the {}", meta.len(), config.river),
    );

    let lifes = match metadata::read_life_intervals(&config.lifetimes_path()) {
        Ok(lifes) => lifes,
        Err(FloodWaveError::MissingFile(path)) => {
            logging::warn(Stage::Ingest, None, &format!("{} not found, assuming every gauge always operated", path));
            HashMap::new()
        }
        Err(e) => return Err(e),
    };

    let levels = match metadata::read_level_groups(&config.level_groups_path()) {
        Ok(levels) => levels,
        Err(FloodWaveError::MissingFile(path)) => {
            logging::warn(Stage::Ingest, None, &format!("{} not found, every peak will be classed low", path));
            HashMap::new()
        }
        Err(e) => return Err(e),
    };

    Ok(StationRegistry::from_parts(meta, lifes, levels))
}

impl FloodWaveData {
    /// Loads all input files named in `config`.
    pub fn load(config: &DataConfig) -> Result<Self, FloodWaveError> {
        let registry = load_registry(config)?;
        let table = gauge_csv::read_gauge_table(&config.levels_path())?;
        logging::info(
            Stage::Ingest,
            None,
            &format!("Loaded {} days of water levels for {} gauges", table.dates.len(), table.columns.len()),
        );
        Ok(Self { table, registry })
    }
}
