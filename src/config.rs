//! Run configuration.
//!
//! Settings come from a TOML file (`floodwave.toml` by default). Directory
//! and log file locations can be overridden from the environment or a `.env`
//! file, which keeps machine-specific paths out of the checked-in config.
//!
//! ```toml
//! [data]
//! dir = "data"
//! river = "Tisza"
//!
//! [detection]
//! backward_days = 0
//! forward_days = 3
//! window_radius = 2
//!
//! [detection.overrides."2275"]
//! forward_days = 4
//! ```

use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::logging::LogLevel;
use crate::model::{DetectionParams, FloodWaveError};

pub const DEFAULT_CONFIG_FILE: &str = "floodwave.toml";

pub const ENV_DATA_DIR: &str = "FLOODWAVE_DATA_DIR";
pub const ENV_OUTPUT_DIR: &str = "FLOODWAVE_OUTPUT_DIR";
pub const ENV_LOG_FILE: &str = "FLOODWAVE_LOG_FILE";

/// Longest continuation window, in days, on either side of a peak.
pub const MAX_WINDOW_DAYS: i64 = 366;

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Locations and names of the input files.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DataConfig {
    pub dir: PathBuf,
    /// Daily water levels, one column per gauge.
    pub levels_file: String,
    /// Station metadata (river, river km, rating table flag).
    pub meta_file: String,
    /// Operating period of each gauge.
    pub lifetimes_file: String,
    /// Level group threshold of each gauge.
    pub level_groups_file: String,
    /// Only stations on this river take part.
    pub river: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
            levels_file: "gauge_levels.csv".to_string(),
            meta_file: "gauge_meta.csv".to_string(),
            lifetimes_file: "station_lifetimes.json".to_string(),
            level_groups_file: "level_groups.json".to_string(),
            river: "Tisza".to_string(),
        }
    }
}

impl DataConfig {
    pub fn levels_path(&self) -> PathBuf {
        self.dir.join(&self.levels_file)
    }

    pub fn meta_path(&self) -> PathBuf {
        self.dir.join(&self.meta_file)
    }

    pub fn lifetimes_path(&self) -> PathBuf {
        self.dir.join(&self.lifetimes_file)
    }

    pub fn level_groups_path(&self) -> PathBuf {
        self.dir.join(&self.level_groups_file)
    }
}

/// Per-gauge override of the continuation window.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq)]
pub struct GaugeOverride {
    pub backward_days: Option<i64>,
    pub forward_days: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectionConfig {
    pub backward_days: i64,
    pub forward_days: i64,
    pub window_radius: usize,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Restrict the run to these gauges; empty means every gauge with a rating table.
    pub gauges: Vec<String>,
    pub overrides: HashMap<String, GaugeOverride>,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        let params = DetectionParams::default();
        Self {
            backward_days: params.backward_days,
            forward_days: params.forward_days,
            window_radius: params.window_radius,
            start_date: NaiveDate::from_ymd_opt(1876, 1, 1).unwrap_or_default(),
            end_date: NaiveDate::from_ymd_opt(2019, 12, 31).unwrap_or_default(),
            gauges: Vec::new(),
            overrides: HashMap::new(),
        }
    }
}

impl DetectionConfig {
    /// Detection parameters for `gauge`, with its overrides applied.
    pub fn params_for(&self, gauge: &str) -> DetectionParams {
        let overrides = self.overrides.get(gauge).copied().unwrap_or_default();
        DetectionParams {
            backward_days: overrides.backward_days.unwrap_or(self.backward_days),
            forward_days: overrides.forward_days.unwrap_or(self.forward_days),
            window_radius: self.window_radius,
        }
    }

    /// Name of the generated folder, e.g. `generated_0_3_2`.
    pub fn folder_name(&self) -> String {
        format!(
            "generated_{}_{}_{}",
            self.backward_days, self.forward_days, self.window_radius
        )
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            timestamps: false,
        }
    }
}

/// Year range covered by the statistics, inclusive.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(default)]
pub struct YearsConfig {
    pub first: i32,
    pub last: i32,
}

impl Default for YearsConfig {
    fn default() -> Self {
        Self {
            first: 1876,
            last: 2019,
        }
    }
}

// ---------------------------------------------------------------------------
// Whole configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub data: DataConfig,
    pub detection: DetectionConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
    pub years: YearsConfig,
}

impl Config {
    /// Parses a configuration from TOML text and validates it.
    pub fn from_toml_str(text: &str) -> Result<Self, FloodWaveError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the configuration file, falling back to defaults when it does
    /// not exist, then applies environment overrides (`.env` is honoured).
    pub fn load(path: &Path) -> Result<Self, FloodWaveError> {
        dotenv::dotenv().ok();

        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path).map_err(|e| FloodWaveError::io(path, e))?;
            Self::from_toml_str(&text)?
        } else {
            Config::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Applies directory and log file overrides from `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup(ENV_DATA_DIR) {
            self.data.dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup(ENV_OUTPUT_DIR) {
            self.output.dir = PathBuf::from(dir);
        }
        if let Some(file) = lookup(ENV_LOG_FILE) {
            self.logging.file = Some(file);
        }
    }

    pub fn validate(&self) -> Result<(), FloodWaveError> {
        let detection = &self.detection;
        if detection.start_date > detection.end_date {
            return Err(FloodWaveError::Config(format!(
                "start_date {} is after end_date {}",
                detection.start_date, detection.end_date
            )));
        }
        if detection.window_radius == 0 {
            return Err(FloodWaveError::Config(
                "window_radius must be at least 1".to_string(),
            ));
        }
        let in_range = |days: i64| (0..=MAX_WINDOW_DAYS).contains(&days);
        if !in_range(detection.backward_days) || !in_range(detection.forward_days) {
            return Err(FloodWaveError::Config(format!(
                "backward_days and forward_days must be between 0 and {}",
                MAX_WINDOW_DAYS
            )));
        }
        for (gauge, o) in &detection.overrides {
            if o.backward_days.is_some_and(|d| !in_range(d)) || o.forward_days.is_some_and(|d| !in_range(d)) {
                return Err(FloodWaveError::Config(format!(
                    "continuation window for gauge {} must be between 0 and {} days",
                    gauge, MAX_WINDOW_DAYS
                )));
            }
        }
        if self.years.first > self.years.last {
            return Err(FloodWaveError::Config(format!(
                "years.first {} is after years.last {}",
                self.years.first, self.years.last
            )));
        }
        self.log_level()?;
        Ok(())
    }

    pub fn log_level(&self) -> Result<LogLevel, FloodWaveError> {
        self.logging
            .level
            .parse()
            .map_err(|e| FloodWaveError::Config(format!("[logging] level: {}", e)))
    }

    /// Root of the generated files of this parameter set.
    pub fn generated_dir(&self) -> PathBuf {
        self.output.dir.join(self.detection.folder_name())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
