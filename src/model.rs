/// Core data types for the flood wave detector.
///
/// This module defines the shared domain model imported by all other modules:
/// peaks found at a gauge, their continuations at the next gauge downstream,
/// the nodes and edges of the flood wave graph, and the crate error type.
/// It contains no I/O.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Date handling
// ---------------------------------------------------------------------------

/// Date format used in every data file and generated file name.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Parses a `YYYY-MM-DD` date. A trailing time part (`YYYY-MM-DD HH:MM:SS`
/// or ISO `T` separated) is accepted and ignored.
pub fn parse_date(raw: &str) -> Result<NaiveDate, FloodWaveError> {
    let trimmed = raw.trim();
    let day_part = trimmed
        .split(|c| c == ' ' || c == 'T')
        .next()
        .unwrap_or(trimmed);
    NaiveDate::parse_from_str(day_part, DATE_FORMAT)
        .map_err(|_| FloodWaveError::InvalidDate(raw.to_string()))
}

/// Formats a date the way file names and JSON keys expect it.
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

// ---------------------------------------------------------------------------
// Peak (vertex) types
// ---------------------------------------------------------------------------

/// Water level class of a peak relative to the gauge's level group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaterLevel {
    Low,
    High,
}

impl std::fmt::Display for WaterLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WaterLevel::Low => write!(f, "low"),
            WaterLevel::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for WaterLevel {
    type Err = FloodWaveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(WaterLevel::Low),
            "high" => Ok(WaterLevel::High),
            other => Err(FloodWaveError::Config(format!(
                "water level must be either high or low, got '{}'",
                other
            ))),
        }
    }
}

/// A local peak of a gauge's time series: a candidate vertex of the graph.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeakRecord {
    pub value: f64,
    pub level: WaterLevel,
}

/// All candidate vertices of one gauge, keyed by date.
pub type GaugeVertices = BTreeMap<NaiveDate, PeakRecord>;

/// Continuations of one peak at the next gauge downstream.
///
/// `slopes[i]` belongs to `next_dates[i]` and is measured in cm/km.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeCandidates {
    pub next_dates: Vec<NaiveDate>,
    pub slopes: Vec<f64>,
}

/// Edge candidates of one gauge pair, keyed by the upstream peak's date.
pub type PairEdges = BTreeMap<NaiveDate, EdgeCandidates>;

/// The period in which a gauge was operating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifeInterval {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl LifeInterval {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

// ---------------------------------------------------------------------------
// Gauge pairs
// ---------------------------------------------------------------------------

/// Two neighbouring gauges, upstream first. Rendered as `"<upstream>_<downstream>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GaugePair {
    pub upstream: String,
    pub downstream: String,
}

impl GaugePair {
    pub fn new(upstream: impl Into<String>, downstream: impl Into<String>) -> Self {
        Self {
            upstream: upstream.into(),
            downstream: downstream.into(),
        }
    }

    /// Parses the `"<upstream>_<downstream>"` form used in file names.
    pub fn parse(raw: &str) -> Result<Self, FloodWaveError> {
        match raw.split_once('_') {
            Some((up, down)) if !up.is_empty() && !down.is_empty() => Ok(Self::new(up, down)),
            _ => Err(FloodWaveError::Parse(format!("invalid gauge pair '{}'", raw))),
        }
    }
}

impl std::fmt::Display for GaugePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.upstream, self.downstream)
    }
}

// ---------------------------------------------------------------------------
// Graph types
// ---------------------------------------------------------------------------

/// Identity of a graph node: a peak at a gauge on a day.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKey {
    pub gauge: String,
    pub date: NaiveDate,
}

impl NodeKey {
    pub fn new(gauge: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            gauge: gauge.into(),
            date,
        }
    }
}

impl std::fmt::Display for NodeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.gauge, format_date(self.date))
    }
}

/// A node of the flood wave graph, carrying what analysis needs without
/// going back to the metadata: position on the river and the peak itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveNode {
    pub gauge: String,
    pub date: NaiveDate,
    pub river_km: f64,
    pub value: f64,
    pub level: WaterLevel,
}

impl WaveNode {
    pub fn key(&self) -> NodeKey {
        NodeKey::new(self.gauge.clone(), self.date)
    }
}

/// Edge payload: the slope between the two peaks in cm/km, when known.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WaveEdge {
    pub slope: Option<f64>,
}

// ---------------------------------------------------------------------------
// Detection parameters
// ---------------------------------------------------------------------------

/// Window parameters of the detection for one gauge.
///
/// `backward_days` (alpha) and `forward_days` (beta) bound how far before and
/// after a peak the continuation at the next gauge may lie. `window_radius`
/// (delta) is the half width of the centered peak window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionParams {
    pub backward_days: i64,
    pub forward_days: i64,
    pub window_radius: usize,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            backward_days: 0,
            forward_days: 3,
            window_radius: 2,
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise while loading data, detecting waves or analysing
/// the resulting graph.
#[derive(Debug, PartialEq)]
pub enum FloodWaveError {
    /// A file could not be read or written.
    Io { path: String, message: String },
    /// A data or generated file could not be parsed.
    Parse(String),
    /// The configuration is invalid.
    Config(String),
    /// A required data or generated file does not exist.
    MissingFile(String),
    /// The gauge is not in the station registry.
    UnknownGauge(String),
    /// A date string is not in `YYYY-MM-DD` form.
    InvalidDate(String),
    /// Two neighbouring gauges share the same river km, so no slope exists.
    ZeroDistance { upstream: String, downstream: String },
    /// An operation that needs a DAG got a graph with a cycle.
    CyclicGraph,
}

impl FloodWaveError {
    pub fn io(path: impl AsRef<std::path::Path>, err: std::io::Error) -> Self {
        FloodWaveError::Io {
            path: path.as_ref().display().to_string(),
            message: err.to_string(),
        }
    }
}

impl std::fmt::Display for FloodWaveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FloodWaveError::Io { path, message } => write!(f, "I/O error on {}: {}", path, message),
            FloodWaveError::Parse(msg) => write!(f, "Parse error: {}", msg),
            FloodWaveError::Config(msg) => write!(f, "Configuration error: {}", msg),
            FloodWaveError::MissingFile(path) => write!(f, "Missing file: {}", path),
            FloodWaveError::UnknownGauge(gauge) => write!(f, "Unknown gauge: {}", gauge),
            FloodWaveError::InvalidDate(raw) => write!(f, "Invalid date: {}", raw),
            FloodWaveError::ZeroDistance { upstream, downstream } => write!(
                f,
                "Gauges {} and {} are at the same river km",
                upstream, downstream
            ),
            FloodWaveError::CyclicGraph => write!(f, "Graph contains a cycle"),
        }
    }
}

impl std::error::Error for FloodWaveError {}

impl From<std::io::Error> for FloodWaveError {
    fn from(err: std::io::Error) -> Self {
        FloodWaveError::Io {
            path: String::from("<unknown>"),
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for FloodWaveError {
    fn from(err: serde_json::Error) -> Self {
        FloodWaveError::Parse(err.to_string())
    }
}

impl From<csv::Error> for FloodWaveError {
    fn from(err: csv::Error) -> Self {
        FloodWaveError::Parse(err.to_string())
    }
}

impl From<toml::de::Error> for FloodWaveError {
    fn from(err: toml::de::Error) -> Self {
        FloodWaveError::Config(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
