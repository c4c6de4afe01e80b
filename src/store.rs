//! Generated file layout.
//!
//! Everything a detection run produces lives under one folder per parameter
//! set, `generated_<alpha>_<beta>_<delta>`:
//!
//! ```text
//! find_vertices/<gauge>.json          date -> {value, level}
//! find_edges/<up>_<down>.json         date -> {next_dates, slopes}
//! find_edges/vertex_pairs.json        pair -> date -> {next_dates, slopes}
//! build_graph/<up>_<down>/<date>.json tree rooted at the upstream peak
//! joined_graph.json                   last composed graph
//! ```
//!
//! Vertex and edge files are merged on every write: dates already on disk
//! are kept unless the new data has the same date.

use chrono::NaiveDate;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::detect::levels;
use crate::graph::GraphDocument;
use crate::logging::{self, Stage};
use crate::model::{parse_date, FloodWaveError, GaugePair, GaugeVertices, PairEdges};

const VERTICES_DIR: &str = "find_vertices";
const EDGES_DIR: &str = "find_edges";
const GRAPH_DIR: &str = "build_graph";
const VERTEX_PAIRS_FILE: &str = "vertex_pairs";
const JOINED_GRAPH_FILE: &str = "joined_graph.json";

/// Edge candidates of every gauge pair, keyed by `"<up>_<down>"`.
pub type VertexPairs = BTreeMap<String, PairEdges>;

/// Low and high vertex counts of one gauge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LevelCount {
    pub low: usize,
    pub high: usize,
}

impl LevelCount {
    pub fn total(&self) -> usize {
        self.low + self.high
    }
}

// ============================================================================
// JSON helpers
// ============================================================================

pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), FloodWaveError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| FloodWaveError::io(parent, e))?;
    }
    let text = serde_json::to_string_pretty(value)?;
    std::fs::write(path, text).map_err(|e| FloodWaveError::io(path, e))
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, FloodWaveError> {
    if !path.exists() {
        return Err(FloodWaveError::MissingFile(path.display().to_string()));
    }
    let text = std::fs::read_to_string(path).map_err(|e| FloodWaveError::io(path, e))?;
    serde_json::from_str(&text)
        .map_err(|e| FloodWaveError::Parse(format!("{}: {}", path.display(), e)))
}

/// Writes `update` to `path`, merged over whatever map the file already holds.
pub fn save_or_update<K, V>(path: &Path, update: &BTreeMap<K, V>) -> Result<(), FloodWaveError>
where
    K: Ord + Clone + Serialize + DeserializeOwned,
    V: Clone + Serialize + DeserializeOwned,
{
    let mut merged: BTreeMap<K, V> = if path.exists() {
        read_json(path)?
    } else {
        BTreeMap::new()
    };
    merged.extend(update.iter().map(|(k, v)| (k.clone(), v.clone())));
    write_json(path, &merged)
}

// ============================================================================
// Store
// ============================================================================

/// The generated folder of one parameter set.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedStore {
    root: PathBuf,
}

impl GeneratedStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates the folder and its sub folders.
    pub fn create_layout(&self) -> Result<(), FloodWaveError> {
        for dir in [VERTICES_DIR, EDGES_DIR, GRAPH_DIR] {
            let path = self.root.join(dir);
            std::fs::create_dir_all(&path).map_err(|e| FloodWaveError::io(&path, e))?;
        }
        Ok(())
    }

    pub fn vertex_path(&self, gauge: &str) -> PathBuf {
        self.root.join(VERTICES_DIR).join(format!("{}.json", gauge))
    }

    pub fn edge_path(&self, pair: &GaugePair) -> PathBuf {
        self.root.join(EDGES_DIR).join(format!("{}.json", pair))
    }

    pub fn vertex_pairs_path(&self) -> PathBuf {
        self.root.join(EDGES_DIR).join(format!("{}.json", VERTEX_PAIRS_FILE))
    }

    pub fn tree_dir(&self, pair: &GaugePair) -> PathBuf {
        self.root.join(GRAPH_DIR).join(pair.to_string())
    }

    pub fn tree_path(&self, pair: &GaugePair, date: NaiveDate) -> PathBuf {
        self.tree_dir(pair).join(format!("{}.json", crate::model::format_date(date)))
    }

    pub fn joined_graph_path(&self) -> PathBuf {
        self.root.join(JOINED_GRAPH_FILE)
    }

    // ---- vertices ----------------------------------------------------------

    pub fn save_vertices(&self, gauge: &str, vertices: &GaugeVertices) -> Result<(), FloodWaveError> {
        save_or_update(&self.vertex_path(gauge), vertices)
    }

    pub fn read_vertices(&self, gauge: &str) -> Result<GaugeVertices, FloodWaveError> {
        read_json(&self.vertex_path(gauge))
    }

    /// Like `read_vertices`, but a gauge that never got a file has no vertices.
    pub fn read_vertices_or_empty(&self, gauge: &str) -> Result<GaugeVertices, FloodWaveError> {
        match self.read_vertices(gauge) {
            Err(FloodWaveError::MissingFile(_)) => Ok(GaugeVertices::new()),
            other => other,
        }
    }

    // ---- edges -------------------------------------------------------------

    pub fn save_edges(&self, pair: &GaugePair, edges: &PairEdges) -> Result<(), FloodWaveError> {
        save_or_update(&self.edge_path(pair), edges)
    }

    pub fn read_edges(&self, pair: &GaugePair) -> Result<PairEdges, FloodWaveError> {
        read_json(&self.edge_path(pair))
    }

    /// Merges `pairs` into `vertex_pairs.json`, date by date within each pair.
    pub fn update_vertex_pairs(&self, pairs: &VertexPairs) -> Result<(), FloodWaveError> {
        if pairs.is_empty() {
            return Ok(());
        }
        let path = self.vertex_pairs_path();
        let mut merged: VertexPairs = if path.exists() {
            read_json(&path)?
        } else {
            VertexPairs::new()
        };
        for (pair, edges) in pairs {
            merged
                .entry(pair.clone())
                .or_default()
                .extend(edges.iter().map(|(d, e)| (*d, e.clone())));
        }
        write_json(&path, &merged)
    }

    pub fn read_vertex_pairs(&self) -> Result<VertexPairs, FloodWaveError> {
        read_json(&self.vertex_pairs_path())
    }

    // ---- trees -------------------------------------------------------------

    pub fn write_tree(&self, pair: &GaugePair, date: NaiveDate, doc: &GraphDocument) -> Result<(), FloodWaveError> {
        write_json(&self.tree_path(pair, date), doc)
    }

    /// Gauge pairs that have a tree folder, sorted by name.
    pub fn tree_pairs(&self) -> Result<Vec<GaugePair>, FloodWaveError> {
        let dir = self.root.join(GRAPH_DIR);
        if !dir.exists() {
            return Err(FloodWaveError::MissingFile(dir.display().to_string()));
        }
        let mut pairs = Vec::new();
        for entry in std::fs::read_dir(&dir).map_err(|e| FloodWaveError::io(&dir, e))? {
            let entry = entry.map_err(|e| FloodWaveError::io(&dir, e))?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            match GaugePair::parse(&name) {
                Ok(pair) => pairs.push(pair),
                Err(_) => logging::warn(
                    Stage::Graph,
                    None,
                    &format!("Ignoring unexpected folder {}", entry.path().display()),
                ),
            }
        }
        pairs.sort();
        Ok(pairs)
    }

    /// Every tree of `pair` with its root date, in date order.
    pub fn read_tree_files(&self, pair: &GaugePair) -> Result<Vec<(NaiveDate, GraphDocument)>, FloodWaveError> {
        let dir = self.tree_dir(pair);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut trees = Vec::new();
        for entry in std::fs::read_dir(&dir).map_err(|e| FloodWaveError::io(&dir, e))? {
            let path = entry.map_err(|e| FloodWaveError::io(&dir, e))?.path();
            let Some(stem) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_suffix(".json"))
            else {
                continue;
            };
            let date = parse_date(stem)?;
            trees.push((date, read_json(&path)?));
        }
        trees.sort_by_key(|(date, _)| *date);
        Ok(trees)
    }

    // ---- counts ------------------------------------------------------------

    /// Low and high vertex counts of each gauge with dates in `[start, end]`.
    pub fn level_counts(
        &self,
        gauges: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeMap<String, LevelCount>, FloodWaveError> {
        let mut counts = BTreeMap::new();
        for gauge in gauges {
            let vertices = self.read_vertices_or_empty(gauge)?;
            counts.insert(gauge.clone(), count_in_range(&vertices, start, end));
        }
        Ok(counts)
    }
}

/// Low and high counts of the vertices dated within `[start, end]`.
pub fn count_in_range(vertices: &GaugeVertices, start: NaiveDate, end: NaiveDate) -> LevelCount {
    if start > end {
        return LevelCount::default();
    }
    let (low, high) = levels::count_levels(vertices.range(start..=end).map(|(_, p)| &p.level));
    LevelCount { low, high }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{EdgeCandidates, PeakRecord, WaterLevel};

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2006, m, d).unwrap()
    }

    fn peak(value: f64, level: WaterLevel) -> PeakRecord {
        PeakRecord { value, level }
    }

    #[test]
    fn test_layout_paths() {
        let store = GeneratedStore::new("/tmp/generated_0_3_2");
        let pair = GaugePair::new("1514", "1515");
        assert_eq!(
            store.vertex_path("1514"),
            PathBuf::from("/tmp/generated_0_3_2/find_vertices/1514.json")
        );
        assert_eq!(
            store.tree_path(&pair, day(4, 1)),
            PathBuf::from("/tmp/generated_0_3_2/build_graph/1514_1515/2006-04-01.json")
        );
        assert_eq!(
            store.vertex_pairs_path(),
            PathBuf::from("/tmp/generated_0_3_2/find_edges/vertex_pairs.json")
        );
    }

    #[test]
    fn test_save_or_update_merges_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = GeneratedStore::new(dir.path());
        store.create_layout().unwrap();

        let mut first = GaugeVertices::new();
        first.insert(day(3, 1), peak(400.0, WaterLevel::Low));
        first.insert(day(3, 9), peak(420.0, WaterLevel::Low));
        store.save_vertices("1514", &first).unwrap();

        let mut second = GaugeVertices::new();
        second.insert(day(3, 9), peak(650.0, WaterLevel::High));
        second.insert(day(5, 2), peak(300.0, WaterLevel::Low));
        store.save_vertices("1514", &second).unwrap();

        let merged = store.read_vertices("1514").unwrap();
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[&day(3, 9)].value, 650.0, "new data wins on shared dates");
        assert_eq!(merged[&day(3, 1)].value, 400.0, "old dates are preserved");
    }

    #[test]
    fn test_vertex_pairs_merge_per_date() {
        let dir = tempfile::tempdir().unwrap();
        let store = GeneratedStore::new(dir.path());
        let candidates = |d: NaiveDate| EdgeCandidates {
            next_dates: vec![d],
            slopes: vec![-1.5],
        };

        let mut first = VertexPairs::new();
        first.entry("1514_1515".to_string()).or_default().insert(day(3, 1), candidates(day(3, 2)));
        store.update_vertex_pairs(&first).unwrap();

        let mut second = VertexPairs::new();
        second.entry("1514_1515".to_string()).or_default().insert(day(6, 1), candidates(day(6, 2)));
        store.update_vertex_pairs(&second).unwrap();

        let all = store.read_vertex_pairs().unwrap();
        assert_eq!(all["1514_1515"].len(), 2);
    }

    #[test]
    fn test_missing_vertex_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = GeneratedStore::new(dir.path());
        assert!(matches!(store.read_vertices("9999"), Err(FloodWaveError::MissingFile(_))));
        assert!(store.read_vertices_or_empty("9999").unwrap().is_empty());
    }

    #[test]
    fn test_level_counts_respect_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let store = GeneratedStore::new(dir.path());
        let mut vertices = GaugeVertices::new();
        vertices.insert(day(1, 5), peak(700.0, WaterLevel::High));
        vertices.insert(day(2, 5), peak(300.0, WaterLevel::Low));
        vertices.insert(day(9, 5), peak(310.0, WaterLevel::Low));
        store.save_vertices("1514", &vertices).unwrap();

        let counts = store
            .level_counts(&["1514".to_string(), "2275".to_string()], day(1, 1), day(6, 30))
            .unwrap();
        assert_eq!(counts["1514"], LevelCount { low: 1, high: 1 });
        assert_eq!(counts["2275"].total(), 0);
    }

    #[test]
    fn test_tree_files_are_read_in_date_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = GeneratedStore::new(dir.path());
        store.create_layout().unwrap();
        let pair = GaugePair::new("1514", "1515");
        store.write_tree(&pair, day(5, 1), &GraphDocument::default()).unwrap();
        store.write_tree(&pair, day(3, 1), &GraphDocument::default()).unwrap();

        let trees = store.read_tree_files(&pair).unwrap();
        let dates: Vec<_> = trees.iter().map(|(d, _)| *d).collect();
        assert_eq!(dates, vec![day(3, 1), day(5, 1)]);
        assert_eq!(store.tree_pairs().unwrap(), vec![pair]);
    }
}
