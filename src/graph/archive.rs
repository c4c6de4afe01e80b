//! All stored trees, loaded once, composed on demand.
//!
//! Composing by date window is the basic query behind every analysis: the
//! union of the trees whose root date lies in `[start, end]`. Statistics
//! compose one graph per year, so the archive keeps the parsed trees in
//! memory and is shared between threads.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::graph::WaveGraph;
use crate::logging::{self, Stage};
use crate::model::{FloodWaveError, GaugePair};
use crate::store::{write_json, GeneratedStore};

#[derive(Debug, Clone, Default)]
pub struct GraphArchive {
    /// Trees of each gauge pair, sorted by root date.
    trees: BTreeMap<GaugePair, Vec<(NaiveDate, WaveGraph)>>,
}

impl GraphArchive {
    /// Reads every tree file under `build_graph/`.
    pub fn load(store: &GeneratedStore) -> Result<Self, FloodWaveError> {
        let started = std::time::Instant::now();
        let mut trees = BTreeMap::new();
        let mut count = 0;
        for pair in store.tree_pairs()? {
            let mut parsed = Vec::new();
            for (date, doc) in store.read_tree_files(&pair)? {
                parsed.push((date, WaveGraph::from_document(&doc)?));
            }
            count += parsed.len();
            trees.insert(pair, parsed);
        }
        logging::log_timing(Stage::Graph, "load trees", started.elapsed());
        logging::info(
            Stage::Graph,
            None,
            &format!("Loaded {} trees of {} gauge pairs", count, trees.len()),
        );
        Ok(Self { trees })
    }

    pub fn insert(&mut self, pair: GaugePair, root_date: NaiveDate, tree: WaveGraph) {
        let list = self.trees.entry(pair).or_default();
        let at = list.partition_point(|(d, _)| *d < root_date);
        if list.get(at).is_some_and(|(d, _)| *d == root_date) {
            list[at].1 = tree;
        } else {
            list.insert(at, (root_date, tree));
        }
    }

    pub fn pairs(&self) -> Vec<GaugePair> {
        self.trees.keys().cloned().collect()
    }

    pub fn tree_count(&self) -> usize {
        self.trees.values().map(Vec::len).sum()
    }

    /// Union of the trees rooted within `[start, end]`, restricted to
    /// `pairs` when given.
    pub fn compose(&self, start: NaiveDate, end: NaiveDate, pairs: Option<&[GaugePair]>) -> WaveGraph {
        let mut joined = WaveGraph::new();
        if start > end {
            return joined;
        }
        for (pair, trees) in &self.trees {
            if pairs.is_some_and(|wanted| !wanted.contains(pair)) {
                continue;
            }
            let from = trees.partition_point(|(d, _)| *d < start);
            for (_, tree) in trees[from..].iter().take_while(|(d, _)| *d <= end) {
                joined.compose(tree);
            }
        }
        joined
    }

    /// Writes `graph` to `joined_graph.json`.
    pub fn save_joined(store: &GeneratedStore, graph: &WaveGraph) -> Result<(), FloodWaveError> {
        write_json(&store.joined_graph_path(), &graph.to_document())
    }
}
