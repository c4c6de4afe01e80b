//! Per-root flood wave trees.
//!
//! Every upstream peak with at least one continuation roots a tree: the
//! peaks reachable from it by repeatedly following stored continuations
//! downstream. Branches are walked depth first; pending branches wait on an
//! explicit LIFO stack. Each tree is written to
//! `build_graph/<up>_<down>/<root date>.json`.

use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};

use crate::graph::WaveGraph;
use crate::logging::{self, Stage};
use crate::model::{
    EdgeCandidates, FloodWaveError, GaugePair, GaugeVertices, NodeKey, PairEdges, WaveEdge, WaveNode,
};
use crate::stations::StationRegistry;
use crate::store::{GeneratedStore, VertexPairs};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildSummary {
    pub pairs: usize,
    pub trees: usize,
}

/// Stored continuations and vertices, loaded once per build.
struct Continuations {
    /// Upstream gauge -> (downstream gauge, candidates) of every pair leaving it.
    leaving: HashMap<String, Vec<(String, PairEdges)>>,
    vertices: HashMap<String, GaugeVertices>,
}

pub struct GraphBuilder<'a> {
    store: &'a GeneratedStore,
    registry: &'a StationRegistry,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(store: &'a GeneratedStore, registry: &'a StationRegistry) -> Self {
        Self { store, registry }
    }

    /// Builds and writes the tree of every root in every stored gauge pair.
    pub fn build_graph(&self) -> Result<BuildSummary, FloodWaveError> {
        let vertex_pairs = self.store.read_vertex_pairs()?;
        let pairs = self.ordered_pairs(&vertex_pairs)?;
        let data = self.load_continuations(&vertex_pairs, &pairs)?;

        let mut summary = BuildSummary::default();
        let mut empty = 0;
        for pair in &pairs {
            let Some(edges) = vertex_pairs.get(&pair.to_string()) else {
                continue;
            };
            summary.pairs += 1;
            if edges.is_empty() {
                empty += 1;
            }
            for (root_date, candidates) in edges {
                let tree = self.build_tree(pair, *root_date, candidates, &data)?;
                self.store.write_tree(pair, *root_date, &tree.to_document())?;
                summary.trees += 1;
            }
            logging::debug(
                Stage::Graph,
                Some(pair.to_string().as_str()),
                &format!("{} trees", edges.len()),
            );
        }

        logging::log_run_summary(Stage::Graph, summary.pairs, summary.pairs - empty, empty);
        logging::info(
            Stage::Graph,
            None,
            &format!("Built {} trees over {} gauge pairs", summary.trees, summary.pairs),
        );
        Ok(summary)
    }

    /// Pairs of `vertex_pairs` in river order, upstream first.
    fn ordered_pairs(&self, vertex_pairs: &VertexPairs) -> Result<Vec<GaugePair>, FloodWaveError> {
        let mut keyed = Vec::with_capacity(vertex_pairs.len());
        for name in vertex_pairs.keys() {
            let pair = GaugePair::parse(name)?;
            let up = self.registry.river_km(&pair.upstream)?;
            let down = self.registry.river_km(&pair.downstream)?;
            keyed.push((up, down, pair));
        }
        keyed.sort_by(|a, b| b.0.total_cmp(&a.0).then(b.1.total_cmp(&a.1)));
        Ok(keyed.into_iter().map(|(_, _, pair)| pair).collect())
    }

    fn load_continuations(
        &self,
        vertex_pairs: &VertexPairs,
        pairs: &[GaugePair],
    ) -> Result<Continuations, FloodWaveError> {
        let mut leaving: HashMap<String, Vec<(String, PairEdges)>> = HashMap::new();
        let mut vertices = HashMap::new();
        for pair in pairs {
            if let Some(edges) = vertex_pairs.get(&pair.to_string()) {
                leaving
                    .entry(pair.upstream.clone())
                    .or_default()
                    .push((pair.downstream.clone(), edges.clone()));
            }
            for gauge in [&pair.upstream, &pair.downstream] {
                if !vertices.contains_key(gauge) {
                    vertices.insert(gauge.clone(), self.store.read_vertices_or_empty(gauge)?);
                }
            }
        }
        Ok(Continuations { leaving, vertices })
    }

    fn make_node(&self, gauge: &str, date: NaiveDate, data: &Continuations) -> Result<WaveNode, FloodWaveError> {
        let peak = data
            .vertices
            .get(gauge)
            .and_then(|v| v.get(&date))
            .ok_or_else(|| {
                FloodWaveError::Parse(format!("no stored vertex for {}", NodeKey::new(gauge, date)))
            })?;
        Ok(WaveNode {
            gauge: gauge.to_string(),
            date,
            river_km: self.registry.river_km(gauge)?,
            value: peak.value,
            level: peak.level,
        })
    }

    fn build_tree(
        &self,
        pair: &GaugePair,
        root_date: NaiveDate,
        candidates: &EdgeCandidates,
        data: &Continuations,
    ) -> Result<WaveGraph, FloodWaveError> {
        let mut tree = WaveGraph::new();
        let root = self.make_node(&pair.upstream, root_date, data)?;
        tree.add_node(root.clone());

        let mut pending: Vec<NodeKey> = Vec::new();
        self.attach(&mut tree, &root, &pair.downstream, candidates, data, &mut pending)?;

        let mut expanded: HashSet<NodeKey> = HashSet::new();
        while let Some(key) = pending.pop() {
            if !expanded.insert(key.clone()) {
                continue;
            }
            let (Some(current), Some(leaving)) = (tree.node(&key).cloned(), data.leaving.get(&key.gauge)) else {
                continue;
            };
            for (downstream, edges) in leaving {
                if let Some(next) = edges.get(&key.date) {
                    self.attach(&mut tree, &current, downstream, next, data, &mut pending)?;
                }
            }
        }
        Ok(tree)
    }

    /// Adds an edge from `from` to each candidate at `gauge` and queues the
    /// candidates for expansion.
    fn attach(
        &self,
        tree: &mut WaveGraph,
        from: &WaveNode,
        gauge: &str,
        candidates: &EdgeCandidates,
        data: &Continuations,
        pending: &mut Vec<NodeKey>,
    ) -> Result<(), FloodWaveError> {
        for (i, date) in candidates.next_dates.iter().enumerate() {
            let to = self.make_node(gauge, *date, data)?;
            pending.push(to.key());
            let edge = WaveEdge {
                slope: candidates.slopes.get(i).copied(),
            };
            tree.add_edge(from.clone(), to, edge);
        }
        Ok(())
    }
}
