//! The flood wave graph.
//!
//! A directed graph whose nodes are peaks (`WaveNode`, keyed by gauge and
//! date) and whose edges point downstream from a peak to its continuation.
//! Nodes are never removed from a graph; selections build a new induced
//! subgraph instead, which keeps `NodeIndex` values stable.
//!
//! Every query that returns nodes returns them in `NodeKey` order, so
//! results do not depend on insertion order.

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::model::{FloodWaveError, NodeKey, WaveEdge, WaveNode};

// ============================================================================
// Serialized form
// ============================================================================

/// An edge of a `GraphDocument`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentEdge {
    pub from: NodeKey,
    pub to: NodeKey,
    #[serde(default)]
    pub slope: Option<f64>,
}

/// Node-link form of a graph, as stored in tree files and `joined_graph.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    pub nodes: Vec<WaveNode>,
    pub edges: Vec<DocumentEdge>,
}

// ============================================================================
// WaveGraph
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct WaveGraph {
    graph: DiGraph<WaveNode, WaveEdge>,
    index: HashMap<NodeKey, NodeIndex>,
}

impl WaveGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Adds a node, or refreshes the payload of an existing one.
    pub fn add_node(&mut self, node: WaveNode) -> NodeIndex {
        let key = node.key();
        match self.index.get(&key) {
            Some(&idx) => {
                self.graph[idx] = node;
                idx
            }
            None => {
                let idx = self.graph.add_node(node);
                self.index.insert(key, idx);
                idx
            }
        }
    }

    /// Adds both endpoints and the edge between them. Adding an existing
    /// edge again only updates its payload.
    pub fn add_edge(&mut self, from: WaveNode, to: WaveNode, edge: WaveEdge) {
        let a = self.add_node(from);
        let b = self.add_node(to);
        self.graph.update_edge(a, b, edge);
    }

    pub fn contains(&self, key: &NodeKey) -> bool {
        self.index.contains_key(key)
    }

    pub fn node(&self, key: &NodeKey) -> Option<&WaveNode> {
        self.index.get(key).map(|idx| &self.graph[*idx])
    }

    pub fn edge(&self, from: &NodeKey, to: &NodeKey) -> Option<WaveEdge> {
        let a = *self.index.get(from)?;
        let b = *self.index.get(to)?;
        self.graph.find_edge(a, b).map(|e| self.graph[e])
    }

    /// All node keys, sorted.
    pub fn keys(&self) -> Vec<NodeKey> {
        let mut keys: Vec<NodeKey> = self.index.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// All nodes, sorted by key.
    pub fn nodes(&self) -> Vec<&WaveNode> {
        self.keys()
            .iter()
            .filter_map(|key| self.node(key))
            .collect()
    }

    /// All edges as (from, to, payload), sorted by endpoints.
    pub fn edges(&self) -> Vec<(NodeKey, NodeKey, WaveEdge)> {
        let mut edges: Vec<_> = self
            .graph
            .edge_references()
            .map(|e| {
                (
                    self.graph[e.source()].key(),
                    self.graph[e.target()].key(),
                    *e.weight(),
                )
            })
            .collect();
        edges.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));
        edges
    }

    /// Gauges that have at least one node.
    pub fn gauges(&self) -> BTreeSet<String> {
        self.graph.node_weights().map(|n| n.gauge.clone()).collect()
    }

    pub fn in_degree(&self, key: &NodeKey) -> usize {
        self.degree(key, Direction::Incoming)
    }

    pub fn out_degree(&self, key: &NodeKey) -> usize {
        self.degree(key, Direction::Outgoing)
    }

    fn degree(&self, key: &NodeKey, direction: Direction) -> usize {
        self.index
            .get(key)
            .map(|idx| self.graph.edges_directed(*idx, direction).count())
            .unwrap_or(0)
    }

    /// Direct downstream continuations of `key`, sorted.
    pub fn successors(&self, key: &NodeKey) -> Vec<NodeKey> {
        match self.index.get(key) {
            Some(idx) => self.sorted_neighbors(*idx, Direction::Outgoing),
            None => Vec::new(),
        }
    }

    fn sorted_neighbors(&self, idx: NodeIndex, direction: Direction) -> Vec<NodeKey> {
        let mut keys: Vec<NodeKey> = self
            .graph
            .neighbors_directed(idx, direction)
            .map(|n| self.graph[n].key())
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }

    /// Union with `other`. Payloads of shared nodes and edges come from `other`.
    pub fn compose(&mut self, other: &WaveGraph) {
        for node in other.graph.node_weights() {
            self.add_node(node.clone());
        }
        for edge in other.graph.edge_references() {
            let from = &other.graph[edge.source()];
            let to = &other.graph[edge.target()];
            self.add_edge(from.clone(), to.clone(), *edge.weight());
        }
    }

    /// Weakly connected components. Keys inside a component are sorted and
    /// components are ordered by their smallest key.
    pub fn weakly_connected_components(&self) -> Vec<Vec<NodeKey>> {
        let mut seen: HashSet<NodeIndex> = HashSet::new();
        let mut components = Vec::new();

        for key in self.keys() {
            let Some(&start) = self.index.get(&key) else {
                continue;
            };
            if !seen.insert(start) {
                continue;
            }
            let mut component = vec![key];
            let mut queue = VecDeque::from([start]);
            while let Some(current) = queue.pop_front() {
                for next in self.graph.neighbors_undirected(current) {
                    if seen.insert(next) {
                        component.push(self.graph[next].key());
                        queue.push_back(next);
                    }
                }
            }
            component.sort();
            components.push(component);
        }
        components
    }

    /// One shortest directed path from `from` to `to` (unweighted), or
    /// `None` when `to` is unreachable. Ties are broken towards smaller keys.
    pub fn shortest_path(&self, from: &NodeKey, to: &NodeKey) -> Option<Vec<NodeKey>> {
        let start = *self.index.get(from)?;
        let goal = *self.index.get(to)?;

        let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut seen = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);

        while let Some(current) = queue.pop_front() {
            if current == goal {
                let mut path = vec![self.graph[goal].key()];
                let mut cursor = goal;
                while let Some(&prev) = parent.get(&cursor) {
                    path.push(self.graph[prev].key());
                    cursor = prev;
                }
                path.reverse();
                return Some(path);
            }
            for key in self.sorted_neighbors(current, Direction::Outgoing) {
                let Some(&next) = self.index.get(&key) else {
                    continue;
                };
                if seen.insert(next) {
                    parent.insert(next, current);
                    queue.push_back(next);
                }
            }
        }
        None
    }

    /// Every shortest directed path from `from` to `to`, sorted. Empty when
    /// `to` is unreachable.
    pub fn all_shortest_paths(&self, from: &NodeKey, to: &NodeKey) -> Vec<Vec<NodeKey>> {
        let (Some(&start), Some(&goal)) = (self.index.get(from), self.index.get(to)) else {
            return Vec::new();
        };

        let mut dist: HashMap<NodeIndex, usize> = HashMap::from([(start, 0)]);
        let mut preds: HashMap<NodeIndex, Vec<NodeIndex>> = HashMap::new();
        let mut queue = VecDeque::from([start]);

        while let Some(current) = queue.pop_front() {
            let d = dist[&current];
            if dist.get(&goal).is_some_and(|g| d >= *g) {
                break;
            }
            for next in self.graph.neighbors_directed(current, Direction::Outgoing) {
                match dist.get(&next) {
                    None => {
                        dist.insert(next, d + 1);
                        preds.insert(next, vec![current]);
                        queue.push_back(next);
                    }
                    Some(&nd) if nd == d + 1 => {
                        let list = preds.entry(next).or_default();
                        if !list.contains(&current) {
                            list.push(current);
                        }
                    }
                    _ => {}
                }
            }
        }

        if !dist.contains_key(&goal) {
            return Vec::new();
        }

        // Walk the predecessor lists back from the goal.
        let mut paths = Vec::new();
        let mut stack: Vec<Vec<NodeIndex>> = vec![vec![goal]];
        while let Some(partial) = stack.pop() {
            let Some(&head) = partial.last() else {
                continue;
            };
            if head == start {
                paths.push(partial.iter().rev().map(|idx| self.graph[*idx].key()).collect());
                continue;
            }
            for pred in preds.get(&head).into_iter().flatten() {
                let mut extended = partial.clone();
                extended.push(*pred);
                stack.push(extended);
            }
        }
        paths.sort();
        paths
    }

    /// The subgraph induced by the nodes satisfying `keep`.
    pub fn filter_nodes(&self, keep: impl Fn(&WaveNode) -> bool) -> WaveGraph {
        let mut sub = WaveGraph::new();
        for node in self.graph.node_weights().filter(|n| keep(n)) {
            sub.add_node(node.clone());
        }
        for edge in self.graph.edge_references() {
            let from = &self.graph[edge.source()];
            let to = &self.graph[edge.target()];
            if sub.contains(&from.key()) && sub.contains(&to.key()) {
                sub.add_edge(from.clone(), to.clone(), *edge.weight());
            }
        }
        sub
    }

    /// The subgraph induced by `keys`. Unknown keys are ignored.
    pub fn induced_subgraph<'a>(&self, keys: impl IntoIterator<Item = &'a NodeKey>) -> WaveGraph {
        let keep: HashSet<&NodeKey> = keys.into_iter().collect();
        self.filter_nodes(|node| keep.contains(&node.key()))
    }

    /// Whether the graph has no directed cycle.
    pub fn is_acyclic(&self) -> bool {
        !petgraph::algo::is_cyclic_directed(&self.graph)
    }

    /// Nodes reachable from `key` along edge directions, `key` included, sorted.
    pub fn reachable_from(&self, key: &NodeKey) -> Vec<NodeKey> {
        let Some(&start) = self.index.get(key) else {
            return Vec::new();
        };
        let mut seen = HashSet::from([start]);
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            for next in self.graph.neighbors_directed(current, Direction::Outgoing) {
                if seen.insert(next) {
                    stack.push(next);
                }
            }
        }
        let mut keys: Vec<NodeKey> = seen.into_iter().map(|idx| self.graph[idx].key()).collect();
        keys.sort();
        keys
    }

    pub fn to_document(&self) -> GraphDocument {
        GraphDocument {
            nodes: self.nodes().into_iter().cloned().collect(),
            edges: self
                .edges()
                .into_iter()
                .map(|(from, to, edge)| DocumentEdge {
                    from,
                    to,
                    slope: edge.slope,
                })
                .collect(),
        }
    }

    /// Rebuilds a graph from its node-link form. Every edge endpoint must be
    /// listed among the nodes.
    pub fn from_document(doc: &GraphDocument) -> Result<Self, FloodWaveError> {
        let mut graph = WaveGraph::new();
        for node in &doc.nodes {
            graph.add_node(node.clone());
        }
        for edge in &doc.edges {
            let (Some(&a), Some(&b)) = (graph.index.get(&edge.from), graph.index.get(&edge.to)) else {
                return Err(FloodWaveError::Parse(format!(
                    "edge {} -> {} references a node that is not in the document",
                    edge.from, edge.to
                )));
            };
            graph.graph.update_edge(a, b, WaveEdge { slope: edge.slope });
        }
        Ok(graph)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WaterLevel;
    use chrono::NaiveDate;

    fn node(gauge: &str, km: f64, day: u32) -> WaveNode {
        WaveNode {
            gauge: gauge.to_string(),
            date: NaiveDate::from_ymd_opt(2006, 4, day).unwrap(),
            river_km: km,
            value: 400.0,
            level: WaterLevel::Low,
        }
    }

    /// a1 -> b2 -> c3, a1 -> b3 -> c3, and a separate x10 -> y11.
    fn diamond() -> WaveGraph {
        let mut g = WaveGraph::new();
        g.add_edge(node("a", 300.0, 1), node("b", 200.0, 2), WaveEdge::default());
        g.add_edge(node("a", 300.0, 1), node("b", 200.0, 3), WaveEdge::default());
        g.add_edge(node("b", 200.0, 2), node("c", 100.0, 3), WaveEdge::default());
        g.add_edge(node("b", 200.0, 3), node("c", 100.0, 3), WaveEdge::default());
        g.add_edge(node("x", 300.0, 10), node("y", 200.0, 11), WaveEdge::default());
        g
    }

    #[test]
    fn test_add_edge_is_idempotent() {
        let mut g = WaveGraph::new();
        g.add_edge(node("a", 1.0, 1), node("b", 0.0, 2), WaveEdge { slope: Some(1.0) });
        g.add_edge(node("a", 1.0, 1), node("b", 0.0, 2), WaveEdge { slope: Some(2.0) });
        assert_eq!(g.node_count(), 2);
        assert_eq!(g.edge_count(), 1);
        assert_eq!(
            g.edge(&node("a", 1.0, 1).key(), &node("b", 0.0, 2).key()),
            Some(WaveEdge { slope: Some(2.0) })
        );
    }

    #[test]
    fn test_degrees() {
        let g = diamond();
        let a1 = node("a", 300.0, 1).key();
        let c3 = node("c", 100.0, 3).key();
        assert_eq!(g.in_degree(&a1), 0);
        assert_eq!(g.out_degree(&a1), 2);
        assert_eq!(g.in_degree(&c3), 2);
        assert_eq!(g.out_degree(&c3), 0);
        assert_eq!(g.in_degree(&NodeKey::new("zz", a1.date)), 0);
    }

    #[test]
    fn test_weak_components_are_deterministic() {
        let comps = diamond().weakly_connected_components();
        assert_eq!(comps.len(), 2);
        assert_eq!(comps[0].len(), 4);
        assert_eq!(comps[0][0], node("a", 300.0, 1).key());
        assert_eq!(comps[1], vec![node("x", 300.0, 10).key(), node("y", 200.0, 11).key()]);
    }

    #[test]
    fn test_shortest_path_prefers_smaller_keys() {
        let g = diamond();
        let path = g
            .shortest_path(&node("a", 300.0, 1).key(), &node("c", 100.0, 3).key())
            .expect("c3 is reachable");
        assert_eq!(path.len(), 3);
        assert_eq!(path[1], node("b", 200.0, 2).key());
    }

    #[test]
    fn test_shortest_path_unreachable_is_none() {
        let g = diamond();
        assert!(g
            .shortest_path(&node("c", 100.0, 3).key(), &node("a", 300.0, 1).key())
            .is_none());
        assert!(g
            .shortest_path(&node("a", 300.0, 1).key(), &node("y", 200.0, 11).key())
            .is_none());
    }

    #[test]
    fn test_all_shortest_paths_finds_both_branches() {
        let g = diamond();
        let paths = g.all_shortest_paths(&node("a", 300.0, 1).key(), &node("c", 100.0, 3).key());
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0][1], node("b", 200.0, 2).key());
        assert_eq!(paths[1][1], node("b", 200.0, 3).key());
        assert!(g
            .all_shortest_paths(&node("c", 100.0, 3).key(), &node("a", 300.0, 1).key())
            .is_empty());
    }

    #[test]
    fn test_all_shortest_paths_ignores_longer_routes() {
        let mut g = WaveGraph::new();
        g.add_edge(node("a", 3.0, 1), node("c", 1.0, 3), WaveEdge::default());
        g.add_edge(node("a", 3.0, 1), node("b", 2.0, 2), WaveEdge::default());
        g.add_edge(node("b", 2.0, 2), node("c", 1.0, 3), WaveEdge::default());
        let paths = g.all_shortest_paths(&node("a", 3.0, 1).key(), &node("c", 1.0, 3).key());
        assert_eq!(paths, vec![vec![node("a", 3.0, 1).key(), node("c", 1.0, 3).key()]]);
    }

    #[test]
    fn test_compose_unions_nodes_and_edges() {
        let mut left = WaveGraph::new();
        left.add_edge(node("a", 2.0, 1), node("b", 1.0, 2), WaveEdge::default());
        let mut right = WaveGraph::new();
        right.add_edge(node("b", 1.0, 2), node("c", 0.0, 3), WaveEdge::default());
        right.add_edge(node("a", 2.0, 1), node("b", 1.0, 2), WaveEdge::default());

        left.compose(&right);
        assert_eq!(left.node_count(), 3);
        assert_eq!(left.edge_count(), 2);
        assert!(left.shortest_path(&node("a", 2.0, 1).key(), &node("c", 0.0, 3).key()).is_some());
    }

    #[test]
    fn test_induced_subgraph_keeps_inner_edges_only() {
        let g = diamond();
        let keep = [node("a", 300.0, 1).key(), node("b", 200.0, 2).key(), node("c", 100.0, 3).key()];
        let sub = g.induced_subgraph(keep.iter());
        assert_eq!(sub.node_count(), 3);
        assert_eq!(sub.edge_count(), 2);
    }

    #[test]
    fn test_document_round_trip_and_dangling_edge() {
        let g = diamond();
        let doc = g.to_document();
        let back = WaveGraph::from_document(&doc).expect("document should load");
        assert_eq!(back.to_document(), doc);

        let mut broken = doc.clone();
        broken.nodes.retain(|n| n.gauge != "y");
        assert!(matches!(WaveGraph::from_document(&broken), Err(FloodWaveError::Parse(_))));
    }

    #[test]
    fn test_cycle_detection() {
        let mut g = diamond();
        assert!(g.is_acyclic());
        g.add_edge(node("c", 100.0, 3), node("a", 300.0, 1), WaveEdge::default());
        assert!(!g.is_acyclic());
    }

    #[test]
    fn test_reachable_from_includes_start() {
        let g = diamond();
        let reach = g.reachable_from(&node("b", 200.0, 3).key());
        assert_eq!(reach, vec![node("b", 200.0, 3).key(), node("c", 100.0, 3).key()]);
    }
}
