//! Flood wave extraction from a composed graph.
//!
//! A flood wave runs from a peak nothing flows into (in-degree 0) to a peak
//! that flows nowhere (out-degree 0) further downstream in the same weakly
//! connected component. Each such pair with a directed path between them is
//! one wave; the wave itself is a shortest path. The "class" of a pair is
//! every shortest path between the two.

use crate::graph::WaveGraph;
use crate::model::NodeKey;

/// A flood wave: peaks from the start node to the end node, upstream first.
pub type Wave = Vec<NodeKey>;

/// All shortest paths between the same start and end node.
pub type WaveClass = Vec<Wave>;

/// Start nodes paired with end nodes of `component`, start strictly
/// upstream of end.
pub fn final_pairs(graph: &WaveGraph, component: &[NodeKey]) -> Vec<(NodeKey, NodeKey)> {
    let starts: Vec<&NodeKey> = component.iter().filter(|k| graph.in_degree(k) == 0).collect();
    let ends: Vec<&NodeKey> = component.iter().filter(|k| graph.out_degree(k) == 0).collect();

    let mut pairs = Vec::new();
    for start in &starts {
        let Some(start_km) = graph.node(start).map(|n| n.river_km) else {
            continue;
        };
        for end in &ends {
            let upstream = graph.node(end).is_some_and(|n| start_km > n.river_km);
            if upstream {
                pairs.push(((*start).clone(), (*end).clone()));
            }
        }
    }
    pairs
}

/// One shortest path for every final pair connected by a path.
pub fn flood_waves(graph: &WaveGraph) -> Vec<Wave> {
    let mut waves = Vec::new();
    for component in graph.weakly_connected_components() {
        for (start, end) in final_pairs(graph, &component) {
            if let Some(path) = graph.shortest_path(&start, &end) {
                waves.push(path);
            }
        }
    }
    waves
}

/// Every shortest path for every final pair connected by a path.
pub fn flood_wave_classes(graph: &WaveGraph) -> Vec<WaveClass> {
    let mut classes = Vec::new();
    for component in graph.weakly_connected_components() {
        for (start, end) in final_pairs(graph, &component) {
            let paths = graph.all_shortest_paths(&start, &end);
            if !paths.is_empty() {
                classes.push(paths);
            }
        }
    }
    classes
}

/// Whether `wave` starts at `start_station` and ends at `end_station`.
pub fn runs_between(wave: &[NodeKey], start_station: &str, end_station: &str) -> bool {
    match (wave.first(), wave.last()) {
        (Some(first), Some(last)) => first.gauge == start_station && last.gauge == end_station,
        _ => false,
    }
}

/// Waves that start at `start_station` and end at `end_station`.
pub fn waves_from_start_to_end(waves: Vec<Wave>, start_station: &str, end_station: &str) -> Vec<Wave> {
    waves
        .into_iter()
        .filter(|w| runs_between(w, start_station, end_station))
        .collect()
}

/// Classes whose paths start at `start_station` and end at `end_station`.
pub fn classes_from_start_to_end(
    classes: Vec<WaveClass>,
    start_station: &str,
    end_station: &str,
) -> Vec<WaveClass> {
    classes
        .into_iter()
        .filter(|c| c.first().is_some_and(|w| runs_between(w, start_station, end_station)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{WaterLevel, WaveEdge, WaveNode};
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

    /// a1 -> b2 -> c3 and a1 -> b3 -> c3 (two equal paths), plus b3 -> c5.
    fn graph() -> WaveGraph {
        let mut g = WaveGraph::new();
        g.add_edge(node("a", 300.0, 1), node("b", 200.0, 2), WaveEdge::default());
        g.add_edge(node("a", 300.0, 1), node("b", 200.0, 3), WaveEdge::default());
        g.add_edge(node("b", 200.0, 2), node("c", 100.0, 3), WaveEdge::default());
        g.add_edge(node("b", 200.0, 3), node("c", 100.0, 3), WaveEdge::default());
        g.add_edge(node("b", 200.0, 3), node("c", 100.0, 5), WaveEdge::default());
        g
    }

    #[test]
    fn test_final_pairs_need_upstream_start() {
        let g = graph();
        let comps = g.weakly_connected_components();
        let pairs = final_pairs(&g, &comps[0]);
        assert_eq!(pairs.len(), 2);
        assert!(pairs.iter().all(|(s, _)| s.gauge == "a"));
    }

    #[test]
    fn test_single_node_component_has_no_wave() {
        let mut g = WaveGraph::new();
        g.add_node(node("a", 300.0, 1));
        assert!(flood_waves(&g).is_empty());
    }

    #[test]
    fn test_one_wave_per_connected_pair() {
        let waves = flood_waves(&graph());
        assert_eq!(waves.len(), 2);
        assert!(waves.iter().all(|w| w.len() == 3));
    }

    #[test]
    fn test_classes_hold_every_shortest_path() {
        let classes = flood_wave_classes(&graph());
        let sizes: Vec<_> = classes.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 1], "c3 is reached twice, c5 once");
    }

    #[test]
    fn test_filter_by_start_and_end_station() {
        let waves = flood_waves(&graph());
        assert_eq!(waves_from_start_to_end(waves.clone(), "a", "c").len(), 2);
        assert!(waves_from_start_to_end(waves, "b", "c").is_empty());

        let classes = flood_wave_classes(&graph());
        assert_eq!(classes_from_start_to_end(classes, "a", "c").len(), 2);
    }
}
