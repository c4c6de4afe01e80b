//! Measurements on a composed flood wave graph.
//!
//! Station intervals are resolved against `sorted_stations`, the station ids
//! in river order (upstream first).

use std::collections::BTreeMap;

use crate::analysis::descriptive;
use crate::analysis::extractor::{self, Wave};
use crate::analysis::selection;
use crate::graph::WaveGraph;
use crate::model::{FloodWaveError, NodeKey};

/// Days between the first and last node of a wave.
pub fn travel_days(wave: &[NodeKey]) -> Option<i64> {
    let (first, last) = (wave.first()?, wave.last()?);
    Some((last.date - first.date).num_days())
}

fn full_waves(
    graph: &WaveGraph,
    start_station: &str,
    end_station: &str,
    sorted_stations: &[String],
) -> Result<Vec<Wave>, FloodWaveError> {
    let full = selection::select_full_from_start_to_end(graph, start_station, end_station, sorted_stations)?;
    Ok(extractor::waves_from_start_to_end(
        extractor::flood_waves(&full),
        start_station,
        end_station,
    ))
}

/// Number of flood waves that reached both `start_station` and `end_station`.
pub fn count_waves(
    graph: &WaveGraph,
    start_station: &str,
    end_station: &str,
    sorted_stations: &[String],
) -> Result<usize, FloodWaveError> {
    Ok(full_waves(graph, start_station, end_station, sorted_stations)?.len())
}

/// Mean travel time in days between the two stations, one value per wave.
/// `None` when no wave covers the interval.
pub fn propagation_time(
    graph: &WaveGraph,
    start_station: &str,
    end_station: &str,
    sorted_stations: &[String],
) -> Result<Option<f64>, FloodWaveError> {
    let days: Vec<f64> = full_waves(graph, start_station, end_station, sorted_stations)?
        .iter()
        .filter_map(|w| travel_days(w))
        .map(|d| d as f64)
        .collect();
    Ok(descriptive::mean(&days))
}

/// Travel time where each path is weighted by the size of its wave class:
/// every path contributes `days / class size`, averaged over all paths.
/// A class therefore adds its mean travel time once, spread over its paths.
pub fn propagation_time_weighted(
    graph: &WaveGraph,
    start_station: &str,
    end_station: &str,
    sorted_stations: &[String],
) -> Result<Option<f64>, FloodWaveError> {
    let full = selection::select_full_from_start_to_end(graph, start_station, end_station, sorted_stations)?;
    let classes = extractor::classes_from_start_to_end(
        extractor::flood_wave_classes(&full),
        start_station,
        end_station,
    );
    let mut weighted: Vec<f64> = Vec::new();
    for class in &classes {
        let days: Vec<f64> = class.iter().filter_map(|w| travel_days(w)).map(|d| d as f64).collect();
        let size = days.len() as f64;
        weighted.extend(days.iter().map(|d| d / size));
    }
    Ok(descriptive::mean(&weighted))
}

/// Number of flood waves inside the interval that passed `start_station`
/// but never reached `end_station`.
pub fn count_unfinished_waves(
    graph: &WaveGraph,
    start_station: &str,
    end_station: &str,
    sorted_stations: &[String],
) -> Result<usize, FloodWaveError> {
    let in_interval = selection::select_only_in_interval(graph, start_station, end_station, sorted_stations)?;
    Ok(extractor::flood_waves(&in_interval)
        .iter()
        .filter(|wave| {
            wave.iter().any(|k| k.gauge == start_station) && wave.iter().all(|k| k.gauge != end_station)
        })
        .count())
}

/// One edge of a flood map: a wave class between two section stations.
#[derive(Debug, Clone, PartialEq)]
pub struct FloodMapEdge {
    pub from: NodeKey,
    pub to: NodeKey,
    /// Number of shortest paths in the class.
    pub paths: usize,
}

/// Condenses the graph to the river sections between consecutive
/// `section_stations`: one edge per wave class crossing a whole section.
pub fn create_flood_map(
    graph: &WaveGraph,
    section_stations: &[String],
    sorted_stations: &[String],
) -> Result<Vec<FloodMapEdge>, FloodWaveError> {
    let mut edges: BTreeMap<(NodeKey, NodeKey), usize> = BTreeMap::new();
    for section in section_stations.windows(2) {
        let (start, end) = (&section[0], &section[1]);
        let full = selection::select_full_from_start_to_end(graph, start, end, sorted_stations)?;
        let classes = extractor::classes_from_start_to_end(extractor::flood_wave_classes(&full), start, end);
        for class in classes {
            let Some(first) = class.first() else {
                continue;
            };
            if let (Some(from), Some(to)) = (first.first(), first.last()) {
                edges.insert((from.clone(), to.clone()), class.len());
            }
        }
    }
    Ok(edges
        .into_iter()
        .map(|((from, to), paths)| FloodMapEdge { from, to, paths })
        .collect())
}

/// Splits a DAG into branchings: for every source node (in-degree 0), the
/// nodes reachable from it. A node reachable from two sources appears in
/// both branches.
pub fn branching(graph: &WaveGraph) -> Result<Vec<Vec<NodeKey>>, FloodWaveError> {
    if !graph.is_acyclic() {
        return Err(FloodWaveError::CyclicGraph);
    }
    Ok(graph
        .keys()
        .iter()
        .filter(|k| graph.in_degree(k) == 0)
        .map(|source| graph.reachable_from(source))
        .collect())
}

/// Start and end of a branch: the most upstream node, and among the most
/// downstream nodes the one with the latest date.
pub fn branch_extent(graph: &WaveGraph, branch: &[NodeKey]) -> Option<(NodeKey, NodeKey)> {
    let nodes: Vec<_> = branch.iter().filter_map(|k| graph.node(k)).collect();
    let start = nodes
        .iter()
        .reduce(|best, n| if n.river_km > best.river_km { n } else { best })?;
    let lowest_km = nodes.iter().map(|n| n.river_km).fold(f64::INFINITY, f64::min);
    let end = nodes
        .iter()
        .filter(|n| n.river_km == lowest_km)
        .reduce(|best, n| if n.date > best.date { n } else { best })?;
    Some((start.key(), end.key()))
}

/// Velocity in km/day of every flood wave. A wave that arrives on the same
/// day counts its distance as the velocity.
pub fn calculate_all_velocities(graph: &WaveGraph) -> Vec<f64> {
    extractor::flood_waves(graph)
        .iter()
        .filter_map(|wave| {
            let start = graph.node(wave.first()?)?;
            let end = graph.node(wave.last()?)?;
            let distance = start.river_km - end.river_km;
            let days = (end.date - start.date).num_days();
            Some(if days == 0 { distance } else { distance / days as f64 })
        })
        .collect()
}
