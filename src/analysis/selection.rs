//! Selections on a composed graph.
//!
//! Every selection returns a new graph induced by the kept nodes. Station
//! intervals are given by their two end stations and resolved against the
//! station order, upstream first.

use std::collections::HashSet;

use crate::analysis::extractor;
use crate::graph::WaveGraph;
use crate::model::{FloodWaveError, NodeKey, WaterLevel};

/// Stations from `start_station` to `end_station` inclusive, in river order.
pub fn stations_between<'a>(
    sorted_stations: &'a [String],
    start_station: &str,
    end_station: &str,
) -> Result<&'a [String], FloodWaveError> {
    let position = |station: &str| {
        sorted_stations
            .iter()
            .position(|s| s == station)
            .ok_or_else(|| FloodWaveError::UnknownGauge(station.to_string()))
    };
    let from = position(start_station)?;
    let to = position(end_station)?;
    if from > to {
        return Err(FloodWaveError::Config(format!(
            "station {} is downstream of {}",
            start_station, end_station
        )));
    }
    Ok(&sorted_stations[from..=to])
}

fn has_station(component: &[NodeKey], station: &str) -> bool {
    component.iter().any(|k| k.gauge == station)
}

fn keep_components(graph: &WaveGraph, keep: impl Fn(&[NodeKey]) -> bool) -> WaveGraph {
    let kept: Vec<NodeKey> = graph
        .weakly_connected_components()
        .into_iter()
        .filter(|c| keep(c.as_slice()))
        .flatten()
        .collect();
    graph.induced_subgraph(kept.iter())
}

/// Components that have a node at `station`.
pub fn select_by_station(graph: &WaveGraph, station: &str) -> WaveGraph {
    keep_components(graph, |c| has_station(c, station))
}

/// Components that have a node at any station of the interval.
pub fn select_intersecting_with_interval(
    graph: &WaveGraph,
    start_station: &str,
    end_station: &str,
    sorted_stations: &[String],
) -> Result<WaveGraph, FloodWaveError> {
    let interval = stations_between(sorted_stations, start_station, end_station)?;
    Ok(keep_components(graph, |c| {
        c.iter().any(|k| interval.contains(&k.gauge))
    }))
}

/// The intersecting components, cut down to the nodes inside the interval.
pub fn select_only_in_interval(
    graph: &WaveGraph,
    start_station: &str,
    end_station: &str,
    sorted_stations: &[String],
) -> Result<WaveGraph, FloodWaveError> {
    let interval = stations_between(sorted_stations, start_station, end_station)?;
    let intersecting = select_intersecting_with_interval(graph, start_station, end_station, sorted_stations)?;
    Ok(intersecting.filter_nodes(|n| interval.contains(&n.gauge)))
}

/// Flood waves passing `station` with a peak of `level` there, with the
/// edges between their nodes.
pub fn select_by_water_level(graph: &WaveGraph, station: &str, level: WaterLevel) -> WaveGraph {
    let mut kept: HashSet<NodeKey> = HashSet::new();
    for wave in extractor::flood_waves(graph) {
        let matches = wave.iter().any(|k| {
            k.gauge == station && graph.node(k).is_some_and(|n| n.level == level)
        });
        if matches {
            kept.extend(wave);
        }
    }
    graph.induced_subgraph(kept.iter())
}

/// Components of the interval cut that reach both end stations.
pub fn select_full_from_start_to_end(
    graph: &WaveGraph,
    start_station: &str,
    end_station: &str,
    sorted_stations: &[String],
) -> Result<WaveGraph, FloodWaveError> {
    let in_interval = select_only_in_interval(graph, start_station, end_station, sorted_stations)?;
    Ok(keep_components(&in_interval, |c| {
        has_station(c, start_station) && has_station(c, end_station)
    }))
}
