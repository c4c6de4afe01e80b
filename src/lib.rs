//! Flood wave detection on a river's gauge network.
//!
//! Daily water levels go in; local peaks become vertices, peaks that continue
//! at the next gauge downstream become edges, and the per-root trees of those
//! edges compose into a directed graph that is queried for flood waves,
//! travel times, velocities and long-run statistics.

pub mod analysis;
pub mod config;
pub mod detect;
pub mod graph;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod report;
pub mod stations;
pub mod store;
pub mod verify;
