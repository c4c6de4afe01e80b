/// Flood wave detection: from water level series to stored vertices and edges.
///
/// Submodules:
/// - `levels`: low/high classification of peaks.
/// - `peaks`: local peak search on one gauge.
/// - `edges`: continuations of peaks at the next gauge, with slopes.
/// - `preparation`: runs both over the stations' operating periods.

pub mod edges;
pub mod levels;
pub mod peaks;
pub mod preparation;

pub use preparation::{GraphPreparation, PreparationSummary};
