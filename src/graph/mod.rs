/// The flood wave graph and its construction.
///
/// Submodules:
/// - `wave_graph`: directed graph of peaks with its queries.
/// - `builder`: per-root trees from the stored continuations.
/// - `archive`: loading the trees and composing them by date window.

pub mod archive;
pub mod builder;
pub mod wave_graph;

pub use archive::GraphArchive;
pub use builder::{BuildSummary, GraphBuilder};
pub use wave_graph::{DocumentEdge, GraphDocument, WaveGraph};
