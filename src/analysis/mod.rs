//! Analysis of composed flood wave graphs.
//!
//! - `extractor` turns a graph into flood waves and wave classes.
//! - `selection` cuts a graph down to stations, intervals or water levels.
//! - `graph_analysis` measures counts, travel times and velocities.
//! - `statistics` repeats those measurements year by year.
//! - `descriptive` summarizes samples.

pub mod descriptive;
pub mod extractor;
pub mod graph_analysis;
pub mod selection;
pub mod statistics;
