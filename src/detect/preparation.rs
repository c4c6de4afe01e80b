//! Vertex and edge preparation over the stations' operating periods.
//!
//! The set of operating gauges changes whenever a station opens or closes,
//! so the date range is cut at every opening and closing date. Within each
//! piece the operating gauges are fixed: their peaks are found and each
//! gauge is linked to the next operating gauge downstream.

use chrono::{Duration, NaiveDate};
use rayon::prelude::*;
use std::collections::BTreeSet;

use crate::config::Config;
use crate::detect::edges::{self, SlopeCalculator};
use crate::detect::peaks;
use crate::ingest::FloodWaveData;
use crate::logging::{self, Stage};
use crate::model::{FloodWaveError, GaugeVertices};
use crate::stations::StationRegistry;
use crate::store::{GeneratedStore, VertexPairs};

/// `start`, `end` and every opening and closing date of `gauges` that falls
/// within `[start, end]`, sorted and without duplicates.
pub fn cut_dates(
    start: NaiveDate,
    end: NaiveDate,
    registry: &StationRegistry,
    gauges: &[String],
) -> Vec<NaiveDate> {
    let mut dates: BTreeSet<NaiveDate> = BTreeSet::from([start, end]);
    for life in gauges.iter().filter_map(|g| registry.life(g)) {
        dates.insert(life.start);
        dates.insert(life.end);
    }
    dates
        .into_iter()
        .filter(|d| start <= *d && *d <= end)
        .collect()
}

/// Gauges operating on the day after `cut`. A gauge without a known
/// operating period always operates.
pub fn existing_gauges(cut: NaiveDate, gauges: &[String], registry: &StationRegistry) -> Vec<String> {
    let probe = cut + Duration::days(1);
    gauges
        .iter()
        .filter(|g| registry.life(g).is_none_or(|life| life.contains(probe)))
        .cloned()
        .collect()
}

/// Counts of one preparation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreparationSummary {
    pub intervals: usize,
    pub vertex_files: usize,
    pub empty_gauges: usize,
    pub edge_files: usize,
}

/// Finds the vertices and edges of every operating period and stores them.
pub struct GraphPreparation<'a> {
    config: &'a Config,
    data: &'a FloodWaveData,
    store: GeneratedStore,
    gauges: Vec<String>,
}

impl<'a> GraphPreparation<'a> {
    /// Uses the configured gauges, or every gauge with a rating table.
    pub fn new(config: &'a Config, data: &'a FloodWaveData) -> Result<Self, FloodWaveError> {
        let gauges = if config.detection.gauges.is_empty() {
            data.registry.gauges()
        } else {
            data.registry.select(&config.detection.gauges)?
        };
        Ok(Self {
            config,
            data,
            store: GeneratedStore::new(config.generated_dir()),
            gauges,
        })
    }

    pub fn store(&self) -> &GeneratedStore {
        &self.store
    }

    pub fn gauges(&self) -> &[String] {
        &self.gauges
    }

    pub fn run(&self) -> Result<PreparationSummary, FloodWaveError> {
        self.store.create_layout()?;

        let detection = &self.config.detection;
        let cuts = cut_dates(detection.start_date, detection.end_date, &self.data.registry, &self.gauges);
        let intervals: Vec<(NaiveDate, NaiveDate)> = cuts.windows(2).map(|w| (w[0], w[1])).collect();
        logging::info(
            Stage::System,
            None,
            &format!(
                "Preparing {} gauges over {} operating periods into {}",
                self.gauges.len(),
                intervals.len(),
                self.store.root().display()
            ),
        );

        let mut summary = PreparationSummary {
            intervals: intervals.len(),
            ..Default::default()
        };

        // Every vertex file is complete before any edge is searched, so
        // continuations across a cut date are found.
        for (start, end) in &intervals {
            let existing = existing_gauges(*start, &self.gauges, &self.data.registry);
            let (written, empty) = logging::timed(Stage::Vertices, "find_vertices", || {
                self.find_vertices(&existing, *start, *end)
            })?;
            summary.vertex_files += written;
            summary.empty_gauges += empty;
        }

        let mut vertex_pairs = VertexPairs::new();
        for (start, end) in &intervals {
            let existing = existing_gauges(*start, &self.gauges, &self.data.registry);
            summary.edge_files += logging::timed(Stage::Edges, "find_edges", || {
                self.find_edges(&existing, *start, *end, &mut vertex_pairs)
            })?;
        }
        self.store.update_vertex_pairs(&vertex_pairs)?;

        Ok(summary)
    }

    /// Finds and stores the vertices of `gauges` within `[start, end]`.
    /// Returns the number of gauges processed and how many had no peaks.
    fn find_vertices(
        &self,
        gauges: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<(usize, usize), FloodWaveError> {
        let radius = self.config.detection.window_radius;
        let table = &self.data.table;
        let registry = &self.data.registry;

        let found: Vec<(String, GaugeVertices)> = gauges
            .par_iter()
            .map(|gauge| {
                if !table.has_gauge(gauge) {
                    logging::warn(Stage::Vertices, Some(gauge.as_str()), "No water level column");
                    return (gauge.clone(), GaugeVertices::new());
                }
                let series = table.series(gauge, start, end).unwrap_or_default();
                let threshold = registry.level_group(gauge);
                if threshold.is_none() {
                    logging::warn(Stage::Vertices, Some(gauge.as_str()), "No level group, peaks classed low");
                }
                (gauge.clone(), peaks::find_vertices(gauge, &series, radius, threshold))
            })
            .collect();

        let mut empty = 0;
        for (gauge, vertices) in &found {
            if vertices.is_empty() {
                empty += 1;
            }
            self.store.save_vertices(gauge, vertices)?;
        }
        logging::log_run_summary(Stage::Vertices, found.len(), found.len() - empty, empty);
        Ok((found.len(), empty))
    }

    /// Links each gauge's vertices within `[start, end]` to the next gauge
    /// downstream. Returns the number of pair files written.
    fn find_edges(
        &self,
        gauges: &[String],
        start: NaiveDate,
        end: NaiveDate,
        vertex_pairs: &mut VertexPairs,
    ) -> Result<usize, FloodWaveError> {
        let mut written = 0;
        let mut empty = 0;
        for pair in StationRegistry::consecutive_pairs(gauges) {
            let current = self.store.read_vertices(&pair.upstream)?;
            let current: GaugeVertices = current
                .range(start..=end)
                .map(|(d, p)| (*d, *p))
                .collect();
            let next = self.store.read_vertices(&pair.downstream)?;

            let slopes = SlopeCalculator::for_gauges(&self.data.registry, &pair.upstream, &pair.downstream)?;
            let params = self.config.detection.params_for(&pair.upstream);
            let found = edges::find_edges(&current, &next, params, &slopes);
            if found.is_empty() {
                empty += 1;
            }
            logging::debug(
                Stage::Edges,
                Some(pair.to_string().as_str()),
                &format!("{} of {} vertices continue", found.len(), current.len()),
            );

            self.store.save_edges(&pair, &found)?;
            vertex_pairs
                .entry(pair.to_string())
                .or_default()
                .extend(found);
            written += 1;
        }
        logging::log_run_summary(Stage::Edges, written, written - empty, empty);
        Ok(written)
    }
}
