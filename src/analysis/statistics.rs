//! Long-run statistics of the flood wave graph.
//!
//! Every function walks the configured year range (inclusive). Years are
//! independent, so the per-year work runs on the rayon pool over one shared
//! [`GraphArchive`]; results come back in year order.

use chrono::{Datelike, NaiveDate};
use rayon::prelude::*;
use std::collections::BTreeMap;

use crate::analysis::descriptive::{self, Summary};
use crate::analysis::extractor::{self, Wave};
use crate::analysis::graph_analysis;
use crate::analysis::selection;
use crate::config::YearsConfig;
use crate::graph::GraphArchive;
use crate::logging::{self, Stage};
use crate::model::{FloodWaveError, GaugePair, NodeKey};
use crate::store::{GeneratedStore, LevelCount};

fn ymd(year: i32, month: u32, day: u32) -> Result<NaiveDate, FloodWaveError> {
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| FloodWaveError::InvalidDate(format!("{:04}-{:02}-{:02}", year, month, day)))
}

/// Whole-year windows `[year-01-01, (year + period - 1)-12-31]`, starting at
/// `first` and stepping by `period`, that end no later than `last`.
pub fn periods(first: i32, last: i32, period: i32) -> Result<Vec<(NaiveDate, NaiveDate)>, FloodWaveError> {
    if period < 1 {
        return Err(FloodWaveError::Config(format!("period must be at least 1 year, got {}", period)));
    }
    let mut windows = Vec::new();
    let mut year = first;
    while year + period - 1 <= last {
        windows.push((ymd(year, 1, 1)?, ymd(year + period - 1, 12, 31)?));
        year += period;
    }
    Ok(windows)
}

/// Statistics of one calendar year.
#[derive(Debug, Clone, PartialEq)]
pub struct YearlyStatistics {
    pub year: i32,
    pub flood_waves: usize,
    pub low: usize,
    pub high: usize,
    /// Velocities of the year's flood waves, km/day. `None` without waves.
    pub velocity: Option<Summary>,
}

/// Low and high vertex counts of every gauge in one year.
#[derive(Debug, Clone, PartialEq)]
pub struct GaugeLevelsOfYear {
    pub year: i32,
    pub counts: BTreeMap<String, LevelCount>,
}

/// Share of high water level vertices in a period.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodRatio {
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// `None` when the period has no vertices.
    pub ratio: Option<f64>,
}

/// Slope statistics (cm/km) of a period.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodSlopes {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub summary: Option<Summary>,
}

/// Mean velocity of the window ending with `year`.
#[derive(Debug, Clone, PartialEq)]
pub struct MovingAverage {
    pub year: i32,
    pub mean_velocity: Option<f64>,
}

pub struct Statistics<'a> {
    archive: &'a GraphArchive,
    store: &'a GeneratedStore,
    gauges: &'a [String],
    sorted_stations: &'a [String],
    years: YearsConfig,
    pairs: Option<&'a [GaugePair]>,
}

impl<'a> Statistics<'a> {
    pub fn new(
        archive: &'a GraphArchive,
        store: &'a GeneratedStore,
        gauges: &'a [String],
        sorted_stations: &'a [String],
        years: YearsConfig,
    ) -> Self {
        Self {
            archive,
            store,
            gauges,
            sorted_stations,
            years,
            pairs: None,
        }
    }

    /// Restricts every composed graph to the trees of `pairs`.
    pub fn with_pairs(mut self, pairs: &'a [GaugePair]) -> Self {
        self.pairs = Some(pairs);
        self
    }

    fn year_range(&self) -> Vec<i32> {
        (self.years.first..=self.years.last).collect()
    }

    /// Flood wave count, vertex levels and velocity summary of every year.
    pub fn yearly_statistics(&self) -> Result<Vec<YearlyStatistics>, FloodWaveError> {
        let rows = logging::timed(Stage::Analysis, "yearly_statistics", || {
            self.year_range()
                .into_par_iter()
                .map(|year| {
                    let (start, end) = (ymd(year, 1, 1)?, ymd(year, 12, 31)?);
                    let graph = self.archive.compose(start, end, self.pairs);
                    let counts = self.store.level_counts(self.gauges, start, end)?;
                    let velocities = graph_analysis::calculate_all_velocities(&graph);
                    Ok(YearlyStatistics {
                        year,
                        flood_waves: extractor::flood_waves(&graph).len(),
                        low: counts.values().map(|c| c.low).sum(),
                        high: counts.values().map(|c| c.high).sum(),
                        velocity: Summary::of(&velocities),
                    })
                })
                .collect::<Result<Vec<_>, FloodWaveError>>()
        })?;
        logging::info(Stage::Analysis, None, &format!("Yearly statistics of {} years", rows.len()));
        Ok(rows)
    }

    /// Low and high vertex counts by gauge, year by year.
    pub fn low_high_by_gauge_yearly(&self) -> Result<Vec<GaugeLevelsOfYear>, FloodWaveError> {
        self.year_range()
            .into_par_iter()
            .map(|year| {
                let counts = self.store.level_counts(self.gauges, ymd(year, 1, 1)?, ymd(year, 12, 31)?)?;
                Ok(GaugeLevelsOfYear { year, counts })
            })
            .collect()
    }

    /// High share of all vertices in each `period`-year window.
    pub fn red_ratio(&self, period: i32) -> Result<Vec<PeriodRatio>, FloodWaveError> {
        periods(self.years.first, self.years.last, period)?
            .into_par_iter()
            .map(|(start, end)| {
                let counts = self.store.level_counts(self.gauges, start, end)?;
                let high: usize = counts.values().map(|c| c.high).sum();
                let total: usize = counts.values().map(LevelCount::total).sum();
                let ratio = (total > 0).then(|| high as f64 / total as f64);
                Ok(PeriodRatio { start, end, ratio })
            })
            .collect()
    }

    /// Slopes stored in `vertex_pairs.json`, summarized per gauge pair and
    /// `period`-year window. Windows without any root date are skipped.
    pub fn slopes_by_vertex_pairs(&self, period: i32) -> Result<BTreeMap<String, Vec<PeriodSlopes>>, FloodWaveError> {
        let vertex_pairs = self.store.read_vertex_pairs()?;
        let windows = periods(self.years.first, self.years.last, period)?;

        let mut result = BTreeMap::new();
        for (pair, edges) in &vertex_pairs {
            let mut rows = Vec::new();
            for (start, end) in &windows {
                let mut in_window = edges.range(*start..=*end).peekable();
                if in_window.peek().is_none() {
                    continue;
                }
                let slopes: Vec<f64> = in_window.flat_map(|(_, c)| c.slopes.iter().copied()).collect();
                rows.push(PeriodSlopes {
                    start: *start,
                    end: *end,
                    summary: Summary::of(&slopes),
                });
            }
            result.insert(pair.clone(), rows);
        }
        Ok(result)
    }

    /// Slopes between the first and last node of the flood waves running
    /// from `start_station` to `end_station`, per `period`-year window.
    pub fn slopes_in_interval(
        &self,
        start_station: &str,
        end_station: &str,
        period: i32,
    ) -> Result<Vec<PeriodSlopes>, FloodWaveError> {
        selection::stations_between(self.sorted_stations, start_station, end_station)?;
        periods(self.years.first, self.years.last, period)?
            .into_par_iter()
            .map(|(start, end)| {
                let graph = self.archive.compose(start, end, self.pairs);
                let cut = selection::select_only_in_interval(&graph, start_station, end_station, self.sorted_stations)?;
                let waves = extractor::waves_from_start_to_end(extractor::flood_waves(&cut), start_station, end_station);
                let slopes: Vec<f64> = waves
                    .iter()
                    .filter_map(|wave| {
                        let first = cut.node(wave.first()?)?;
                        let last = cut.node(wave.last()?)?;
                        let distance = first.river_km - last.river_km;
                        (distance != 0.0).then(|| (last.value - first.value) / distance)
                    })
                    .collect();
                Ok(PeriodSlopes {
                    start,
                    end,
                    summary: Summary::of(&slopes),
                })
            })
            .collect()
    }

    /// Mean flood wave velocity over the `length + 1` years ending with
    /// each year from `first + length` to `last`.
    pub fn yearly_mean_moving_average(&self, length: i32) -> Result<Vec<MovingAverage>, FloodWaveError> {
        if length < 0 {
            return Err(FloodWaveError::Config(format!("moving average length must not be negative, got {}", length)));
        }
        ((self.years.first + length)..=self.years.last)
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|year| {
                let graph = self.archive.compose(ymd(year - length, 1, 1)?, ymd(year, 12, 31)?, self.pairs);
                let velocities = graph_analysis::calculate_all_velocities(&graph);
                Ok(MovingAverage {
                    year,
                    mean_velocity: descriptive::mean(&velocities),
                })
            })
            .collect()
    }

    /// Flood waves that belong to `year`: composed over a window reaching
    /// into the neighbouring winters, then kept when no node falls in the
    /// previous year and not every node falls in the next one.
    pub fn flood_waves_of_year(&self, year: i32) -> Result<Vec<Wave>, FloodWaveError> {
        let start = if year == self.years.first {
            ymd(year, 1, 1)?
        } else {
            ymd(year - 1, 11, 30)?
        };
        let end = if year == self.years.last {
            ymd(year, 12, 31)?
        } else {
            ymd(year + 1, 2, 1)?
        };
        let graph = self.archive.compose(start, end, self.pairs);
        Ok(extractor::flood_waves(&graph)
            .into_iter()
            .filter(|wave| belongs_to_year(wave, year))
            .collect())
    }

    /// Number of flood waves belonging to each year.
    pub fn number_of_flood_waves_yearly(&self) -> Result<Vec<(i32, usize)>, FloodWaveError> {
        self.year_range()
            .into_par_iter()
            .map(|year| Ok((year, self.flood_waves_of_year(year)?.len())))
            .collect()
    }
}

fn belongs_to_year(wave: &[NodeKey], year: i32) -> bool {
    let starts_before = wave.iter().any(|k| k.date.year() == year - 1);
    let all_after = wave.iter().all(|k| k.date.year() == year + 1);
    !starts_before && !all_after
}
