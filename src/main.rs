use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use floodwave_service::analysis::statistics::Statistics;
use floodwave_service::analysis::{extractor, graph_analysis, selection};
use floodwave_service::config::Config;
use floodwave_service::detect::GraphPreparation;
use floodwave_service::graph::{GraphArchive, GraphBuilder, WaveGraph};
use floodwave_service::ingest::{self, FloodWaveData};
use floodwave_service::logging::{self, Stage};
use floodwave_service::model::{parse_date, FloodWaveError, GaugePair, WaterLevel};
use floodwave_service::report;
use floodwave_service::stations::StationRegistry;
use floodwave_service::store::GeneratedStore;
use floodwave_service::verify;

/// Flood wave detection and analysis.
#[derive(Parser)]
#[command(name = "floodwave", about = "Detect and analyse flood waves along a river", version)]
struct Cli {
    /// Configuration file; defaults apply when it does not exist.
    #[arg(long, default_value = "floodwave.toml")]
    config: PathBuf,
    /// Write CSV results here instead of stdout.
    #[arg(long, short)]
    output: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check that the data files exist and parse.
    Verify,
    /// Find vertices and edges of every gauge and store them.
    Prepare,
    /// Build the per-root trees from the stored edges.
    Build,
    /// Compose the trees of a date window into `joined_graph.json`.
    Compose {
        #[command(flatten)]
        window: Window,
        /// Only these gauge pairs, as `<up>_<down>`.
        #[arg(long = "pair")]
        pairs: Vec<String>,
    },
    /// List the flood waves of a date window.
    Waves {
        #[command(flatten)]
        window: Window,
        /// Keep only waves passing this station ...
        #[arg(long, requires = "level")]
        station: Option<String>,
        /// ... with a peak of this water level there.
        #[arg(long, requires = "station")]
        level: Option<String>,
    },
    /// Measurements on the graph of a date window.
    Analyze {
        #[command(flatten)]
        window: Window,
        #[command(subcommand)]
        command: AnalyzeCommand,
    },
    /// Year by year statistics over the configured years.
    Stats {
        /// Only the trees of these gauge pairs, as `<up>_<down>`.
        #[arg(long = "pair")]
        pairs: Vec<String>,
        #[command(subcommand)]
        command: StatsCommand,
    },
}

#[derive(Args)]
struct Window {
    /// First root date, YYYY-MM-DD.
    #[arg(long)]
    start: String,
    /// Last root date, YYYY-MM-DD.
    #[arg(long)]
    end: String,
}

#[derive(Args)]
struct Interval {
    /// Upstream end station.
    start_station: String,
    /// Downstream end station.
    end_station: String,
}

#[derive(Subcommand)]
enum AnalyzeCommand {
    /// Number of flood waves running through the interval.
    Count(Interval),
    /// Mean travel time through the interval, in days.
    Propagation {
        #[command(flatten)]
        interval: Interval,
        /// Weight every path by the size of its wave class.
        #[arg(long)]
        weighted: bool,
    },
    /// Waves entering the interval that never reach its end.
    Unfinished(Interval),
    /// Velocity of every flood wave.
    Velocities,
    /// Wave classes across consecutive section stations.
    FloodMap {
        #[arg(required = true, num_args = 2..)]
        sections: Vec<String>,
    },
    /// Branches of the graph with their extents.
    Branches,
}

#[derive(Subcommand)]
enum StatsCommand {
    Yearly,
    LowHigh,
    RedRatio {
        #[arg(long, default_value_t = 10)]
        period: i32,
    },
    PairSlopes {
        #[arg(long, default_value_t = 10)]
        period: i32,
    },
    IntervalSlopes {
        #[command(flatten)]
        interval: Interval,
        #[arg(long, default_value_t = 10)]
        period: i32,
    },
    MovingAverage {
        #[arg(long, default_value_t = 10)]
        length: i32,
    },
    YearlyWaves,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let level = match config.log_level() {
        Ok(level) => level,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    logging::init_logger(level, config.logging.file.as_deref(), config.logging.timestamps);

    match run(&cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            logging::error(Stage::System, None, &e.to_string());
            ExitCode::FAILURE
        }
    }
}

fn output(path: Option<&Path>) -> Result<Box<dyn Write>, FloodWaveError> {
    match path {
        Some(path) => Ok(Box::new(File::create(path).map_err(|e| FloodWaveError::io(path, e))?)),
        None => Ok(Box::new(io::stdout())),
    }
}

fn compose_window(store: &GeneratedStore, window: &Window) -> Result<WaveGraph, FloodWaveError> {
    let archive = GraphArchive::load(store)?;
    Ok(archive.compose(parse_date(&window.start)?, parse_date(&window.end)?, None))
}

/// Gauges taking part: the configured ones, or every gauge with a table.
fn selected_gauges(config: &Config, registry: &StationRegistry) -> Result<Vec<String>, FloodWaveError> {
    if config.detection.gauges.is_empty() {
        Ok(registry.gauges())
    } else {
        registry.select(&config.detection.gauges)
    }
}

fn parse_pairs(raw: &[String]) -> Result<Vec<GaugePair>, FloodWaveError> {
    raw.iter().map(|p| GaugePair::parse(p)).collect()
}

fn run(cli: &Cli, config: &Config) -> Result<(), FloodWaveError> {
    let store = GeneratedStore::new(config.generated_dir());
    let out = cli.output.as_deref();

    match &cli.command {
        Command::Verify => {
            let report = verify::verify_data_files(&config.data);
            verify::print_summary(&report);
            if !report.is_usable() {
                return Err(FloodWaveError::Config(format!(
                    "{} required data file(s) failed verification",
                    report.summary.failed
                )));
            }
        }
        Command::Prepare => {
            let data = FloodWaveData::load(&config.data)?;
            let preparation = GraphPreparation::new(config, &data)?;
            let summary = preparation.run()?;
            logging::info(
                Stage::System,
                None,
                &format!(
                    "Prepared {} periods: {} vertex passes ({} empty), {} edge files",
                    summary.intervals, summary.vertex_files, summary.empty_gauges, summary.edge_files
                ),
            );
        }
        Command::Build => {
            let registry = ingest::load_registry(&config.data)?;
            GraphBuilder::new(&store, &registry).build_graph()?;
        }
        Command::Compose { window, pairs } => {
            let archive = GraphArchive::load(&store)?;
            let pairs = parse_pairs(pairs)?;
            let wanted = (!pairs.is_empty()).then_some(pairs.as_slice());
            let graph = archive.compose(parse_date(&window.start)?, parse_date(&window.end)?, wanted);
            GraphArchive::save_joined(&store, &graph)?;
            logging::info(
                Stage::Graph,
                None,
                &format!(
                    "Joined graph has {} nodes and {} edges",
                    graph.node_count(),
                    graph.edge_count()
                ),
            );
        }
        Command::Waves { window, station, level } => {
            let mut graph = compose_window(&store, window)?;
            if let (Some(station), Some(level)) = (station, level) {
                let level: WaterLevel = level.parse()?;
                graph = selection::select_by_water_level(&graph, station, level);
            }
            report::write_waves(output(out)?, &extractor::flood_waves(&graph))?;
        }
        Command::Analyze { window, command } => {
            let graph = compose_window(&store, window)?;
            let sorted = ingest::load_registry(&config.data)?.sorted_ids();
            analyze(&graph, &sorted, command, out)?;
        }
        Command::Stats { pairs, command } => {
            let registry = ingest::load_registry(&config.data)?;
            let gauges = selected_gauges(config, &registry)?;
            let sorted = registry.sorted_ids();
            let pairs = parse_pairs(pairs)?;
            let archive = GraphArchive::load(&store)?;
            let mut stats = Statistics::new(&archive, &store, &gauges, &sorted, config.years);
            if !pairs.is_empty() {
                stats = stats.with_pairs(&pairs);
            }
            stats_command(&stats, &gauges, command, out)?;
        }
    }
    Ok(())
}

fn analyze(
    graph: &WaveGraph,
    sorted: &[String],
    command: &AnalyzeCommand,
    out: Option<&Path>,
) -> Result<(), FloodWaveError> {
    match command {
        AnalyzeCommand::Count(i) => {
            let count = graph_analysis::count_waves(graph, &i.start_station, &i.end_station, sorted)?;
            println!("{}", count);
        }
        AnalyzeCommand::Propagation { interval: i, weighted } => {
            let days = if *weighted {
                graph_analysis::propagation_time_weighted(graph, &i.start_station, &i.end_station, sorted)?
            } else {
                graph_analysis::propagation_time(graph, &i.start_station, &i.end_station, sorted)?
            };
            match days {
                Some(days) => println!("{:.3}", days),
                None => println!("no flood wave from {} to {}", i.start_station, i.end_station),
            }
        }
        AnalyzeCommand::Unfinished(i) => {
            let count = graph_analysis::count_unfinished_waves(graph, &i.start_station, &i.end_station, sorted)?;
            println!("{}", count);
        }
        AnalyzeCommand::Velocities => {
            report::write_velocities(output(out)?, &graph_analysis::calculate_all_velocities(graph))?;
        }
        AnalyzeCommand::FloodMap { sections } => {
            let map = graph_analysis::create_flood_map(graph, sections, sorted)?;
            report::write_flood_map(output(out)?, &map)?;
        }
        AnalyzeCommand::Branches => {
            let rows: Vec<_> = graph_analysis::branching(graph)?
                .iter()
                .filter_map(|branch| {
                    graph_analysis::branch_extent(graph, branch).map(|(start, end)| (start, end, branch.len()))
                })
                .collect();
            report::write_branches(output(out)?, &rows)?;
        }
    }
    Ok(())
}

fn stats_command(
    stats: &Statistics,
    gauges: &[String],
    command: &StatsCommand,
    out: Option<&Path>,
) -> Result<(), FloodWaveError> {
    match command {
        StatsCommand::Yearly => report::write_yearly_statistics(output(out)?, &stats.yearly_statistics()?),
        StatsCommand::LowHigh => report::write_low_high(output(out)?, gauges, &stats.low_high_by_gauge_yearly()?),
        StatsCommand::RedRatio { period } => report::write_period_ratios(output(out)?, &stats.red_ratio(*period)?),
        StatsCommand::PairSlopes { period } => {
            report::write_pair_slopes(output(out)?, &stats.slopes_by_vertex_pairs(*period)?)
        }
        StatsCommand::IntervalSlopes { interval, period } => {
            let rows = stats.slopes_in_interval(&interval.start_station, &interval.end_station, *period)?;
            report::write_period_slopes(output(out)?, &rows)
        }
        StatsCommand::MovingAverage { length } => {
            report::write_moving_average(output(out)?, &stats.yearly_mean_moving_average(*length)?)
        }
        StatsCommand::YearlyWaves => report::write_wave_counts(output(out)?, &stats.number_of_flood_waves_yearly()?),
    }
}
