/// End-to-end run of the flood wave pipeline on a small synthetic river.
///
/// Three gauges, `a` (300 km), `b` (200 km) and `c` (100 km), each with one
/// peak in April 2006: a on the 4th, b on the 6th, c on the 8th. With a
/// forward window of 3 days the peaks chain into a single flood wave.
///
/// A second river, `staged`, opens gauge `b` mid-range so preparation runs
/// over two operating periods.
///
/// Run with: cargo test --test pipeline_integration

use chrono::NaiveDate;
use std::fs;
use std::path::Path;

use floodwave_service::analysis::statistics::Statistics;
use floodwave_service::analysis::{extractor, graph_analysis, selection};
use floodwave_service::config::Config;
use floodwave_service::detect::GraphPreparation;
use floodwave_service::graph::{GraphArchive, GraphBuilder, WaveGraph};
use floodwave_service::ingest::FloodWaveData;
use floodwave_service::model::{GaugePair, NodeKey, WaterLevel, WaveEdge};
use floodwave_service::report;
use floodwave_service::store::{GeneratedStore, LevelCount};
use floodwave_service::verify;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2006, 4, d).unwrap()
}

const A: [f64; 12] = [100.0, 110.0, 130.0, 200.0, 150.0, 120.0, 110.0, 100.0, 100.0, 100.0, 100.0, 100.0];
const B: [f64; 12] = [100.0, 100.0, 100.0, 120.0, 150.0, 300.0, 200.0, 150.0, 100.0, 100.0, 100.0, 100.0];
const C: [f64; 12] = [90.0, 90.0, 90.0, 90.0, 100.0, 150.0, 200.0, 250.0, 220.0, 200.0, 90.0, 90.0];

fn write_data(dir: &Path) {
    fs::create_dir_all(dir).unwrap();

    let mut levels = String::from(";Date;a;b;c\n");
    for i in 0..A.len() {
        levels.push_str(&format!(
            "{};2006-04-{:02};{};{};{}\n",
            i,
            i + 1,
            A[i],
            B[i],
            C[i]
        ));
    }
    fs::write(dir.join("gauge_levels.csv"), levels).unwrap();

    fs::write(
        dir.join("gauge_meta.csv"),
        "id;river;river_km;h_table\nc;Tisza;100.0;1\na;Tisza;300.0;1\nb;Tisza;200.0;1\nx;Duna;150.0;1\n",
    )
    .unwrap();

    // a and c peak above their level group, b stays below.
    fs::write(dir.join("level_groups.json"), r#"{"a": 180.0, "b": 400.0, "c": 240.0}"#).unwrap();
}

fn config(root: &Path) -> Config {
    detection_config(
        root,
        "backward_days = 0\nforward_days = 3\nwindow_radius = 2\nstart_date = \"2006-04-01\"\nend_date = \"2006-04-12\"",
    )
}

fn detection_config(root: &Path, detection: &str) -> Config {
    let text = format!(
        r#"
[data]
dir = "{data}"

[detection]
{detection}

[output]
dir = "{out}"

[years]
first = 2006
last = 2006
"#,
        data = root.join("data").display(),
        out = root.join("out").display(),
        detection = detection
    );
    Config::from_toml_str(&text).unwrap()
}

struct Pipeline {
    _dir: tempfile::TempDir,
    config: Config,
    data: FloodWaveData,
    store: GeneratedStore,
}

/// Prepares and builds the synthetic river.
fn run_pipeline() -> Pipeline {
    let dir = tempfile::tempdir().unwrap();
    write_data(&dir.path().join("data"));
    let config = config(dir.path());

    let data = FloodWaveData::load(&config.data).unwrap();
    let preparation = GraphPreparation::new(&config, &data).unwrap();
    let summary = preparation.run().unwrap();
    assert_eq!(summary.intervals, 1);
    assert_eq!(summary.edge_files, 2);

    let store = GeneratedStore::new(config.generated_dir());
    GraphBuilder::new(&store, &data.registry).build_graph().unwrap();

    Pipeline {
        _dir: dir,
        config,
        data,
        store,
    }
}

/// Twenty April days. `b` opens on the 10th, cutting the range in two.
///
/// First period, a and c only: a peaks on the 8th, c on the 12th (found in
/// the second period). Second period: a 15th, b 16th, c 18th.
fn write_staged_data(dir: &Path) {
    fs::create_dir_all(dir).unwrap();

    let mut a = [100.0; 20];
    a[5..10].copy_from_slice(&[120.0, 150.0, 200.0, 150.0, 120.0]);
    a[12..17].copy_from_slice(&[120.0, 160.0, 210.0, 160.0, 120.0]);
    let mut b = [100.0; 20];
    b[13..18].copy_from_slice(&[120.0, 170.0, 250.0, 170.0, 120.0]);
    let mut c = [90.0; 20];
    c[9..14].copy_from_slice(&[100.0, 130.0, 180.0, 130.0, 100.0]);
    c[15..20].copy_from_slice(&[100.0, 140.0, 190.0, 140.0, 100.0]);

    let mut levels = String::from(";Date;a;b;c\n");
    for i in 0..20 {
        levels.push_str(&format!("{};2006-04-{:02};{};{};{}\n", i, i + 1, a[i], b[i], c[i]));
    }
    fs::write(dir.join("gauge_levels.csv"), levels).unwrap();
    fs::write(
        dir.join("gauge_meta.csv"),
        "id;river;river_km;h_table\na;Tisza;300.0;1\nb;Tisza;200.0;1\nc;Tisza;100.0;1\n",
    )
    .unwrap();
    fs::write(dir.join("level_groups.json"), r#"{"a": 180.0, "b": 200.0, "c": 185.0}"#).unwrap();
    fs::write(
        dir.join("station_lifetimes.json"),
        r#"{"b": {"start": "2006-04-10", "end": "2019-12-31"}}"#,
    )
    .unwrap();
}

fn april(p: &Pipeline) -> WaveGraph {
    GraphArchive::load(&p.store).unwrap().compose(day(1), day(30), None)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn test_verification_accepts_missing_optional_file() {
    let dir = tempfile::tempdir().unwrap();
    write_data(&dir.path().join("data"));
    let config = config(dir.path());

    let report = verify::verify_data_files(&config.data);
    assert!(report.is_usable());
    assert_eq!(report.summary.working, 3);
    assert_eq!(report.summary.partial, 1, "no operating periods file");
}

#[test]
fn test_preparation_stores_classified_vertices_and_edges() {
    let p = run_pipeline();
    assert!(p.config.generated_dir().ends_with("generated_0_3_2"));
    assert_eq!(p.data.registry.gauges(), vec!["a", "b", "c"], "river order, other rivers dropped");

    let a = p.store.read_vertices("a").unwrap();
    assert_eq!(a.len(), 1);
    assert_eq!(a[&day(4)].level, WaterLevel::High);
    assert_eq!(p.store.read_vertices("b").unwrap()[&day(6)].level, WaterLevel::Low);

    let ab = p.store.read_edges(&GaugePair::new("a", "b")).unwrap();
    assert_eq!(ab[&day(4)].next_dates, vec![day(6)]);
    assert_eq!(ab[&day(4)].slopes, vec![1.0], "(300 - 200) cm over 100 km");

    let pairs = p.store.read_vertex_pairs().unwrap();
    assert_eq!(pairs.keys().collect::<Vec<_>>(), vec!["a_b", "b_c"]);
}

#[test]
fn test_composed_graph_holds_one_flood_wave() {
    let p = run_pipeline();
    let graph = april(&p);
    assert_eq!(graph.node_count(), 3);
    assert_eq!(graph.edge_count(), 2);
    assert_eq!(
        graph.edge(&NodeKey::new("b", day(6)), &NodeKey::new("c", day(8))),
        Some(WaveEdge { slope: Some(-0.5) })
    );

    let waves = extractor::flood_waves(&graph);
    assert_eq!(
        waves,
        vec![vec![
            NodeKey::new("a", day(4)),
            NodeKey::new("b", day(6)),
            NodeKey::new("c", day(8)),
        ]]
    );

    let mut csv = Vec::new();
    report::write_waves(&mut csv, &waves).unwrap();
    let text = String::from_utf8(csv).unwrap();
    assert!(text.contains("a@2006-04-04,c@2006-04-08,3,4,"), "{}", text);

    GraphArchive::save_joined(&p.store, &graph).unwrap();
    assert!(p.store.joined_graph_path().is_file());
}

#[test]
fn test_analysis_of_the_wave() {
    let p = run_pipeline();
    let graph = april(&p);
    let sorted = p.data.registry.sorted_ids();

    assert_eq!(graph_analysis::count_waves(&graph, "a", "c", &sorted).unwrap(), 1);
    assert_eq!(graph_analysis::propagation_time(&graph, "a", "c", &sorted).unwrap(), Some(4.0));
    assert_eq!(graph_analysis::count_unfinished_waves(&graph, "a", "c", &sorted).unwrap(), 0);
    assert_eq!(graph_analysis::calculate_all_velocities(&graph), vec![50.0]);

    assert_eq!(selection::select_by_water_level(&graph, "a", WaterLevel::High).node_count(), 3);
    assert!(selection::select_by_water_level(&graph, "b", WaterLevel::High).is_empty());

    let branches = graph_analysis::branching(&graph).unwrap();
    assert_eq!(branches.len(), 1);
    assert_eq!(
        graph_analysis::branch_extent(&graph, &branches[0]),
        Some((NodeKey::new("a", day(4)), NodeKey::new("c", day(8))))
    );
}

#[test]
fn test_yearly_statistics_of_the_river() {
    let p = run_pipeline();
    let archive = GraphArchive::load(&p.store).unwrap();
    let gauges = p.data.registry.gauges();
    let sorted = p.data.registry.sorted_ids();
    let stats = Statistics::new(&archive, &p.store, &gauges, &sorted, p.config.years);

    let yearly = stats.yearly_statistics().unwrap();
    assert_eq!(yearly.len(), 1);
    assert_eq!(yearly[0].flood_waves, 1);
    assert_eq!((yearly[0].low, yearly[0].high), (1, 2));
    assert_eq!(yearly[0].velocity.unwrap().mean, 50.0);

    let by_gauge = stats.low_high_by_gauge_yearly().unwrap();
    assert_eq!(by_gauge[0].counts["c"], LevelCount { low: 0, high: 1 });

    let ratio = stats.red_ratio(1).unwrap();
    assert!((ratio[0].ratio.unwrap() - 2.0 / 3.0).abs() < 1e-12);

    assert_eq!(stats.number_of_flood_waves_yearly().unwrap(), vec![(2006, 1)]);
}

#[test]
fn test_preparation_across_operating_periods() {
    let dir = tempfile::tempdir().unwrap();
    write_staged_data(&dir.path().join("data"));
    let config = detection_config(
        dir.path(),
        "backward_days = 0\nforward_days = 4\nwindow_radius = 2\nstart_date = \"2006-04-01\"\nend_date = \"2006-04-20\"",
    );

    let data = FloodWaveData::load(&config.data).unwrap();
    let summary = GraphPreparation::new(&config, &data).unwrap().run().unwrap();
    assert_eq!(summary.intervals, 2);
    assert_eq!(summary.vertex_files, 5, "a and c, then a, b and c");
    assert_eq!(summary.edge_files, 3);

    let store = GeneratedStore::new(config.generated_dir());
    let a = store.read_vertices("a").unwrap();
    assert_eq!(a.keys().copied().collect::<Vec<_>>(), vec![day(8), day(15)], "merged over both periods");

    let pairs = store.read_vertex_pairs().unwrap();
    assert_eq!(pairs.keys().collect::<Vec<_>>(), vec!["a_b", "a_c", "b_c"]);

    // While b is closed, a links straight to c, and the continuation on the
    // 12th lies past the cut date.
    let ac = &pairs["a_c"];
    assert_eq!(ac.keys().copied().collect::<Vec<_>>(), vec![day(8)]);
    assert_eq!(ac[&day(8)].next_dates, vec![day(12)]);

    // Upstream vertices are cut to the period: a's peak on the 8th has no a_b edge.
    let ab = &pairs["a_b"];
    assert_eq!(ab.keys().copied().collect::<Vec<_>>(), vec![day(15)]);
    assert_eq!(ab[&day(15)].next_dates, vec![day(16)]);
    assert_eq!(pairs["b_c"][&day(16)].next_dates, vec![day(18)]);

    GraphBuilder::new(&store, &data.registry).build_graph().unwrap();
    let graph = GraphArchive::load(&store).unwrap().compose(day(1), day(30), None);
    let mut waves = extractor::flood_waves(&graph);
    waves.sort();
    assert_eq!(
        waves,
        vec![
            vec![NodeKey::new("a", day(8)), NodeKey::new("c", day(12))],
            vec![
                NodeKey::new("a", day(15)),
                NodeKey::new("b", day(16)),
                NodeKey::new("c", day(18)),
            ],
        ]
    );
}
