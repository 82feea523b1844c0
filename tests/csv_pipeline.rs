//! Dataset on disk through the loader, batch run, table file and game facade.

mod common;

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use chrono::Duration;
use gridgame::config::game_config::ObjectiveConfig;
use gridgame::data::csv_loader::CsvProfileLoader;
use gridgame::data::profile_loader::ProfileLoader;
use gridgame::utils::csv_export::{export_dispatch_csv, export_table_summary};
use gridgame::{BatchOptimizer, CapacityBounds, CapacityVector, GameEngine, SourceSet, WeeklyOptimumTable};

fn write_dataset(path: &Path, days: i64) {
    let mut file = std::fs::File::create(path).unwrap();
    writeln!(file, "datetime,demand,solar,wind,nuclear").unwrap();
    for h in 0..days * 24 {
        let ts = common::week_start() + Duration::hours(h);
        let hour = h % 24;
        let demand = 3000.0 + 40.0 * (hour as f64 - 12.0).abs();
        let solar = if (7..19).contains(&hour) { 600.0 - 50.0 * (hour as f64 - 13.0).abs() } else { 0.0 };
        let wind = 400.0 + 100.0 * ((h % 9) as f64);
        writeln!(file, "{},{},{},{},{}", ts.format("%Y-%m-%d %H:%M:%S"), demand, solar, wind, 2500.0).unwrap();
    }
}

#[test]
fn dataset_to_table_to_engine() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("power.csv");
    write_dataset(&data, 14);

    let loader = CsvProfileLoader::from_path(&data).unwrap().with_demand_scale(0.1);
    assert_eq!(loader.available_weeks(), vec![1, 2]);
    let week_one = loader.load_week(1).unwrap();
    assert_eq!(week_one.len(), 168);
    assert_eq!(week_one.duration_hours(), 168.0);
    assert!(week_one.demand.iter().all(|d| *d >= 300.0 && *d <= 348.0));

    let sources = SourceSet::default_catalog();
    let loader: Arc<dyn ProfileLoader> = Arc::new(loader);
    let batch = BatchOptimizer::new(Arc::clone(&loader), sources.clone(), CapacityBounds::uniform(2000.0), common::quick_batch(2));
    let table = batch.run(&[1, 2]).unwrap();
    assert!(table.ensure_complete().is_ok());

    let table_path = dir.path().join("weekly_optimum.json");
    table.save_to_file(&table_path).unwrap();
    let summary_path = dir.path().join("summary.csv");
    export_table_summary(&table, &summary_path).unwrap();
    assert_eq!(std::fs::read_to_string(&summary_path).unwrap().lines().count(), 3);

    let engine = GameEngine::new(
        sources,
        ObjectiveConfig::default(),
        loader,
        WeeklyOptimumTable::load_from_file(&table_path).unwrap(),
    );

    let (optimum, optimum_score) = engine.lookup_optimum(1).unwrap();
    assert!(optimum_score.is_feasible());
    assert_eq!(engine.evaluate(&optimum, 1).unwrap().shortfall, 0.0);

    let undersized = CapacityVector::new().with("gas", 100.0);
    let comparison = engine.compare(&undersized, 1).unwrap();
    assert!(!comparison.candidate_feasible());
    assert!(comparison.candidate.blackout_steps > 0);

    let report = engine.dispatch(&undersized, 1).unwrap();
    assert_eq!(report.blackout_windows().len(), 1);
    let dispatch_path = dir.path().join("dispatch.csv");
    export_dispatch_csv(&report, &dispatch_path).unwrap();
    assert_eq!(std::fs::read_to_string(&dispatch_path).unwrap().lines().count(), 169);
}
