//! Pipeline stages against the sample fixture and a generated station feed.

use chrono::NaiveDate;
use pluvio_core::{
    build_features, source, AppConfig, Cleaner, ColumnData, ColumnDrift, DriftDetector, DriftGate, FeatureSpec,
    LinearRegression, Observation, Pipeline, PipelineError, PipelineResult, Snapshot, StatTest,
};
use pluvio_tracking::{register_latest_run, LocalStore, RunStatus, TrackingStore};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const STATION: &str = "BARCELONA AEROPUERTO, SP";

fn fixture_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data/data_sample.csv")
}

fn load_fixture() -> Snapshot {
    source::load(&fixture_path().display().to_string()).unwrap()
}

/// Daily feed from a fixed-seed generator: mostly dry days, seasonal showers.
fn write_station_feed(dir: &Path, days: u64, seed: u64) -> PathBuf {
    let mut rng = StdRng::seed_from_u64(seed);

    let start = NaiveDate::from_ymd_opt(1950, 1, 1).unwrap();
    let mut csv = String::from("STATION,DATE,NAME,PRCP\n");
    for day in 0..days {
        let date = start + chrono::Days::new(day);
        let season = ((day % 365) as f64 / 365.0 * std::f64::consts::TAU).sin();
        let u: f64 = rng.gen_range(0.0..1.0);
        let prcp = if u < 0.6 { 0.0 } else { ((u - 0.6) * 40.0 + 5.0 * (season + 1.0)).round() / 10.0 };
        writeln!(csv, "SP000008181,{date},\"{STATION}\",{prcp}").unwrap();
    }

    let path = dir.join("station.csv");
    std::fs::write(&path, csv).unwrap();
    path
}

fn config_for(source: &Path, store: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.source.location = source.display().to_string();
    config.tracking.uri = store.display().to_string();
    config
}

#[test]
fn test_loader_reads_fixture() {
    let raw = load_fixture();

    assert_eq!(raw.len(), 3);
    assert_eq!(raw.records()[0].date, NaiveDate::from_ymd_opt(1938, 12, 30).unwrap());
    assert!(raw.iter().all(|r| r.station_name == STATION));
}

#[test]
fn test_clean_fixture_keeps_one_row() {
    let clean = Cleaner::default().clean(&load_fixture());

    assert_eq!(clean.len(), 1);
    assert_eq!(clean.records()[0].date, NaiveDate::from_ymd_opt(1939, 1, 2).unwrap());
}

#[test]
fn test_feature_build_on_short_history_is_empty() {
    let clean = Cleaner::default().clean(&load_fixture());

    let frame = build_features(&clean, &FeatureSpec::default()).unwrap();

    assert_eq!(frame.len(), 0);
    assert_eq!(frame.column_count(), 11);
}

#[test]
fn test_hard_gate_passes_fixture_and_catches_outlier() {
    let gate = DriftGate::default();
    let raw = load_fixture();
    let clean = Cleaner::default().clean(&raw);

    let report = gate.check_hard(&raw, &clean).unwrap();
    assert_eq!(report.drifted_count(), 0);
    assert_eq!(gate.check_hard(&raw, &raw).unwrap().drifted_count(), 0);

    let tampered: Snapshot = clean
        .iter()
        .map(|r| Observation { precipitation: Some(1_000_000.0), ..r.clone() })
        .collect();
    let err = gate.check_hard(&raw, &tampered).unwrap_err();
    assert!(matches!(err, PipelineError::DriftDetected { drifted, .. } if drifted >= 1));
}

#[test]
fn test_pipeline_end_to_end_is_reproducible() {
    let data = TempDir::new().unwrap();
    let feed = write_station_feed(data.path(), 1200, 42);

    let mut results = Vec::new();
    for _ in 0..2 {
        let tracking = TempDir::new().unwrap();
        let config = config_for(&feed, tracking.path());
        let store = LocalStore::new(tracking.path().to_path_buf());

        let report = Pipeline::new(&config, &store).run().unwrap();

        assert_eq!(report.raw_rows, 1200);
        assert_eq!(report.clean_rows, 1200);
        assert_eq!(report.feature_rows, 1200 - 365);
        assert_eq!(report.feature_columns, 11);
        assert_eq!(report.training.split.test, 167);

        let record = store.get_run(&report.training.run_id).unwrap();
        assert_eq!(record.info.status, RunStatus::Finished);
        assert_eq!(record.metrics["RMSE"], report.training.rmse);
        let drift_flag = if report.training.drift_detected { 1.0 } else { 0.0 };
        assert_eq!(record.metrics["DRIFT_DETECTED"], drift_flag);
        assert_eq!(record.params["features"], "[\"lag_365\"]");
        assert_eq!(record.params["test_size"], "0.2");
        assert_eq!(record.tags["location_names"], format!("[\"{STATION}\"]"));

        let payload = store.load_model(&report.training.model_uri).unwrap();
        assert_eq!(LinearRegression::from_payload(&payload).unwrap(), report.training.model);

        results.push(report.training.rmse);
    }

    assert!(results[0].is_finite());
    assert_eq!(results[0], results[1]);
}

#[test]
fn test_cleaning_drift_aborts_before_training() {
    let data = TempDir::new().unwrap();
    let tracking = TempDir::new().unwrap();
    let config = config_for(data.path(), tracking.path());
    let store = LocalStore::new(tracking.path().to_path_buf());

    let dry = NaiveDate::from_ymd_opt(1938, 1, 1).unwrap();
    let wet = NaiveDate::from_ymd_opt(1950, 1, 1).unwrap();
    let raw: Snapshot = (0..20_u64)
        .map(|i| {
            let (start, prcp) = if i < 10 { (dry, 0.0) } else { (wet, 5.0) };
            Observation {
                station_name: STATION.to_string(),
                date: start + chrono::Days::new(i),
                precipitation: Some(prcp),
            }
        })
        .collect();

    let err = Pipeline::new(&config, &store).run_snapshot(&raw).unwrap_err();

    assert!(matches!(err, PipelineError::DriftDetected { drifted: 1, total: 2 }));
    assert!(store.latest_run(&config.tracking.experiment_name).unwrap().is_none());
}

#[test]
fn test_missing_source_column_aborts_pipeline() {
    let data = TempDir::new().unwrap();
    let tracking = TempDir::new().unwrap();
    let feed = data.path().join("broken.csv");
    std::fs::write(&feed, "DATE,NAME,TMAX\n1950-01-01,X,10\n").unwrap();
    let config = config_for(&feed, tracking.path());
    let store = LocalStore::new(tracking.path().to_path_buf());

    let err = Pipeline::new(&config, &store).run().unwrap_err();

    assert!(matches!(err, PipelineError::Schema { ref missing, .. } if missing == &vec!["PRCP".to_string()]));
}

/// Flags a column whenever the two sides are not identical.
struct AnyDifference;

impl DriftDetector for AnyDifference {
    fn name(&self) -> &'static str {
        "any-difference"
    }

    fn compare_column(&self, column: &str, reference: &ColumnData, current: &ColumnData) -> PipelineResult<ColumnDrift> {
        let score = if reference == current { 0.0 } else { 1.0 };
        Ok(ColumnDrift::new(column, StatTest::Wasserstein, score, 0.5))
    }
}

#[test]
fn test_prediction_drift_is_recorded_not_fatal() {
    let data = TempDir::new().unwrap();
    let tracking = TempDir::new().unwrap();
    let feed = write_station_feed(data.path(), 1000, 3);
    let config = config_for(&feed, tracking.path());
    let store = LocalStore::new(tracking.path().to_path_buf());

    let report = Pipeline::new(&config, &store)
        .with_gate(DriftGate::new(Box::new(AnyDifference)))
        .run()
        .unwrap();

    assert_eq!(report.clean_drift.drifted_count(), 0);
    assert!(report.training.drift_detected);
    let record = store.get_run(&report.training.run_id).unwrap();
    assert_eq!(record.info.status, RunStatus::Finished);
    assert_eq!(record.metrics["DRIFT_DETECTED"], 1.0);
    assert_eq!(record.metrics["RMSE"], report.training.rmse);
}

#[test]
fn test_registration_ignores_aborted_training() {
    let good_data = TempDir::new().unwrap();
    let short_data = TempDir::new().unwrap();
    let tracking = TempDir::new().unwrap();
    let store = LocalStore::new(tracking.path().to_path_buf());

    let good = config_for(&write_station_feed(good_data.path(), 1000, 42), tracking.path());
    let report = Pipeline::new(&good, &store).run().unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));

    // One row survives feature building, which cannot be split.
    let short = config_for(&write_station_feed(short_data.path(), 366, 42), tracking.path());
    let err = Pipeline::new(&short, &store).run().unwrap_err();
    assert!(matches!(err, PipelineError::EmptyDataset(_)));

    let tracking_config = &good.tracking;
    let version = register_latest_run(
        &store,
        &tracking_config.experiment_name,
        &tracking_config.artifact_path,
        &tracking_config.model_name,
    )
    .unwrap();
    assert_eq!(version.run_id, report.training.run_id);
}
