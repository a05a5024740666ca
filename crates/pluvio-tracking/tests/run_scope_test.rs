//! Scoped-run guarantees against the local store.

use pluvio_tracking::{
    register_latest_run, load_latest_model, with_run, ActiveRun, LocalStore, ModelPayload, ModelRegistry,
    RunStatus, TrackingError, TrackingStore,
};
use std::collections::BTreeMap;
use tempfile::TempDir;

fn payload(weight: f64) -> ModelPayload {
    ModelPayload { flavor: "test".to_string(), body: serde_json::json!({ "weight": weight }) }
}

#[test]
fn test_with_run_finishes_on_success() {
    let temp = TempDir::new().unwrap();
    let store = LocalStore::new(temp.path().to_path_buf());

    let run_id = with_run(&store, "exp", |run| {
        run.log_metric("RMSE", 2.5)?;
        Ok::<_, TrackingError>(run.run_id().clone())
    })
    .unwrap();

    let record = store.get_run(&run_id).unwrap();
    assert_eq!(record.info.status, RunStatus::Finished);
    assert_eq!(record.metrics["RMSE"], 2.5);
}

#[test]
fn test_with_run_fails_run_on_error_and_keeps_logged_metrics() {
    let temp = TempDir::new().unwrap();
    let store = LocalStore::new(temp.path().to_path_buf());

    let mut started = None;
    let result: Result<(), TrackingError> = with_run(&store, "exp", |run| {
        started = Some(run.run_id().clone());
        run.log_metric("RMSE", 3.0)?;
        Err(TrackingError::Artifact("upload failed".to_string()))
    });
    assert!(result.is_err());

    let record = store.get_run(&started.unwrap()).unwrap();
    assert_eq!(record.info.status, RunStatus::Failed);
    assert_eq!(record.metrics["RMSE"], 3.0);
}

#[test]
fn test_dropped_guard_marks_run_failed() {
    let temp = TempDir::new().unwrap();
    let store = LocalStore::new(temp.path().to_path_buf());

    let run_id = {
        let run = ActiveRun::start(&store, "exp").unwrap();
        let mut tags = BTreeMap::new();
        tags.insert("location_names".to_string(), "[\"X\"]".to_string());
        run.set_tags(&tags).unwrap();
        run.run_id().clone()
    };

    let record = store.get_run(&run_id).unwrap();
    assert_eq!(record.info.status, RunStatus::Failed);
    assert!(record.info.end_time.is_some());
}

#[test]
fn test_panic_inside_scope_still_closes_run() {
    let temp = TempDir::new().unwrap();
    let store = LocalStore::new(temp.path().to_path_buf());

    let mut started = None;
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _: Result<(), TrackingError> = with_run(&store, "exp", |run| {
            started = Some(run.run_id().clone());
            panic!("boom")
        });
    }));
    assert!(outcome.is_err());

    assert_eq!(store.get_run(&started.unwrap()).unwrap().info.status, RunStatus::Failed);
    assert!(store.latest_run("exp").unwrap().is_none());
}

#[test]
fn test_register_latest_run_and_load() {
    let temp = TempDir::new().unwrap();
    let store = LocalStore::new(temp.path().to_path_buf());

    for weight in [1.0, 2.0] {
        with_run(&store, "exp", |run| {
            run.log_model("models", &payload(weight))?;
            Ok::<_, TrackingError>(())
        })
        .unwrap();
        // Keep start times strictly ordered on coarse clocks.
        std::thread::sleep(std::time::Duration::from_millis(5));
    }

    let version = register_latest_run(&store, "exp", "models", "drought").unwrap();
    assert_eq!(version.version, 1);

    let (loaded_version, model) = load_latest_model(&store, "drought").unwrap();
    assert_eq!(loaded_version, store.latest_version("drought").unwrap());
    assert_eq!(model, payload(2.0));
}

#[test]
fn test_register_latest_run_without_runs_is_not_found() {
    let temp = TempDir::new().unwrap();
    let store = LocalStore::new(temp.path().to_path_buf());

    let err = register_latest_run(&store, "empty", "models", "drought").unwrap_err();
    assert!(matches!(err, TrackingError::NotFound(_)));
}

#[test]
fn test_register_latest_run_skips_failed_runs() {
    let temp = TempDir::new().unwrap();
    let store = LocalStore::new(temp.path().to_path_buf());

    let good = with_run(&store, "exp", |run| {
        run.log_model("models", &payload(1.0))?;
        Ok::<_, TrackingError>(run.run_id().clone())
    })
    .unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));

    // Newer runs that aborted, one after logging its model, one before.
    let logged_then_failed: Result<(), TrackingError> = with_run(&store, "exp", |run| {
        run.log_model("models", &payload(9.0))?;
        Err(TrackingError::Artifact("drift check failed".to_string()))
    });
    assert!(logged_then_failed.is_err());
    std::thread::sleep(std::time::Duration::from_millis(5));
    let failed_early: Result<(), TrackingError> =
        with_run(&store, "exp", |_run| Err(TrackingError::InvalidRun("too few rows".to_string())));
    assert!(failed_early.is_err());

    assert_eq!(store.latest_run("exp").unwrap().unwrap().run_id, good);

    let version = register_latest_run(&store, "exp", "models", "drought").unwrap();
    assert_eq!(version.run_id, good);
    assert_eq!(load_latest_model(&store, "drought").unwrap().1, payload(1.0));
}
