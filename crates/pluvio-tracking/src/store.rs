//! The tracking-store seam and the scoped run guard.
//!
//! A run is opened with [`ActiveRun::start`] (or [`with_run`]) and must be
//! closed on every exit path. The guard closes it as `FAILED` when dropped
//! without an explicit [`ActiveRun::finish`], so an early return, an `Err`
//! or a panic inside the scope never leaves a dangling `RUNNING` run.

use crate::artifacts::{ModelPayload, ModelUri};
use crate::error::{TrackingError, TrackingResult};
use crate::registry::ModelRegistry;
use crate::run::{ExperimentId, RunId, RunInfo, RunRecord, RunStatus};
use std::collections::BTreeMap;
use tracing::{error, info, warn};

pub trait TrackingStore: Send + Sync {
    /// Short backend name used in logs.
    fn id(&self) -> &'static str;

    fn get_or_create_experiment(&self, name: &str) -> TrackingResult<ExperimentId>;

    fn create_run(&self, experiment_id: &ExperimentId) -> TrackingResult<RunInfo>;

    fn get_run(&self, run_id: &RunId) -> TrackingResult<RunRecord>;

    fn log_params(&self, run_id: &RunId, params: &BTreeMap<String, String>) -> TrackingResult<()>;

    fn log_metric(&self, run_id: &RunId, key: &str, value: f64) -> TrackingResult<()>;

    fn set_tags(&self, run_id: &RunId, tags: &BTreeMap<String, String>) -> TrackingResult<()>;

    /// Store `model` under `artifact_path` of the run and return its `runs:/` uri.
    fn log_model(&self, run_id: &RunId, artifact_path: &str, model: &ModelPayload) -> TrackingResult<ModelUri>;

    fn end_run(&self, run_id: &RunId, status: RunStatus) -> TrackingResult<()>;

    /// Most recently started `FINISHED` run of the named experiment, if any.
    /// Failed and still running runs are never returned.
    fn latest_run(&self, experiment_name: &str) -> TrackingResult<Option<RunInfo>>;

    /// Load a model logged with [`TrackingStore::log_model`].
    fn load_model(&self, uri: &ModelUri) -> TrackingResult<ModelPayload>;
}

/// A backend that is both a tracking store and a model registry.
pub trait ModelStore: TrackingStore + ModelRegistry {}

impl<T: TrackingStore + ModelRegistry + ?Sized> ModelStore for T {}

/// An open run. Logging calls go through the guard so they are always scoped
/// to the run it owns.
pub struct ActiveRun<'a> {
    store: &'a dyn TrackingStore,
    info: RunInfo,
    closed: bool,
}

impl<'a> ActiveRun<'a> {
    pub fn start(store: &'a dyn TrackingStore, experiment_name: &str) -> TrackingResult<Self> {
        if experiment_name.trim().is_empty() {
            return Err(TrackingError::Experiment("experiment name is required".to_string()));
        }
        let experiment_id = store.get_or_create_experiment(experiment_name)?;
        let info = store.create_run(&experiment_id)?;
        info!(
            store = store.id(),
            experiment = experiment_name,
            run_id = %info.run_id,
            "Started tracking run"
        );
        Ok(Self { store, info, closed: false })
    }

    #[must_use]
    pub fn info(&self) -> &RunInfo {
        &self.info
    }

    #[must_use]
    pub fn run_id(&self) -> &RunId {
        &self.info.run_id
    }

    pub fn log_params(&self, params: &BTreeMap<String, String>) -> TrackingResult<()> {
        self.store.log_params(&self.info.run_id, params)
    }

    pub fn log_metric(&self, key: &str, value: f64) -> TrackingResult<()> {
        self.store.log_metric(&self.info.run_id, key, value)
    }

    pub fn set_tags(&self, tags: &BTreeMap<String, String>) -> TrackingResult<()> {
        self.store.set_tags(&self.info.run_id, tags)
    }

    pub fn log_model(&self, artifact_path: &str, model: &ModelPayload) -> TrackingResult<ModelUri> {
        self.store.log_model(&self.info.run_id, artifact_path, model)
    }

    /// Close the run as `FINISHED`.
    pub fn finish(mut self) -> TrackingResult<()> {
        self.close(RunStatus::Finished)
    }

    /// Close the run as `FAILED`.
    pub fn fail(mut self) -> TrackingResult<()> {
        self.close(RunStatus::Failed)
    }

    fn close(&mut self, status: RunStatus) -> TrackingResult<()> {
        self.closed = true;
        self.store.end_run(&self.info.run_id, status)?;
        info!(run_id = %self.info.run_id, status = %status, "Closed tracking run");
        Ok(())
    }
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        match self.store.end_run(&self.info.run_id, RunStatus::Failed) {
            Ok(()) => warn!(run_id = %self.info.run_id, "Run scope exited without finishing; marked FAILED"),
            Err(e) => error!(run_id = %self.info.run_id, error = %e, "Failed to close abandoned run"),
        }
    }
}

/// Run `f` inside a tracked run of `experiment_name`.
///
/// The run ends `FINISHED` when `f` returns `Ok` and `FAILED` otherwise; `f`'s
/// error is returned unchanged.
pub fn with_run<T, E, F>(store: &dyn TrackingStore, experiment_name: &str, f: F) -> Result<T, E>
where
    F: FnOnce(&ActiveRun<'_>) -> Result<T, E>,
    E: From<TrackingError>,
{
    let run = ActiveRun::start(store, experiment_name)?;
    match f(&run) {
        Ok(value) => {
            run.finish()?;
            Ok(value)
        }
        Err(err) => {
            let run_id = run.run_id().clone();
            if let Err(close_err) = run.fail() {
                error!(run_id = %run_id, error = %close_err, "Failed to mark run as FAILED");
            }
            Err(err)
        }
    }
}
