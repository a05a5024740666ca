use crate::error::TrackingResult;
use crate::run::{ExperimentId, RunId};
use std::path::{Path, PathBuf};

/// Filesystem layout of a local tracking store.
///
/// ```text
/// <root>/experiments/<experiment_id>/meta.json
/// <root>/experiments/<experiment_id>/runs/<run_id>/run.json
/// <root>/experiments/<experiment_id>/runs/<run_id>/artifacts/<artifact_path>/...
/// <root>/registry/<model_name>/<version>.json
/// ```
#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn experiments_dir(&self) -> PathBuf {
        self.root.join("experiments")
    }

    #[must_use]
    pub fn experiment_dir(&self, experiment_id: &ExperimentId) -> PathBuf {
        self.experiments_dir().join(experiment_id.0.as_str())
    }

    #[must_use]
    pub fn experiment_meta_path(&self, experiment_id: &ExperimentId) -> PathBuf {
        self.experiment_dir(experiment_id).join("meta.json")
    }

    #[must_use]
    pub fn runs_dir(&self, experiment_id: &ExperimentId) -> PathBuf {
        self.experiment_dir(experiment_id).join("runs")
    }

    #[must_use]
    pub fn run_dir(&self, experiment_id: &ExperimentId, run_id: &RunId) -> PathBuf {
        self.runs_dir(experiment_id).join(run_id.as_str())
    }

    #[must_use]
    pub fn run_record_path(&self, experiment_id: &ExperimentId, run_id: &RunId) -> PathBuf {
        self.run_dir(experiment_id, run_id).join("run.json")
    }

    #[must_use]
    pub fn artifacts_dir(&self, experiment_id: &ExperimentId, run_id: &RunId) -> PathBuf {
        self.run_dir(experiment_id, run_id).join("artifacts")
    }

    #[must_use]
    pub fn registry_dir(&self) -> PathBuf {
        self.root.join("registry")
    }

    #[must_use]
    pub fn model_dir(&self, name: &str) -> PathBuf {
        self.registry_dir().join(name)
    }

    #[must_use]
    pub fn model_version_path(&self, name: &str, version: u64) -> PathBuf {
        self.model_dir(name).join(format!("{version}.json"))
    }

    pub fn ensure_run_dirs(&self, experiment_id: &ExperimentId, run_id: &RunId) -> TrackingResult<()> {
        std::fs::create_dir_all(self.artifacts_dir(experiment_id, run_id))?;
        Ok(())
    }
}
