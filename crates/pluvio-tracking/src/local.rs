//! Directory-backed tracking store and model registry.

use crate::artifacts::{LoggedModel, ModelPayload, ModelUri, MODEL_FILE, MODEL_META_FILE};
use crate::error::{TrackingError, TrackingResult};
use crate::layout::StoreLayout;
use crate::registry::{not_registered, ModelRegistry, ModelVersion};
use crate::run::{ExperimentId, RunId, RunInfo, RunRecord, RunStatus};
use crate::store::TrackingStore;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ExperimentMeta {
    experiment_id: ExperimentId,
    name: String,
    created_at: DateTime<Utc>,
}

/// Tracking store persisted as JSON documents under a root directory.
#[derive(Debug, Clone)]
pub struct LocalStore {
    layout: StoreLayout,
}

impl LocalStore {
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        Self { layout: StoreLayout::new(root) }
    }

    /// Accepts a plain path or a `file://` uri.
    #[must_use]
    pub fn from_uri(uri: &str) -> Self {
        let path = uri.strip_prefix("file://").unwrap_or(uri);
        Self::new(PathBuf::from(path))
    }

    #[must_use]
    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    fn experiments(&self) -> TrackingResult<Vec<ExperimentMeta>> {
        let mut out = Vec::new();
        for dir in list_dirs(&self.layout.experiments_dir())? {
            let meta_path = dir.join("meta.json");
            if meta_path.exists() {
                out.push(read_json::<ExperimentMeta>(&meta_path)?);
            }
        }
        Ok(out)
    }

    fn find_experiment(&self, name: &str) -> TrackingResult<Option<ExperimentMeta>> {
        Ok(self.experiments()?.into_iter().find(|e| e.name == name))
    }

    /// Locate the experiment that owns `run_id`.
    fn experiment_of(&self, run_id: &RunId) -> TrackingResult<ExperimentId> {
        for meta in self.experiments()? {
            if self.layout.run_record_path(&meta.experiment_id, run_id).exists() {
                return Ok(meta.experiment_id);
            }
        }
        Err(TrackingError::NotFound(format!("run {run_id}")))
    }

    fn update_run<F>(&self, run_id: &RunId, f: F) -> TrackingResult<()>
    where
        F: FnOnce(&mut RunRecord) -> TrackingResult<()>,
    {
        let experiment_id = self.experiment_of(run_id)?;
        let path = self.layout.run_record_path(&experiment_id, run_id);
        let mut record: RunRecord = read_json(&path)?;
        f(&mut record)?;
        write_json(&path, &record)
    }

    fn update_active_run<F>(&self, run_id: &RunId, f: F) -> TrackingResult<()>
    where
        F: FnOnce(&mut RunRecord),
    {
        self.update_run(run_id, |record| {
            if record.info.status.is_terminal() {
                return Err(TrackingError::InvalidRun(format!(
                    "run {} is already {}",
                    run_id, record.info.status
                )));
            }
            f(record);
            Ok(())
        })
    }

    fn versions(&self, name: &str) -> TrackingResult<Vec<ModelVersion>> {
        let dir = self.layout.model_dir(name);
        let entries = match std::fs::read_dir(&dir) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut out = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                out.push(read_json::<ModelVersion>(&path)?);
            }
        }
        out.sort_by_key(|v| v.version);
        Ok(out)
    }
}

impl TrackingStore for LocalStore {
    fn id(&self) -> &'static str {
        "local"
    }

    fn get_or_create_experiment(&self, name: &str) -> TrackingResult<ExperimentId> {
        let existing = self.experiments()?;
        if let Some(meta) = existing.iter().find(|e| e.name == name) {
            return Ok(meta.experiment_id.clone());
        }

        let next = existing
            .iter()
            .filter_map(|e| e.experiment_id.0.parse::<u64>().ok())
            .max()
            .map_or(0, |max| max + 1);
        let meta = ExperimentMeta {
            experiment_id: ExperimentId(next.to_string()),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        std::fs::create_dir_all(self.layout.experiment_dir(&meta.experiment_id))?;
        write_json(&self.layout.experiment_meta_path(&meta.experiment_id), &meta)?;
        debug!(experiment = name, experiment_id = %meta.experiment_id, "Created experiment");
        Ok(meta.experiment_id)
    }

    fn create_run(&self, experiment_id: &ExperimentId) -> TrackingResult<RunInfo> {
        if !self.layout.experiment_meta_path(experiment_id).exists() {
            return Err(TrackingError::Experiment(format!("unknown experiment id {experiment_id}")));
        }

        let run_id = RunId::new();
        self.layout.ensure_run_dirs(experiment_id, &run_id)?;
        let info = RunInfo {
            run_id: run_id.clone(),
            experiment_id: experiment_id.clone(),
            status: RunStatus::Running,
            start_time: Utc::now(),
            end_time: None,
            artifact_uri: self.layout.artifacts_dir(experiment_id, &run_id).display().to_string(),
        };
        write_json(&self.layout.run_record_path(experiment_id, &run_id), &RunRecord::new(info.clone()))?;
        Ok(info)
    }

    fn get_run(&self, run_id: &RunId) -> TrackingResult<RunRecord> {
        let experiment_id = self.experiment_of(run_id)?;
        read_json(&self.layout.run_record_path(&experiment_id, run_id))
    }

    fn log_params(&self, run_id: &RunId, params: &BTreeMap<String, String>) -> TrackingResult<()> {
        self.update_run(run_id, |record| {
            if record.info.status.is_terminal() {
                return Err(TrackingError::InvalidRun(format!("run {run_id} is already {}", record.info.status)));
            }
            // Params are write-once, like on a tracking server.
            for (key, value) in params {
                if let Some(old) = record.params.get(key) {
                    if old != value {
                        return Err(TrackingError::InvalidRun(format!(
                            "param {key} already logged with a different value"
                        )));
                    }
                }
                record.params.insert(key.clone(), value.clone());
            }
            Ok(())
        })
    }

    fn log_metric(&self, run_id: &RunId, key: &str, value: f64) -> TrackingResult<()> {
        self.update_active_run(run_id, |record| {
            record.metrics.insert(key.to_string(), value);
        })
    }

    fn set_tags(&self, run_id: &RunId, tags: &BTreeMap<String, String>) -> TrackingResult<()> {
        self.update_active_run(run_id, |record| {
            record.tags.extend(tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        })
    }

    fn log_model(&self, run_id: &RunId, artifact_path: &str, model: &ModelPayload) -> TrackingResult<ModelUri> {
        let record = self.get_run(run_id)?;
        if record.info.status.is_terminal() {
            return Err(TrackingError::InvalidRun(format!("run {run_id} is already {}", record.info.status)));
        }

        let artifact_path = artifact_path.trim_matches('/');
        if artifact_path.is_empty() || artifact_path.split('/').any(|seg| seg == "..") {
            return Err(TrackingError::Artifact(format!("invalid artifact path: {artifact_path:?}")));
        }

        let dir = self.layout.artifacts_dir(&record.info.experiment_id, run_id).join(artifact_path);
        std::fs::create_dir_all(&dir)?;

        let model_bytes = serde_json::to_vec_pretty(model)?;
        let meta = LoggedModel::describe(run_id, artifact_path, model, &model_bytes);
        write_bytes(&dir.join(MODEL_FILE), &model_bytes)?;
        write_json(&dir.join(MODEL_META_FILE), &meta)?;
        debug!(run_id = %run_id, path = %dir.display(), "Logged model artifact");
        Ok(ModelUri::for_run(run_id, artifact_path))
    }

    fn end_run(&self, run_id: &RunId, status: RunStatus) -> TrackingResult<()> {
        if !status.is_terminal() {
            return Err(TrackingError::InvalidRun(format!("cannot end run with status {status}")));
        }
        self.update_run(run_id, |record| {
            record.info.status = status;
            record.info.end_time = Some(Utc::now());
            Ok(())
        })
    }

    fn latest_run(&self, experiment_name: &str) -> TrackingResult<Option<RunInfo>> {
        let Some(meta) = self.find_experiment(experiment_name)? else {
            return Ok(None);
        };

        let mut latest: Option<RunInfo> = None;
        for dir in list_dirs(&self.layout.runs_dir(&meta.experiment_id))? {
            let path = dir.join("run.json");
            if !path.exists() {
                continue;
            }
            let record: RunRecord = read_json(&path)?;
            if record.info.status != RunStatus::Finished {
                continue;
            }
            if latest.as_ref().is_none_or(|l| record.info.start_time > l.start_time) {
                latest = Some(record.info);
            }
        }
        Ok(latest)
    }

    fn load_model(&self, uri: &ModelUri) -> TrackingResult<ModelPayload> {
        let ModelUri { run_id, artifact_path } = uri;
        let experiment_id = self.experiment_of(run_id)?;
        let dir = self.layout.artifacts_dir(&experiment_id, run_id).join(artifact_path);

        let model_path = dir.join(MODEL_FILE);
        if !model_path.exists() {
            return Err(TrackingError::NotFound(format!("no model at {uri}")));
        }
        let bytes = std::fs::read(&model_path)?;

        let meta_path = dir.join(MODEL_META_FILE);
        if meta_path.exists() {
            read_json::<LoggedModel>(&meta_path)?.verify(&bytes)?;
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl ModelRegistry for LocalStore {
    fn register(&self, model_uri: &ModelUri, name: &str) -> TrackingResult<ModelVersion> {
        let run_id = &model_uri.run_id;
        if name.trim().is_empty() || name.contains(['/', '\\']) {
            return Err(TrackingError::InvalidUri(format!("invalid model name: {name:?}")));
        }
        // Fails early when the artifact is missing.
        self.load_model(model_uri)?;

        let next = self.versions(name)?.last().map_or(1, |v| v.version + 1);
        let version = ModelVersion {
            name: name.to_string(),
            version: next,
            run_id: run_id.clone(),
            source: model_uri.to_string(),
            created_at: Utc::now(),
        };
        std::fs::create_dir_all(self.layout.model_dir(name))?;
        write_json(&self.layout.model_version_path(name, next), &version)?;
        Ok(version)
    }

    fn latest_version(&self, name: &str) -> TrackingResult<ModelVersion> {
        self.versions(name)?.pop().ok_or_else(|| not_registered(name))
    }
}

fn list_dirs(dir: &Path) -> TrackingResult<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(d) => d,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut out = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> TrackingResult<T> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> TrackingResult<()> {
    let json = serde_json::to_vec_pretty(value)?;
    write_bytes(path, &json)
}

/// Write through a sibling temp file so readers never see a half-written document.
fn write_bytes(path: &Path, bytes: &[u8]) -> TrackingResult<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}
