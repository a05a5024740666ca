use crate::artifacts::{ModelPayload, ModelUri};
use crate::error::{TrackingError, TrackingResult};
use crate::run::RunId;
use crate::store::ModelStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

/// A registered, versioned model entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelVersion {
    pub name: String,
    /// 1-based, increasing per name.
    pub version: u64,
    /// Run whose artifact backs this version.
    pub run_id: RunId,
    /// Where the artifact lives, as recorded by the backend.
    pub source: String,
    pub created_at: DateTime<Utc>,
}

impl ModelVersion {
    /// The `runs:/` uri of the backing artifact.
    ///
    /// `source` is either a `runs:/` uri or an artifact location ending in
    /// `/artifacts/<artifact_path>`.
    pub fn run_model_uri(&self) -> TrackingResult<ModelUri> {
        if self.source.starts_with("runs:/") {
            return ModelUri::parse(&self.source);
        }
        let (_, path) = self.source.rsplit_once("/artifacts/").ok_or_else(|| {
            TrackingError::InvalidUri(format!(
                "cannot derive artifact path of {} v{} from source {}",
                self.name, self.version, self.source
            ))
        })?;
        Ok(ModelUri::for_run(&self.run_id, path))
    }
}

pub trait ModelRegistry: Send + Sync {
    /// Promote a run's model artifact to a new version of `name`.
    fn register(&self, model_uri: &ModelUri, name: &str) -> TrackingResult<ModelVersion>;

    fn latest_version(&self, name: &str) -> TrackingResult<ModelVersion>;
}

pub(crate) fn not_registered(name: &str) -> TrackingError {
    TrackingError::NotFound(format!(
        "Model {name} not found in model registry. Consider registering model first."
    ))
}

/// Register the model of the most recent finished run of `experiment_name`
/// as a new version of `model_name`.
pub fn register_latest_run(
    store: &dyn ModelStore,
    experiment_name: &str,
    artifact_path: &str,
    model_name: &str,
) -> TrackingResult<ModelVersion> {
    let run = store
        .latest_run(experiment_name)?
        .ok_or_else(|| TrackingError::NotFound(format!("no finished runs in experiment {experiment_name}")))?;

    let uri = ModelUri::for_run(&run.run_id, artifact_path);
    let version = store.register(&uri, model_name)?;
    info!(
        model = model_name,
        version = version.version,
        run_id = %run.run_id,
        "Registered model version"
    );
    Ok(version)
}

/// Load the newest registered version of `model_name`.
pub fn load_latest_model(store: &dyn ModelStore, model_name: &str) -> TrackingResult<(ModelVersion, ModelPayload)> {
    let version = store.latest_version(model_name)?;
    let uri = version.run_model_uri()?;
    let payload = store.load_model(&uri)?;
    info!(model = model_name, version = version.version, uri = %uri, "Loaded registered model");
    Ok((version, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version_with_source(source: &str) -> ModelVersion {
        ModelVersion {
            name: "m".to_string(),
            version: 1,
            run_id: RunId("abc".to_string()),
            source: source.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_run_model_uri_from_runs_source() {
        let v = version_with_source("runs:/abc/models");
        assert_eq!(v.run_model_uri().unwrap().to_string(), "runs:/abc/models");
    }

    #[test]
    fn test_run_model_uri_from_artifact_location() {
        let v = version_with_source("mlflow-artifacts:/1/abc/artifacts/models");
        assert_eq!(v.run_model_uri().unwrap().to_string(), "runs:/abc/models");
    }

    #[test]
    fn test_run_model_uri_rejects_opaque_source() {
        let v = version_with_source("s3://bucket/somewhere");
        assert!(v.run_model_uri().is_err());
    }
}
