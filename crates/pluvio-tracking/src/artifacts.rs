use crate::error::{TrackingError, TrackingResult};
use crate::run::RunId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// File holding the serialized model inside a model artifact directory.
pub const MODEL_FILE: &str = "model.json";
/// File describing the model artifact (flavor, checksums).
pub const MODEL_META_FILE: &str = "MLmodel.json";

/// A serialized model as handed to / returned from a tracking store.
///
/// Stores do not interpret `body`; the `flavor` tells the loader which
/// model type it was written by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPayload {
    pub flavor: String,
    pub body: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactFile {
    pub path: String,
    pub sha256: String,
}

/// Metadata written next to a logged model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggedModel {
    pub run_id: RunId,
    pub artifact_path: String,
    pub flavor: String,
    pub created_at: DateTime<Utc>,
    pub files: Vec<ArtifactFile>,
}

impl LoggedModel {
    pub fn describe(run_id: &RunId, artifact_path: &str, payload: &ModelPayload, model_bytes: &[u8]) -> Self {
        Self {
            run_id: run_id.clone(),
            artifact_path: artifact_path.to_string(),
            flavor: payload.flavor.clone(),
            created_at: Utc::now(),
            files: vec![ArtifactFile { path: MODEL_FILE.to_string(), sha256: sha256_bytes(model_bytes) }],
        }
    }

    /// Check `model_bytes` against the recorded checksum of the model file.
    pub fn verify(&self, model_bytes: &[u8]) -> TrackingResult<()> {
        let expected = self
            .files
            .iter()
            .find(|f| f.path == MODEL_FILE)
            .ok_or_else(|| TrackingError::Artifact(format!("no {MODEL_FILE} entry in model metadata")))?;
        let actual = sha256_bytes(model_bytes);
        if actual != expected.sha256 {
            return Err(TrackingError::Artifact(format!(
                "checksum mismatch for {}/{}: expected {}, got {}",
                self.artifact_path, MODEL_FILE, expected.sha256, actual
            )));
        }
        Ok(())
    }
}

#[must_use]
pub fn sha256_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Address of a model artifact logged by a run: `runs:/<run_id>/<artifact_path>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelUri {
    pub run_id: RunId,
    pub artifact_path: String,
}

impl ModelUri {
    #[must_use]
    pub fn for_run(run_id: &RunId, artifact_path: &str) -> Self {
        Self { run_id: run_id.clone(), artifact_path: artifact_path.trim_matches('/').to_string() }
    }

    pub fn parse(raw: &str) -> TrackingResult<Self> {
        let rest = raw
            .strip_prefix("runs:/")
            .ok_or_else(|| TrackingError::InvalidUri(format!("unsupported scheme: {raw}")))?;
        let (run_id, path) = rest
            .split_once('/')
            .ok_or_else(|| TrackingError::InvalidUri(format!("missing artifact path: {raw}")))?;
        let path = path.trim_matches('/');
        if run_id.is_empty() || path.is_empty() {
            return Err(TrackingError::InvalidUri(raw.to_string()));
        }
        Ok(Self { run_id: RunId(run_id.to_string()), artifact_path: path.to_string() })
    }
}

impl std::fmt::Display for ModelUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "runs:/{}/{}", self.run_id, self.artifact_path)
    }
}

impl std::str::FromStr for ModelUri {
    type Err = TrackingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
