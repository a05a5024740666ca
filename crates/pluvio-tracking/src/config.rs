use crate::error::TrackingResult;
use crate::local::LocalStore;
use crate::mlflow::MlflowClient;
use crate::store::ModelStore;
use serde::{Deserialize, Serialize};

/// Where runs and registered models live, and how to reach them.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// `http(s)://` for a tracking server, anything else is a local directory.
    #[serde(default = "default_uri")]
    pub uri: String,
    #[serde(default = "default_experiment_name")]
    pub experiment_name: String,
    #[serde(default = "default_model_name")]
    pub model_name: String,
    /// Artifact sub-path the trained model is logged under.
    #[serde(default = "default_artifact_path")]
    pub artifact_path: String,
    /// Base url of the artifact proxy when it is not the tracking server itself.
    #[serde(default)]
    pub artifact_endpoint: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

fn default_uri() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_experiment_name() -> String {
    "weather-prediction-exp".to_string()
}

fn default_model_name() -> String {
    "drought-prediction".to_string()
}

fn default_artifact_path() -> String {
    "models".to_string()
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            uri: default_uri(),
            experiment_name: default_experiment_name(),
            model_name: default_model_name(),
            artifact_path: default_artifact_path(),
            artifact_endpoint: None,
            username: None,
            password: None,
            token: None,
        }
    }
}

impl std::fmt::Debug for TrackingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingConfig")
            .field("uri", &self.uri)
            .field("experiment_name", &self.experiment_name)
            .field("model_name", &self.model_name)
            .field("artifact_path", &self.artifact_path)
            .field("artifact_endpoint", &self.artifact_endpoint)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("token", &self.token.as_ref().map(|_| "***"))
            .finish()
    }
}

impl TrackingConfig {
    #[must_use]
    pub fn is_remote(&self) -> bool {
        self.uri.starts_with("http://") || self.uri.starts_with("https://")
    }
}

/// Open the backend `config.uri` points at.
pub fn open_store(config: &TrackingConfig) -> TrackingResult<Box<dyn ModelStore>> {
    if !config.is_remote() {
        return Ok(Box::new(LocalStore::from_uri(&config.uri)));
    }

    let mut client = MlflowClient::new(&config.uri)?;
    if let Some(endpoint) = &config.artifact_endpoint {
        client = client.with_artifact_endpoint(endpoint);
    }
    if let Some(token) = &config.token {
        client = client.with_token(token.clone());
    } else if let Some(username) = &config.username {
        client = client.with_basic_auth(username.clone(), config.password.clone());
    }
    Ok(Box::new(client))
}
