//! Client for an MLflow-compatible tracking server (REST API 2.0).
//!
//! Run metadata and the model registry go through `/api/2.0/mlflow/...`.
//! Model files go through the server's artifact proxy
//! (`/api/2.0/mlflow-artifacts/artifacts/...`), so only runs whose artifact
//! root is a `mlflow-artifacts:` uri can carry models.

use crate::artifacts::{LoggedModel, ModelPayload, ModelUri, MODEL_FILE, MODEL_META_FILE};
use crate::error::{TrackingError, TrackingResult};
use crate::registry::{not_registered, ModelRegistry, ModelVersion};
use crate::run::{ExperimentId, RunId, RunInfo, RunRecord, RunStatus};
use crate::store::TrackingStore;
use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

const RESOURCE_DOES_NOT_EXIST: &str = "RESOURCE_DOES_NOT_EXIST";
const RESOURCE_ALREADY_EXISTS: &str = "RESOURCE_ALREADY_EXISTS";

#[derive(Clone)]
enum Credentials {
    None,
    Bearer(String),
    Basic { username: String, password: Option<String> },
}

/// Tracking store and model registry backed by a remote tracking server.
#[derive(Clone)]
pub struct MlflowClient {
    base_url: String,
    artifact_url: String,
    credentials: Credentials,
    client: Client,
}

impl std::fmt::Debug for MlflowClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MlflowClient")
            .field("base_url", &self.base_url)
            .field("artifact_url", &self.artifact_url)
            .finish_non_exhaustive()
    }
}

impl MlflowClient {
    pub fn new(base_url: &str) -> TrackingResult<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        Ok(Self {
            artifact_url: base_url.clone(),
            base_url,
            credentials: Credentials::None,
            client: Client::builder().timeout(Duration::from_secs(60)).build()?,
        })
    }

    /// Send artifact traffic to a different host than the tracking api.
    #[must_use]
    pub fn with_artifact_endpoint(mut self, endpoint: &str) -> Self {
        self.artifact_url = endpoint.trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_token(mut self, token: String) -> Self {
        self.credentials = Credentials::Bearer(token);
        self
    }

    #[must_use]
    pub fn with_basic_auth(mut self, username: String, password: Option<String>) -> Self {
        self.credentials = Credentials::Basic { username, password };
        self
    }

    fn api(&self, endpoint: &str) -> String {
        format!("{}/api/2.0/mlflow/{}", self.base_url, endpoint)
    }

    fn artifact(&self, path: &str) -> String {
        format!("{}/api/2.0/mlflow-artifacts/artifacts/{}", self.artifact_url, path)
    }

    fn execute(&self, request: RequestBuilder) -> TrackingResult<Response> {
        let request = match &self.credentials {
            Credentials::None => request,
            Credentials::Bearer(token) => request.bearer_auth(token),
            Credentials::Basic { username, password } => request.basic_auth(username, password.as_ref()),
        };
        let response = request.send()?;
        if response.status().is_success() {
            return Ok(response);
        }
        Err(api_error(response))
    }

    fn get_json<T: DeserializeOwned>(&self, endpoint: &str, query: &[(&str, &str)]) -> TrackingResult<T> {
        let response = self.execute(self.client.get(self.api(endpoint)).query(query))?;
        Ok(response.json()?)
    }

    fn post_json<T: DeserializeOwned>(&self, endpoint: &str, body: &serde_json::Value) -> TrackingResult<T> {
        let response = self.execute(self.client.post(self.api(endpoint)).json(body))?;
        Ok(response.json()?)
    }

    fn post(&self, endpoint: &str, body: &serde_json::Value) -> TrackingResult<()> {
        self.execute(self.client.post(self.api(endpoint)).json(body))?;
        Ok(())
    }

    fn experiment_by_name(&self, name: &str) -> TrackingResult<Option<ExperimentId>> {
        match self.get_json::<ExperimentEnvelope>("experiments/get-by-name", &[("experiment_name", name)]) {
            Ok(env) => Ok(Some(ExperimentId(env.experiment.experiment_id))),
            Err(e) if is_code(&e, RESOURCE_DOES_NOT_EXIST) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn log_batch(&self, run_id: &RunId, body: serde_json::Value) -> TrackingResult<()> {
        let mut body = body;
        body["run_id"] = json!(run_id.as_str());
        self.post("runs/log-batch", &body)
    }

    fn model_dir(&self, run_id: &RunId, artifact_path: &str) -> TrackingResult<String> {
        let record = self.get_run(run_id)?;
        let root = proxied_path(&record.info.artifact_uri)?;
        Ok(format!("{}/{}", root, artifact_path.trim_matches('/')))
    }

    fn upload(&self, path: &str, bytes: Vec<u8>) -> TrackingResult<()> {
        self.execute(self.client.put(self.artifact(path)).body(bytes))?;
        Ok(())
    }

    fn download(&self, path: &str) -> TrackingResult<Vec<u8>> {
        let response = self.execute(self.client.get(self.artifact(path)))?;
        Ok(response.bytes()?.to_vec())
    }
}

impl TrackingStore for MlflowClient {
    fn id(&self) -> &'static str {
        "mlflow"
    }

    fn get_or_create_experiment(&self, name: &str) -> TrackingResult<ExperimentId> {
        if let Some(id) = self.experiment_by_name(name)? {
            return Ok(id);
        }
        let created: CreateExperimentResponse = self.post_json("experiments/create", &json!({ "name": name }))?;
        debug!(experiment = name, experiment_id = %created.experiment_id, "Created experiment");
        Ok(ExperimentId(created.experiment_id))
    }

    fn create_run(&self, experiment_id: &ExperimentId) -> TrackingResult<RunInfo> {
        let env: RunEnvelope = self.post_json(
            "runs/create",
            &json!({ "experiment_id": experiment_id.0, "start_time": Utc::now().timestamp_millis() }),
        )?;
        env.run.info.into_info()
    }

    fn get_run(&self, run_id: &RunId) -> TrackingResult<RunRecord> {
        let env: RunEnvelope = match self.get_json("runs/get", &[("run_id", run_id.as_str())]) {
            Ok(env) => env,
            Err(e) if is_code(&e, RESOURCE_DOES_NOT_EXIST) => {
                return Err(TrackingError::NotFound(format!("run {run_id}")));
            }
            Err(e) => return Err(e),
        };
        env.run.into_record()
    }

    fn log_params(&self, run_id: &RunId, params: &BTreeMap<String, String>) -> TrackingResult<()> {
        self.log_batch(run_id, json!({ "params": key_values(params) }))
    }

    fn log_metric(&self, run_id: &RunId, key: &str, value: f64) -> TrackingResult<()> {
        let metric = WireMetric { key: key.to_string(), value, timestamp: Utc::now().timestamp_millis(), step: 0 };
        self.log_batch(run_id, json!({ "metrics": [metric] }))
    }

    fn set_tags(&self, run_id: &RunId, tags: &BTreeMap<String, String>) -> TrackingResult<()> {
        self.log_batch(run_id, json!({ "tags": key_values(tags) }))
    }

    fn log_model(&self, run_id: &RunId, artifact_path: &str, model: &ModelPayload) -> TrackingResult<ModelUri> {
        let artifact_path = artifact_path.trim_matches('/');
        let dir = self.model_dir(run_id, artifact_path)?;

        let model_bytes = serde_json::to_vec_pretty(model)?;
        let meta = LoggedModel::describe(run_id, artifact_path, model, &model_bytes);
        self.upload(&format!("{dir}/{MODEL_FILE}"), model_bytes)?;
        self.upload(&format!("{dir}/{MODEL_META_FILE}"), serde_json::to_vec_pretty(&meta)?)?;
        debug!(run_id = %run_id, path = %dir, "Uploaded model artifact");
        Ok(ModelUri::for_run(run_id, artifact_path))
    }

    fn end_run(&self, run_id: &RunId, status: RunStatus) -> TrackingResult<()> {
        if !status.is_terminal() {
            return Err(TrackingError::InvalidRun(format!("cannot end run with status {status}")));
        }
        self.post(
            "runs/update",
            &json!({
                "run_id": run_id.as_str(),
                "status": status.as_str(),
                "end_time": Utc::now().timestamp_millis(),
            }),
        )
    }

    fn latest_run(&self, experiment_name: &str) -> TrackingResult<Option<RunInfo>> {
        let Some(experiment_id) = self.experiment_by_name(experiment_name)? else {
            return Ok(None);
        };
        let found: SearchRunsResponse = self.post_json(
            "runs/search",
            &json!({
                "experiment_ids": [experiment_id.0],
                "filter": "attributes.status = 'FINISHED'",
                "max_results": 1,
                "order_by": ["attributes.start_time DESC"],
            }),
        )?;
        found.runs.into_iter().next().map(|run| run.info.into_info()).transpose()
    }

    fn load_model(&self, uri: &ModelUri) -> TrackingResult<ModelPayload> {
        let ModelUri { run_id, artifact_path } = uri;
        let dir = self.model_dir(run_id, artifact_path)?;
        let bytes = match self.download(&format!("{dir}/{MODEL_FILE}")) {
            Ok(bytes) => bytes,
            Err(TrackingError::Api { status: 404, .. }) => {
                return Err(TrackingError::NotFound(format!("no model at {uri}")));
            }
            Err(e) => return Err(e),
        };

        match self.download(&format!("{dir}/{MODEL_META_FILE}")) {
            Ok(meta) => serde_json::from_slice::<LoggedModel>(&meta)?.verify(&bytes)?,
            Err(TrackingError::Api { status: 404, .. }) => {
                debug!(uri = %uri, "Model has no metadata file; skipping checksum");
            }
            Err(e) => return Err(e),
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl ModelRegistry for MlflowClient {
    fn register(&self, model_uri: &ModelUri, name: &str) -> TrackingResult<ModelVersion> {
        let ModelUri { run_id, artifact_path } = model_uri;
        let record = self.get_run(run_id)?;
        let source = format!("{}/{}", record.info.artifact_uri.trim_end_matches('/'), artifact_path);

        match self.post("registered-models/create", &json!({ "name": name })) {
            Ok(()) => debug!(model = name, "Created registered model"),
            Err(e) if is_code(&e, RESOURCE_ALREADY_EXISTS) => {}
            Err(e) => return Err(e),
        }

        let env: ModelVersionEnvelope = self.post_json(
            "model-versions/create",
            &json!({ "name": name, "source": source, "run_id": run_id.as_str() }),
        )?;
        env.model_version.into_version()
    }

    fn latest_version(&self, name: &str) -> TrackingResult<ModelVersion> {
        let env: RegisteredModelEnvelope = match self.get_json("registered-models/get", &[("name", name)]) {
            Ok(env) => env,
            Err(e) if is_code(&e, RESOURCE_DOES_NOT_EXIST) => return Err(not_registered(name)),
            Err(e) => return Err(e),
        };

        let mut versions = env
            .registered_model
            .latest_versions
            .into_iter()
            .map(WireModelVersion::into_version)
            .collect::<TrackingResult<Vec<_>>>()?;
        versions.sort_by_key(|v| v.version);
        versions.pop().ok_or_else(|| not_registered(name))
    }
}

fn api_error(response: Response) -> TrackingError {
    let status = response.status().as_u16();
    let text = response.text().unwrap_or_default();
    match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => TrackingError::Api { status, code: body.error_code, message: body.message },
        Err(_) => TrackingError::Api { status, code: "UNKNOWN".to_string(), message: text },
    }
}

fn is_code(err: &TrackingError, code: &str) -> bool {
    matches!(err, TrackingError::Api { code: c, .. } if c == code)
}

/// Path of a `mlflow-artifacts:` root relative to the artifact proxy.
fn proxied_path(artifact_uri: &str) -> TrackingResult<String> {
    let rest = artifact_uri.strip_prefix("mlflow-artifacts:").ok_or_else(|| {
        TrackingError::Artifact(format!(
            "artifact root {artifact_uri} is not served by the tracking server's artifact proxy"
        ))
    })?;
    let rest = match rest.strip_prefix("//") {
        Some(authority_and_path) => authority_and_path.split_once('/').map_or("", |(_, path)| path),
        None => rest,
    };
    Ok(rest.trim_matches('/').to_string())
}

fn key_values(map: &BTreeMap<String, String>) -> Vec<KeyValue> {
    map.iter().map(|(k, v)| KeyValue { key: k.clone(), value: v.clone() }).collect()
}

fn millis_to_time(ms: i64) -> TrackingResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| TrackingError::InvalidRun(format!("timestamp out of range: {ms}")))
}

/// int64 fields arrive as numbers or as strings depending on the server.
fn de_int<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    match WireInt::deserialize(d)? {
        WireInt::Num(n) => Ok(n),
        WireInt::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

fn de_opt_int<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    match Option::<WireInt>::deserialize(d)? {
        None => Ok(None),
        Some(WireInt::Num(n)) => Ok(Some(n)),
        Some(WireInt::Text(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireInt {
    Num(i64),
    Text(String),
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error_code: String,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct ExperimentEnvelope {
    experiment: WireExperiment,
}

#[derive(Deserialize)]
struct WireExperiment {
    experiment_id: String,
}

#[derive(Deserialize)]
struct CreateExperimentResponse {
    experiment_id: String,
}

#[derive(Deserialize)]
struct RunEnvelope {
    run: WireRun,
}

#[derive(Deserialize)]
struct SearchRunsResponse {
    #[serde(default)]
    runs: Vec<WireRun>,
}

#[derive(Deserialize)]
struct WireRun {
    info: WireRunInfo,
    #[serde(default)]
    data: WireRunData,
}

impl WireRun {
    fn into_record(self) -> TrackingResult<RunRecord> {
        let mut record = RunRecord::new(self.info.into_info()?);
        record.params = self.data.params.into_iter().map(|kv| (kv.key, kv.value)).collect();
        record.tags = self.data.tags.into_iter().map(|kv| (kv.key, kv.value)).collect();
        record.metrics = self.data.metrics.into_iter().map(|m| (m.key, m.value)).collect();
        Ok(record)
    }
}

#[derive(Deserialize)]
struct WireRunInfo {
    run_id: String,
    experiment_id: String,
    status: String,
    #[serde(deserialize_with = "de_int")]
    start_time: i64,
    #[serde(default, deserialize_with = "de_opt_int")]
    end_time: Option<i64>,
    #[serde(default)]
    artifact_uri: String,
}

impl WireRunInfo {
    fn into_info(self) -> TrackingResult<RunInfo> {
        Ok(RunInfo {
            run_id: RunId(self.run_id),
            experiment_id: ExperimentId(self.experiment_id),
            status: self.status.parse().map_err(TrackingError::InvalidRun)?,
            start_time: millis_to_time(self.start_time)?,
            end_time: self.end_time.map(millis_to_time).transpose()?,
            artifact_uri: self.artifact_uri,
        })
    }
}

#[derive(Deserialize, Default)]
struct WireRunData {
    #[serde(default)]
    metrics: Vec<WireMetric>,
    #[serde(default)]
    params: Vec<KeyValue>,
    #[serde(default)]
    tags: Vec<KeyValue>,
}

#[derive(Serialize, Deserialize)]
struct KeyValue {
    key: String,
    value: String,
}

#[derive(Serialize, Deserialize)]
struct WireMetric {
    key: String,
    value: f64,
    #[serde(default, deserialize_with = "de_int")]
    timestamp: i64,
    #[serde(default, deserialize_with = "de_int")]
    step: i64,
}

#[derive(Deserialize)]
struct ModelVersionEnvelope {
    model_version: WireModelVersion,
}

#[derive(Deserialize)]
struct RegisteredModelEnvelope {
    registered_model: WireRegisteredModel,
}

#[derive(Deserialize)]
struct WireRegisteredModel {
    #[serde(default)]
    latest_versions: Vec<WireModelVersion>,
}

#[derive(Deserialize)]
struct WireModelVersion {
    name: String,
    #[serde(deserialize_with = "de_int")]
    version: i64,
    #[serde(default)]
    run_id: String,
    #[serde(default)]
    source: String,
    #[serde(default, deserialize_with = "de_opt_int")]
    creation_timestamp: Option<i64>,
}

impl WireModelVersion {
    fn into_version(self) -> TrackingResult<ModelVersion> {
        let version = u64::try_from(self.version)
            .map_err(|_| TrackingError::InvalidRun(format!("negative model version {}", self.version)))?;
        Ok(ModelVersion {
            name: self.name,
            version,
            run_id: RunId(self.run_id),
            source: self.source,
            created_at: match self.creation_timestamp {
                Some(ms) => millis_to_time(ms)?,
                None => Utc::now(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn run_body(run_id: &str, status: &str) -> String {
        json!({ "run": run_json(run_id, status) }).to_string()
    }

    fn run_json(run_id: &str, status: &str) -> serde_json::Value {
        json!({
            "info": {
                "run_id": run_id,
                "experiment_id": "7",
                "status": status,
                "start_time": 1_700_000_000_000_i64,
                "artifact_uri": format!("mlflow-artifacts:/7/{run_id}/artifacts"),
            },
            "data": {
                "metrics": [{"key": "RMSE", "value": 1.25, "timestamp": "1700000000001", "step": "0"}],
                "params": [{"key": "features", "value": "[\"lag_365\"]"}],
                "tags": [{"key": "location_names", "value": "[\"BARCELONA\"]"}]
            }
        })
    }

    #[test]
    fn test_proxied_path() {
        assert_eq!(proxied_path("mlflow-artifacts:/7/abc/artifacts").unwrap(), "7/abc/artifacts");
        assert_eq!(proxied_path("mlflow-artifacts://host:5000/7/abc/artifacts").unwrap(), "7/abc/artifacts");
        assert!(proxied_path("s3://bucket/7/abc/artifacts").is_err());
    }

    #[test]
    fn test_get_or_create_experiment_creates_when_missing() {
        let mut server = mockito::Server::new();
        let lookup = server
            .mock("GET", "/api/2.0/mlflow/experiments/get-by-name")
            .match_query(Matcher::UrlEncoded("experiment_name".into(), "weather".into()))
            .with_status(404)
            .with_body(r#"{"error_code": "RESOURCE_DOES_NOT_EXIST", "message": "no such experiment"}"#)
            .create();
        let create = server
            .mock("POST", "/api/2.0/mlflow/experiments/create")
            .match_body(Matcher::PartialJson(json!({"name": "weather"})))
            .with_status(200)
            .with_body(r#"{"experiment_id": "7"}"#)
            .create();

        let client = MlflowClient::new(&server.url()).unwrap();
        let id = client.get_or_create_experiment("weather").unwrap();

        assert_eq!(id, ExperimentId("7".to_string()));
        lookup.assert();
        create.assert();
    }

    #[test]
    fn test_get_run_parses_string_and_number_ints() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("GET", "/api/2.0/mlflow/runs/get")
            .match_query(Matcher::UrlEncoded("run_id".into(), "abc".into()))
            .with_status(200)
            .with_body(run_body("abc", "FINISHED"))
            .create();

        let client = MlflowClient::new(&server.url()).unwrap();
        let record = client.get_run(&RunId("abc".to_string())).unwrap();

        assert_eq!(record.info.status, RunStatus::Finished);
        assert_eq!(record.metrics["RMSE"], 1.25);
        assert_eq!(record.params["features"], "[\"lag_365\"]");
        assert_eq!(record.tags["location_names"], "[\"BARCELONA\"]");
    }

    #[test]
    fn test_end_run_posts_status() {
        let mut server = mockito::Server::new();
        let update = server
            .mock("POST", "/api/2.0/mlflow/runs/update")
            .match_body(Matcher::PartialJson(json!({"run_id": "abc", "status": "FAILED"})))
            .with_status(200)
            .with_body("{}")
            .create();

        let client = MlflowClient::new(&server.url()).unwrap();
        client.end_run(&RunId("abc".to_string()), RunStatus::Failed).unwrap();
        update.assert();

        assert!(client.end_run(&RunId("abc".to_string()), RunStatus::Running).is_err());
    }

    #[test]
    fn test_log_metric_uses_log_batch_with_auth() {
        let mut server = mockito::Server::new();
        let batch = server
            .mock("POST", "/api/2.0/mlflow/runs/log-batch")
            .match_header("authorization", "Bearer secret")
            .match_body(Matcher::AllOf(vec![
                Matcher::PartialJson(json!({"run_id": "abc"})),
                Matcher::Regex(r#""key":"DRIFT_DETECTED""#.to_string()),
            ]))
            .with_status(200)
            .with_body("{}")
            .create();

        let client = MlflowClient::new(&server.url()).unwrap().with_token("secret".to_string());
        client.log_metric(&RunId("abc".to_string()), "DRIFT_DETECTED", 1.0).unwrap();
        batch.assert();
    }

    #[test]
    fn test_log_model_uploads_through_artifact_proxy() {
        let mut server = mockito::Server::new();
        let _run = server
            .mock("GET", "/api/2.0/mlflow/runs/get")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(run_body("abc", "RUNNING"))
            .create();
        let model = server
            .mock("PUT", "/api/2.0/mlflow-artifacts/artifacts/7/abc/artifacts/models/model.json")
            .with_status(200)
            .with_body("{}")
            .create();
        let meta = server
            .mock("PUT", "/api/2.0/mlflow-artifacts/artifacts/7/abc/artifacts/models/MLmodel.json")
            .with_status(200)
            .with_body("{}")
            .create();

        let client = MlflowClient::new(&server.url()).unwrap();
        let payload = ModelPayload { flavor: "test".to_string(), body: json!({"w": 1}) };
        let uri = client.log_model(&RunId("abc".to_string()), "models", &payload).unwrap();

        assert_eq!(uri.to_string(), "runs:/abc/models");
        model.assert();
        meta.assert();
    }

    #[test]
    fn test_latest_version_of_unknown_model_is_not_found() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("GET", "/api/2.0/mlflow/registered-models/get")
            .match_query(Matcher::UrlEncoded("name".into(), "drought".into()))
            .with_status(404)
            .with_body(r#"{"error_code": "RESOURCE_DOES_NOT_EXIST", "message": "missing"}"#)
            .create();

        let client = MlflowClient::new(&server.url()).unwrap();
        let err = client.latest_version("drought").unwrap_err();
        assert!(matches!(err, TrackingError::NotFound(_)));
        assert!(err.to_string().contains("registering model first"));
    }

    #[test]
    fn test_latest_version_picks_highest() {
        let mut server = mockito::Server::new();
        let _m = server
            .mock("GET", "/api/2.0/mlflow/registered-models/get")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                json!({
                    "registered_model": {
                        "name": "drought",
                        "latest_versions": [
                            {"name": "drought", "version": "2", "run_id": "r2", "source": "mlflow-artifacts:/7/r2/artifacts/models"},
                            {"name": "drought", "version": "5", "run_id": "r5", "source": "mlflow-artifacts:/7/r5/artifacts/models"}
                        ]
                    }
                })
                .to_string(),
            )
            .create();

        let client = MlflowClient::new(&server.url()).unwrap();
        let latest = client.latest_version("drought").unwrap();
        assert_eq!(latest.version, 5);
        assert_eq!(latest.run_model_uri().unwrap().to_string(), "runs:/r5/models");
    }

    #[test]
    fn test_register_tolerates_existing_registered_model() {
        let mut server = mockito::Server::new();
        let _run = server
            .mock("GET", "/api/2.0/mlflow/runs/get")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(run_body("abc", "FINISHED"))
            .create();
        let _create_model = server
            .mock("POST", "/api/2.0/mlflow/registered-models/create")
            .with_status(400)
            .with_body(r#"{"error_code": "RESOURCE_ALREADY_EXISTS", "message": "exists"}"#)
            .create();
        let create_version = server
            .mock("POST", "/api/2.0/mlflow/model-versions/create")
            .match_body(Matcher::PartialJson(json!({
                "name": "drought",
                "run_id": "abc",
                "source": "mlflow-artifacts:/7/abc/artifacts/models"
            })))
            .with_status(200)
            .with_body(r#"{"model_version": {"name": "drought", "version": "3", "run_id": "abc", "source": "mlflow-artifacts:/7/abc/artifacts/models", "creation_timestamp": 1700000000000}}"#)
            .create();

        let client = MlflowClient::new(&server.url()).unwrap();
        let version = client
            .register(&ModelUri::parse("runs:/abc/models").unwrap(), "drought")
            .unwrap();

        assert_eq!(version.version, 3);
        create_version.assert();
    }

    #[test]
    fn test_latest_run_searches_finished_runs_only() {
        let mut server = mockito::Server::new();
        let _lookup = server
            .mock("GET", "/api/2.0/mlflow/experiments/get-by-name")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"experiment": {"experiment_id": "7", "name": "weather"}}"#)
            .create();
        let search = server
            .mock("POST", "/api/2.0/mlflow/runs/search")
            .match_body(Matcher::PartialJson(json!({
                "experiment_ids": ["7"],
                "filter": "attributes.status = 'FINISHED'"
            })))
            .with_status(200)
            .with_body(json!({ "runs": [run_json("abc", "FINISHED")] }).to_string())
            .create();

        let client = MlflowClient::new(&server.url()).unwrap();
        let latest = client.latest_run("weather").unwrap().unwrap();

        assert_eq!(latest.run_id, RunId("abc".to_string()));
        assert_eq!(latest.status, RunStatus::Finished);
        search.assert();
    }
}
