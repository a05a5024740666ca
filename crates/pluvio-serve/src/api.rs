//! HTTP routes.

use crate::error::ApiError;
use crate::logging::RequestLoggerLayer;
use crate::predictor::Predictor;
use axum::body::Bytes;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub predictions: Vec<f64>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model: String,
    pub version: u64,
}

/// Routes served over one shared, never reloaded predictor.
pub fn router(predictor: Arc<Predictor>) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/health", get(health))
        .layer(RequestLoggerLayer)
        .with_state(predictor)
}

/// `{"<feature>": [values]}` in, `{"predictions": [values]}` out.
async fn predict(State(predictor): State<Arc<Predictor>>, body: Bytes) -> Result<Json<PredictResponse>, ApiError> {
    let values = parse_inputs(&body, predictor.feature_name())?;
    debug!(inputs = values.len(), "Predicting");
    let predictions = predictor.predict(&values)?;
    Ok(Json(PredictResponse { predictions }))
}

async fn health(State(predictor): State<Arc<Predictor>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        model: predictor.model_name().to_string(),
        version: predictor.version().version,
    })
}

fn parse_inputs(body: &[u8], key: &str) -> Result<Vec<f64>, ApiError> {
    let bad = |detail: String| ApiError::BadRequest { detail, key: key.to_string() };

    let document: Value = serde_json::from_slice(body).map_err(|e| bad(format!("body is not valid JSON ({e})")))?;
    let Value::Object(fields) = document else {
        return Err(bad("body is not a JSON object".to_string()));
    };
    let Some(Value::Array(items)) = fields.get(key) else {
        return Err(bad(format!("field {key} is missing or not a list")));
    };

    items
        .iter()
        .map(|item| item.as_f64().ok_or_else(|| bad(format!("{item} is not a number"))))
        .collect()
}
