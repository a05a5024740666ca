use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pluvio_core::PipelineError;
use pluvio_tracking::TrackingError;
use thiserror::Error;

pub type ServeResult<T> = std::result::Result<T, ServeError>;

/// Failures while starting the service.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("model error: {0}")]
    Model(String),

    #[error(transparent)]
    Tracking(#[from] TrackingError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failure of a single request.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid request: {detail}, expected {{\"{key}\": [values]}}")]
    BadRequest { detail: String, key: String },

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        Self::Internal(err.to_string())
    }
}
