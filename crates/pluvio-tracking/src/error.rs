use thiserror::Error;

pub type TrackingResult<T> = std::result::Result<T, TrackingError>;

#[derive(Debug, Error)]
pub enum TrackingError {
    #[error("invalid run: {0}")]
    InvalidRun(String),

    #[error("experiment error: {0}")]
    Experiment(String),

    #[error("artifact error: {0}")]
    Artifact(String),

    #[error("invalid model uri: {0}")]
    InvalidUri(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("tracking server returned {status} ({code}): {message}")]
    Api { status: u16, code: String, message: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
