use pluvio_tracking::TrackingError;
use thiserror::Error;

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The source table lacks required columns.
    #[error("unexpected source structure: missing columns {missing:?}, found {found:?}")]
    Schema { missing: Vec<String>, found: Vec<String> },

    /// Column distributions differ between two snapshots that should match.
    #[error("column drift detected for {drifted} of {total} columns")]
    DriftDetected { drifted: usize, total: usize },

    #[error("parse error at row {row}: {message}")]
    Parse { row: usize, message: String },

    #[error("empty dataset: {0}")]
    EmptyDataset(String),

    #[error("model error: {0}")]
    Model(String),

    #[error("drift check error: {0}")]
    Drift(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Tracking(#[from] TrackingError),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
