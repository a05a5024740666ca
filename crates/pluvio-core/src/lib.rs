//! Pluvio Core
//!
//! The precipitation pipeline: load a station feed, clean it, gate on column
//! drift, derive lag and rolling features, then fit and log a linear model to
//! the tracking store.

pub mod clean;
pub mod config;
pub mod dataset;
pub mod drift;
pub mod error;
pub mod features;
pub mod model;
pub mod pipeline;
pub mod source;
pub mod trainer;

pub use clean::Cleaner;
pub use config::AppConfig;
pub use dataset::{Column, ColumnData, Columnar, Observation, Snapshot};
pub use drift::{ColumnDrift, DriftDetector, DriftGate, DriftReport, DriftVerdict, StatTest, StatTestDetector};
pub use error::{PipelineError, PipelineResult};
pub use features::{build_features, FeatureFrame, FeatureRow, FeatureSpec};
pub use model::{rmse, LinearRegression, MODEL_FLAVOR};
pub use pipeline::{Pipeline, PipelineReport};
pub use trainer::{Split, Trainer, TrainingOutcome};
