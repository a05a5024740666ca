//! Pluvio Tracking
//!
//! Experiment tracking and model registry plumbing for the pipeline:
//! - Scoped runs (`ActiveRun`, `with_run`) that always close
//! - The `TrackingStore` / `ModelRegistry` seams
//! - A directory-backed store (`LocalStore`) and an MLflow REST client (`MlflowClient`)
//! - Run model uris, artifact checksums, and the registrar helpers

pub mod artifacts;
pub mod config;
pub mod error;
pub mod layout;
pub mod local;
pub mod mlflow;
pub mod registry;
pub mod run;
pub mod store;

pub use artifacts::{LoggedModel, ModelPayload, ModelUri};
pub use config::{open_store, TrackingConfig};
pub use error::{TrackingError, TrackingResult};
pub use layout::StoreLayout;
pub use local::LocalStore;
pub use mlflow::MlflowClient;
pub use registry::{load_latest_model, register_latest_run, ModelRegistry, ModelVersion};
pub use run::{ExperimentId, RunId, RunInfo, RunRecord, RunStatus};
pub use store::{with_run, ActiveRun, ModelStore, TrackingStore};
