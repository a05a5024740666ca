//! Application configuration.
//!
//! Populated once at startup from built-in defaults, an optional TOML file and
//! `PLUVIO_`-prefixed environment variables (`PLUVIO_TRACKING__URI`), then
//! passed down by reference.

use crate::error::{PipelineError, PipelineResult};
use crate::features::FeatureSpec;
use chrono::NaiveDate;
use pluvio_tracking::TrackingConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "PLUVIO";

/// Config file read when no path is given and it exists.
pub const DEFAULT_CONFIG_FILE: &str = "pluvio.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// `http(s)://` url or local path of the station CSV.
    pub location: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self { location: "https://www.ncei.noaa.gov/data/daily-summaries/access/SP000008181.csv".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    /// Records dated on or before this day are discarded.
    pub cutoff: NaiveDate,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self { cutoff: crate::clean::default_cutoff() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Model inputs, a subset of the derived features.
    pub features: Vec<String>,
    /// Share of the most recent rows held out for evaluation.
    pub test_fraction: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self { features: vec!["lag_365".to_string()], test_fraction: 0.2 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftConfig {
    /// Drift when a test's p-value falls below this.
    pub p_value_threshold: f64,
    /// Drift when a distance reaches this.
    pub distance_threshold: f64,
    /// Reference sizes up to this use hypothesis tests, larger ones use distances.
    pub small_sample_limit: usize,
    /// Histogram bins for the Jensen-Shannon distance.
    pub bins: usize,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self { p_value_threshold: 0.05, distance_threshold: 0.1, small_sample_limit: 1000, bins: 30 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    pub address: SocketAddr,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self { address: SocketAddr::from(([0, 0, 0, 0], 9696)) }
    }
}

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub cleaning: CleaningConfig,
    pub features: FeatureSpec,
    pub training: TrainingConfig,
    pub drift: DriftConfig,
    pub tracking: TrackingConfig,
    pub serve: ServeConfig,
}

impl AppConfig {
    /// Load defaults, then `path` (or `pluvio.toml` when present), then the environment.
    ///
    /// An explicitly given file must exist.
    pub fn load(path: Option<&Path>) -> PipelineResult<Self> {
        let file = match path {
            Some(path) => config::File::from(path.to_path_buf()).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings = config::Config::builder()
            .add_source(file.format(config::FileFormat::Toml))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| PipelineError::Config(e.to_string()))?;

        let loaded: Self = settings.try_deserialize().map_err(|e| PipelineError::Config(e.to_string()))?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Parse a TOML document on top of the defaults.
    pub fn from_toml_str(document: &str) -> PipelineResult<Self> {
        let loaded: Self = toml::from_str(document).map_err(|e| PipelineError::Config(e.to_string()))?;
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if self.source.location.trim().is_empty() {
            return Err(PipelineError::Config("source.location must not be empty".to_string()));
        }

        self.features.validate()?;

        let fraction = self.training.test_fraction;
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(PipelineError::Config(format!(
                "training.test_fraction must be between 0 and 1, got {fraction}"
            )));
        }
        if self.training.features.is_empty() {
            return Err(PipelineError::Config("training.features must name at least one feature".to_string()));
        }
        let available = self.features.feature_names();
        if let Some(unknown) = self.training.features.iter().find(|f| !available.contains(f)) {
            return Err(PipelineError::Config(format!(
                "training feature {unknown} is not derived, available: {}",
                available.join(", ")
            )));
        }

        for (name, value) in [
            ("drift.p_value_threshold", self.drift.p_value_threshold),
            ("drift.distance_threshold", self.drift.distance_threshold),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(PipelineError::Config(format!("{name} must be in (0, 1], got {value}")));
            }
        }
        if self.drift.bins < 2 {
            return Err(PipelineError::Config("drift.bins must be at least 2".to_string()));
        }

        if self.tracking.experiment_name.trim().is_empty() {
            return Err(PipelineError::Config("tracking.experiment_name must not be empty".to_string()));
        }
        if self.tracking.model_name.trim().is_empty() {
            return Err(PipelineError::Config("tracking.model_name must not be empty".to_string()));
        }
        Ok(())
    }
}
