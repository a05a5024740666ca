//! The model behind `/predict`, loaded once at startup.

use crate::error::{ServeError, ServeResult};
use pluvio_core::{LinearRegression, PipelineResult};
use pluvio_tracking::{load_latest_model, ModelStore, ModelVersion};
use tracing::info;

#[derive(Debug, Clone)]
pub struct Predictor {
    version: ModelVersion,
    model: LinearRegression,
}

impl Predictor {
    /// Resolve the latest registered version of `model_name` and load its artifact.
    ///
    /// Only single-input models can be served.
    pub fn load(store: &dyn ModelStore, model_name: &str) -> ServeResult<Self> {
        let (version, payload) = load_latest_model(store, model_name)?;
        let model = LinearRegression::from_payload(&payload)?;
        if model.n_features() != 1 {
            return Err(ServeError::Model(format!(
                "model {model_name} version {} takes {} features, only single-feature models can be served",
                version.version,
                model.n_features()
            )));
        }

        info!(
            model = %version.name,
            version = version.version,
            run_id = %version.run_id,
            feature = %model.feature_names[0],
            "Loaded model"
        );
        Ok(Self { version, model })
    }

    #[must_use]
    pub fn model_name(&self) -> &str {
        &self.version.name
    }

    #[must_use]
    pub fn version(&self) -> &ModelVersion {
        &self.version
    }

    /// Request key holding the input values.
    #[must_use]
    pub fn feature_name(&self) -> &str {
        &self.model.feature_names[0]
    }

    /// One prediction per input value, in input order.
    pub fn predict(&self, values: &[f64]) -> PipelineResult<Vec<f64>> {
        values.iter().map(|v| self.model.predict_one(&[*v])).collect()
    }
}
