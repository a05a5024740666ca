//! Ordinary least-squares regression with an intercept.

use crate::error::{PipelineError, PipelineResult};
use nalgebra::{DMatrix, DVector};
use pluvio_tracking::ModelPayload;
use serde::{Deserialize, Serialize};

/// Flavor tag of logged linear models.
pub const MODEL_FLAVOR: &str = "pluvio.linear_regression";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegression {
    pub feature_names: Vec<String>,
    pub intercept: f64,
    pub coefficients: Vec<f64>,
}

impl LinearRegression {
    /// Least-squares fit of `targets` on row-major `inputs`.
    ///
    /// Solved through the SVD, so collinear or constant inputs get the
    /// minimum-norm solution instead of failing.
    #[allow(clippy::cast_precision_loss)]
    pub fn fit(feature_names: &[String], inputs: &[Vec<f64>], targets: &[f64]) -> PipelineResult<Self> {
        let rows = inputs.len();
        let width = feature_names.len();
        if rows == 0 {
            return Err(PipelineError::EmptyDataset("no rows to fit".to_string()));
        }
        if targets.len() != rows {
            return Err(PipelineError::Model(format!("{rows} input rows but {} targets", targets.len())));
        }
        if let Some(row) = inputs.iter().position(|r| r.len() != width) {
            return Err(PipelineError::Model(format!(
                "row {row} has {} values, expected {width}",
                inputs[row].len()
            )));
        }

        let design = DMatrix::from_fn(rows, width + 1, |r, c| if c == 0 { 1.0 } else { inputs[r][c - 1] });
        let observed = DVector::from_column_slice(targets);

        let svd = design.svd(true, true);
        let largest = svd.singular_values.max();
        let eps = largest * f64::EPSILON * rows.max(width + 1) as f64;
        let solution = svd.solve(&observed, eps).map_err(|e| PipelineError::Model(e.to_string()))?;

        if solution.iter().any(|v| !v.is_finite()) {
            return Err(PipelineError::Model("least-squares solution is not finite".to_string()));
        }

        Ok(Self {
            feature_names: feature_names.to_vec(),
            intercept: solution[0],
            coefficients: solution.iter().skip(1).copied().collect(),
        })
    }

    #[must_use]
    pub fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    pub fn predict_one(&self, features: &[f64]) -> PipelineResult<f64> {
        if features.len() != self.n_features() {
            return Err(PipelineError::Model(format!(
                "expected {} features, got {}",
                self.n_features(),
                features.len()
            )));
        }
        Ok(self.intercept + self.coefficients.iter().zip(features).map(|(c, x)| c * x).sum::<f64>())
    }

    pub fn predict(&self, inputs: &[Vec<f64>]) -> PipelineResult<Vec<f64>> {
        inputs.iter().map(|row| self.predict_one(row)).collect()
    }

    pub fn to_payload(&self) -> PipelineResult<ModelPayload> {
        Ok(ModelPayload { flavor: MODEL_FLAVOR.to_string(), body: serde_json::to_value(self)? })
    }

    pub fn from_payload(payload: &ModelPayload) -> PipelineResult<Self> {
        if payload.flavor != MODEL_FLAVOR {
            return Err(PipelineError::Model(format!(
                "unsupported model flavor {}, expected {MODEL_FLAVOR}",
                payload.flavor
            )));
        }
        let model: Self = serde_json::from_value(payload.body.clone())?;
        if model.coefficients.len() != model.feature_names.len() {
            return Err(PipelineError::Model(format!(
                "{} coefficients for {} features",
                model.coefficients.len(),
                model.feature_names.len()
            )));
        }
        Ok(model)
    }
}

/// Root-mean-squared error.
#[allow(clippy::cast_precision_loss)]
pub fn rmse(actual: &[f64], predicted: &[f64]) -> PipelineResult<f64> {
    if actual.len() != predicted.len() {
        return Err(PipelineError::Model(format!(
            "{} actual values but {} predictions",
            actual.len(),
            predicted.len()
        )));
    }
    if actual.is_empty() {
        return Err(PipelineError::EmptyDataset("no values to score".to_string()));
    }
    let mse = actual.iter().zip(predicted).map(|(a, p)| (a - p).powi(2)).sum::<f64>() / actual.len() as f64;
    Ok(mse.sqrt())
}
