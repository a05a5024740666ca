//! Chronological split, fit, evaluation and tracked persistence.

use crate::config::TrainingConfig;
use crate::dataset::{Column, PRCP};
use crate::drift::DriftGate;
use crate::error::{PipelineError, PipelineResult};
use crate::features::FeatureFrame;
use crate::model::{rmse, LinearRegression};
use pluvio_tracking::{with_run, ModelUri, RunId, TrackingConfig, TrackingStore};
use std::collections::BTreeMap;
use tracing::info;

pub const METRIC_RMSE: &str = "RMSE";
pub const METRIC_DRIFT_DETECTED: &str = "DRIFT_DETECTED";
pub const PARAM_FEATURES: &str = "features";
pub const PARAM_TEST_SIZE: &str = "test_size";
pub const TAG_LOCATION_NAMES: &str = "location_names";

/// Row counts of a chronological train/test split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Split {
    pub train: usize,
    pub test: usize,
}

impl Split {
    /// The last `ceil(rows * test_fraction)` rows are held out; nothing is shuffled.
    #[allow(clippy::cast_precision_loss)]
    pub fn chronological(rows: usize, test_fraction: f64) -> PipelineResult<Self> {
        let test = (rows as f64 * test_fraction).ceil() as usize;
        let train = rows.saturating_sub(test);
        if test == 0 || train == 0 {
            return Err(PipelineError::EmptyDataset(format!(
                "{rows} rows cannot be split with test fraction {test_fraction}"
            )));
        }
        Ok(Self { train, test })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingOutcome {
    pub run_id: RunId,
    pub rmse: f64,
    pub drift_detected: bool,
    pub model: LinearRegression,
    pub model_uri: ModelUri,
    pub split: Split,
}

pub struct Trainer<'a> {
    store: &'a dyn TrackingStore,
    gate: &'a DriftGate,
    training: &'a TrainingConfig,
    tracking: &'a TrackingConfig,
}

impl<'a> Trainer<'a> {
    #[must_use]
    pub fn new(
        store: &'a dyn TrackingStore,
        gate: &'a DriftGate,
        training: &'a TrainingConfig,
        tracking: &'a TrackingConfig,
    ) -> Self {
        Self { store, gate, training, tracking }
    }

    /// Fit on the older rows of `frame`, score on the newest, and record
    /// everything in one tracked run.
    ///
    /// The run is closed on every path. Drift between actual and predicted
    /// test values is logged and recorded as a metric but never fails the run.
    pub fn train(&self, frame: &FeatureFrame) -> PipelineResult<TrainingOutcome> {
        with_run(self.store, &self.tracking.experiment_name, |run| -> PipelineResult<TrainingOutcome> {
            let mut tags = BTreeMap::new();
            tags.insert(TAG_LOCATION_NAMES.to_string(), serde_json::to_string(&frame.station_names())?);
            run.set_tags(&tags)?;

            let mut params = BTreeMap::new();
            params.insert(PARAM_FEATURES.to_string(), serde_json::to_string(&self.training.features)?);
            params.insert(PARAM_TEST_SIZE.to_string(), self.training.test_fraction.to_string());
            run.log_params(&params)?;

            let inputs = frame.select(&self.training.features)?;
            let targets = frame.targets();
            let split = Split::chronological(frame.len(), self.training.test_fraction)?;
            let (train_inputs, test_inputs) = inputs.split_at(split.train);
            let (train_targets, test_targets) = targets.split_at(split.train);

            let model = LinearRegression::fit(&self.training.features, train_inputs, train_targets)?;
            let predictions = model.predict(test_inputs)?;
            let score = rmse(test_targets, &predictions)?;
            run.log_metric(METRIC_RMSE, score)?;
            info!(
                train_rows = split.train,
                test_rows = split.test,
                rmse = score,
                intercept = model.intercept,
                "Fitted linear model"
            );

            let actual = vec![Column::numeric(PRCP, test_targets)];
            let predicted = vec![Column::numeric(PRCP, &predictions)];
            let verdict = self.gate.check_advisory(&actual, &predicted)?;
            run.log_metric(METRIC_DRIFT_DETECTED, if verdict.is_drifted() { 1.0 } else { 0.0 })?;

            let model_uri = run.log_model(&self.tracking.artifact_path, &model.to_payload()?)?;
            info!(run_id = %run.run_id(), model_uri = %model_uri, "Logged model");

            Ok(TrainingOutcome {
                run_id: run.run_id().clone(),
                rmse: score,
                drift_detected: verdict.is_drifted(),
                model,
                model_uri,
                split,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{ColumnData, Observation, Snapshot};
    use crate::drift::{ColumnDrift, DriftDetector, StatTest};
    use crate::features::{build_features, FeatureSpec};
    use chrono::NaiveDate;
    use pluvio_tracking::{LocalStore, RunStatus};

    /// Flags every column it is shown.
    struct AlwaysDrift;

    impl DriftDetector for AlwaysDrift {
        fn name(&self) -> &'static str {
            "always"
        }

        fn compare_column(&self, column: &str, _: &ColumnData, _: &ColumnData) -> PipelineResult<ColumnDrift> {
            Ok(ColumnDrift::new(column, StatTest::Wasserstein, 1.0, 0.1))
        }
    }

    fn lag_frame(days: u32) -> FeatureFrame {
        let start = NaiveDate::from_ymd_opt(1950, 1, 1).unwrap();
        let snapshot: Snapshot = (0..days)
            .map(|i| Observation {
                station_name: "BARCELONA AEROPUERTO, SP".to_string(),
                date: start + chrono::Days::new(u64::from(i)),
                precipitation: Some(f64::from(i % 5)),
            })
            .collect();
        build_features(&snapshot, &FeatureSpec { lags: vec![1], windows: vec![] }).unwrap()
    }

    #[test]
    fn test_chronological_split() {
        assert_eq!(Split::chronological(10, 0.2).unwrap(), Split { train: 8, test: 2 });
        assert_eq!(Split::chronological(11, 0.2).unwrap(), Split { train: 8, test: 3 });
        assert_eq!(Split::chronological(2, 0.2).unwrap(), Split { train: 1, test: 1 });
    }

    #[test]
    fn test_split_too_small() {
        assert!(matches!(Split::chronological(1, 0.2), Err(PipelineError::EmptyDataset(_))));
        assert!(Split::chronological(0, 0.5).is_err());
    }

    #[test]
    fn test_advisory_drift_still_finishes_run() {
        let temp = tempfile::TempDir::new().unwrap();
        let store = LocalStore::new(temp.path().to_path_buf());
        let gate = DriftGate::new(Box::new(AlwaysDrift));
        let training = TrainingConfig { features: vec!["lag_1".to_string()], test_fraction: 0.2 };
        let tracking = TrackingConfig::default();

        let outcome = Trainer::new(&store, &gate, &training, &tracking).train(&lag_frame(21)).unwrap();

        assert!(outcome.drift_detected);
        let record = store.get_run(&outcome.run_id).unwrap();
        assert_eq!(record.info.status, RunStatus::Finished);
        assert_eq!(record.metrics[METRIC_DRIFT_DETECTED], 1.0);
        assert_eq!(record.metrics[METRIC_RMSE], outcome.rmse);
        assert!(store.load_model(&outcome.model_uri).is_ok());
    }

    #[test]
    fn test_failed_split_closes_run_as_failed() {
        let temp = tempfile::TempDir::new().unwrap();
        let store = LocalStore::new(temp.path().to_path_buf());
        let gate = DriftGate::new(Box::new(AlwaysDrift));
        let training = TrainingConfig { features: vec!["lag_1".to_string()], test_fraction: 0.2 };
        let tracking = TrackingConfig::default();

        let err = Trainer::new(&store, &gate, &training, &tracking).train(&lag_frame(2)).unwrap_err();

        assert!(matches!(err, PipelineError::EmptyDataset(_)));
        assert!(store.latest_run(&tracking.experiment_name).unwrap().is_none());
    }
}
