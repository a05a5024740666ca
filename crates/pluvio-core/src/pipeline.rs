//! Stage orchestration: load, clean, gate, build features, train.
//!
//! Every stage runs to completion before the next starts and any failure ends
//! the whole run. Only the drift check on model predictions is advisory.

use crate::clean::Cleaner;
use crate::config::AppConfig;
use crate::dataset::Snapshot;
use crate::drift::{DriftGate, DriftReport, StatTestDetector};
use crate::error::PipelineResult;
use crate::features::build_features;
use crate::source;
use crate::trainer::{Trainer, TrainingOutcome};
use pluvio_tracking::TrackingStore;
use tracing::info;

/// What one complete pipeline run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    pub raw_rows: usize,
    pub clean_rows: usize,
    pub feature_rows: usize,
    pub feature_columns: usize,
    pub clean_drift: DriftReport,
    pub training: TrainingOutcome,
}

pub struct Pipeline<'a> {
    config: &'a AppConfig,
    store: &'a dyn TrackingStore,
    gate: DriftGate,
}

impl<'a> Pipeline<'a> {
    /// A pipeline using the default statistical drift comparator.
    #[must_use]
    pub fn new(config: &'a AppConfig, store: &'a dyn TrackingStore) -> Self {
        let gate = DriftGate::new(Box::new(StatTestDetector::from_config(&config.drift)));
        Self { config, store, gate }
    }

    #[must_use]
    pub fn with_gate(mut self, gate: DriftGate) -> Self {
        self.gate = gate;
        self
    }

    /// Load the configured source and run every stage.
    pub fn run(&self) -> PipelineResult<PipelineReport> {
        let raw = source::load(&self.config.source.location)?;
        self.run_snapshot(&raw)
    }

    /// Run every stage after loading on an already loaded snapshot.
    pub fn run_snapshot(&self, raw: &Snapshot) -> PipelineResult<PipelineReport> {
        let clean = Cleaner::from_config(&self.config.cleaning).clean(raw);

        // Cleaning must not shift any column distribution.
        let clean_drift = self.gate.check_hard(raw, &clean)?;

        let frame = build_features(&clean, &self.config.features)?;

        let trainer = Trainer::new(self.store, &self.gate, &self.config.training, &self.config.tracking);
        let training = trainer.train(&frame)?;

        info!(
            run_id = %training.run_id,
            rmse = training.rmse,
            drift_detected = training.drift_detected,
            "Pipeline run complete"
        );

        Ok(PipelineReport {
            raw_rows: raw.len(),
            clean_rows: clean.len(),
            feature_rows: frame.len(),
            feature_columns: frame.column_count(),
            clean_drift,
            training,
        })
    }
}
