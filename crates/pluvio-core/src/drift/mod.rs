//! Drift gate.
//!
//! A [`DriftDetector`] compares one column of a reference snapshot with the
//! same column of a current snapshot. The [`DriftGate`] runs it over every
//! shared, non-date column and turns the result into a [`DriftVerdict`] that
//! the caller treats as fatal ([`DriftGate::check_hard`]) or advisory
//! ([`DriftGate::check_advisory`]).

pub mod stattest;

pub use stattest::StatTestDetector;

use crate::dataset::{ColumnData, Columnar};
use crate::error::{PipelineError, PipelineResult};
use serde::Serialize;
use std::fmt;
use tracing::{debug, error, info};

/// Statistical procedure used for one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatTest {
    KolmogorovSmirnov,
    ChiSquare,
    ZTest,
    Wasserstein,
    JensenShannon,
}

impl StatTest {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KolmogorovSmirnov => "ks",
            Self::ChiSquare => "chisquare",
            Self::ZTest => "z",
            Self::Wasserstein => "wasserstein",
            Self::JensenShannon => "jensenshannon",
        }
    }

    /// Scores of these tests are p-values (lower means drift); the others are distances.
    #[must_use]
    pub fn is_p_value(&self) -> bool {
        matches!(self, Self::KolmogorovSmirnov | Self::ChiSquare | Self::ZTest)
    }
}

impl fmt::Display for StatTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDrift {
    pub column: String,
    pub test: StatTest,
    pub score: f64,
    pub threshold: f64,
    pub drifted: bool,
}

impl ColumnDrift {
    #[must_use]
    pub fn new(column: &str, test: StatTest, score: f64, threshold: f64) -> Self {
        let drifted = if test.is_p_value() { score < threshold } else { score >= threshold };
        Self { column: column.to_string(), test, score, threshold, drifted }
    }
}

/// Per-column outcome of one comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriftReport {
    pub detector: &'static str,
    pub columns: Vec<ColumnDrift>,
}

impl DriftReport {
    #[must_use]
    pub fn drifted_count(&self) -> usize {
        self.columns.iter().filter(|c| c.drifted).count()
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn verdict(&self) -> DriftVerdict {
        match self.drifted_count() {
            0 => DriftVerdict::Clean,
            drifted => DriftVerdict::Exceeded { drifted, total: self.total() },
        }
    }
}

/// Whether any compared column drifted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriftVerdict {
    Clean,
    Exceeded { drifted: usize, total: usize },
}

impl DriftVerdict {
    #[must_use]
    pub fn is_drifted(&self) -> bool {
        matches!(self, Self::Exceeded { .. })
    }

    #[must_use]
    pub fn drifted_count(&self) -> usize {
        match self {
            Self::Clean => 0,
            Self::Exceeded { drifted, .. } => *drifted,
        }
    }

    /// Drift as an error.
    pub fn into_hard_result(self) -> PipelineResult<()> {
        match self {
            Self::Clean => Ok(()),
            Self::Exceeded { drifted, total } => Err(PipelineError::DriftDetected { drifted, total }),
        }
    }
}

/// Compares the distribution of one column across two snapshots.
pub trait DriftDetector: Send + Sync {
    fn name(&self) -> &'static str;

    /// `reference` and `current` hold the column's values with missing cells as `None`.
    fn compare_column(&self, column: &str, reference: &ColumnData, current: &ColumnData) -> PipelineResult<ColumnDrift>;
}

pub struct DriftGate {
    detector: Box<dyn DriftDetector>,
}

impl DriftGate {
    #[must_use]
    pub fn new(detector: Box<dyn DriftDetector>) -> Self {
        Self { detector }
    }

    /// Compare every column present in both snapshots, dates excluded.
    pub fn evaluate<R, C>(&self, reference: &R, current: &C) -> PipelineResult<DriftReport>
    where
        R: Columnar + ?Sized,
        C: Columnar + ?Sized,
    {
        let current = current.columns();
        let mut columns = Vec::new();

        for column in reference.columns() {
            if matches!(column.data, ColumnData::Date(_)) {
                continue;
            }
            let Some(other) = current.iter().find(|c| c.name == column.name) else {
                continue;
            };
            let drift = self.detector.compare_column(&column.name, &column.data, &other.data)?;
            debug!(
                column = %drift.column,
                test = %drift.test,
                score = drift.score,
                threshold = drift.threshold,
                drifted = drift.drifted,
                "Column drift score"
            );
            columns.push(drift);
        }

        Ok(DriftReport { detector: self.detector.name(), columns })
    }

    /// Fail with [`PipelineError::DriftDetected`] when any column drifted.
    pub fn check_hard<R, C>(&self, reference: &R, current: &C) -> PipelineResult<DriftReport>
    where
        R: Columnar + ?Sized,
        C: Columnar + ?Sized,
    {
        let report = self.evaluate(reference, current)?;
        report.verdict().into_hard_result()?;
        info!(columns = report.total(), "No column drift detected");
        Ok(report)
    }

    /// Log drift at error level and carry on.
    pub fn check_advisory<R, C>(&self, reference: &R, current: &C) -> PipelineResult<DriftVerdict>
    where
        R: Columnar + ?Sized,
        C: Columnar + ?Sized,
    {
        let report = self.evaluate(reference, current)?;
        let verdict = report.verdict();
        if let DriftVerdict::Exceeded { drifted, total } = verdict {
            error!(drifted, total, "Column drift detected between actual and predicted values");
        }
        Ok(verdict)
    }
}

impl Default for DriftGate {
    fn default() -> Self {
        Self::new(Box::new(StatTestDetector::default()))
    }
}

impl fmt::Debug for DriftGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriftGate").field("detector", &self.detector.name()).finish()
    }
}
