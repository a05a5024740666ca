//! Lag and rolling-window features.
//!
//! Offsets and windows count row positions, not calendar days: `lag_7` is the
//! precipitation seven rows earlier whatever dates those rows carry. This is
//! only equivalent to a calendar lag when the input has no gaps, and it is
//! kept positional so feature frames are reproducible from the same input.

use crate::dataset::{Column, ColumnData, Columnar, Snapshot, DATE, NAME, PRCP};
use crate::error::{PipelineError, PipelineResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Which lags and rolling windows to derive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureSpec {
    pub lags: Vec<usize>,
    #[serde(rename = "rolling_windows")]
    pub windows: Vec<usize>,
}

impl Default for FeatureSpec {
    fn default() -> Self {
        Self { lags: vec![1, 7, 30, 365], windows: vec![7, 30] }
    }
}

impl FeatureSpec {
    /// Derived column names: every `lag_N`, then `rolling_mean_W` and `rolling_std_W` per window.
    #[must_use]
    pub fn feature_names(&self) -> Vec<String> {
        let lags = self.lags.iter().map(|lag| format!("lag_{lag}"));
        let windows = self
            .windows
            .iter()
            .flat_map(|w| [format!("rolling_mean_{w}"), format!("rolling_std_{w}")]);
        lags.chain(windows).collect()
    }

    /// Rows of history a feature row needs before it is complete.
    #[must_use]
    pub fn max_history(&self) -> usize {
        let lag = self.lags.iter().copied().max().unwrap_or(0);
        let window = self.windows.iter().copied().max().map_or(0, |w| w - 1);
        lag.max(window)
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if self.lags.is_empty() && self.windows.is_empty() {
            return Err(PipelineError::Config("at least one lag or rolling window is required".to_string()));
        }
        if self.lags.contains(&0) {
            return Err(PipelineError::Config("lags must be at least 1".to_string()));
        }
        if let Some(w) = self.windows.iter().find(|w| **w < 2) {
            return Err(PipelineError::Config(format!("rolling window {w} is too small, minimum is 2")));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub station_name: String,
    pub date: NaiveDate,
    pub precipitation: f64,
    /// Values in [`FeatureFrame::feature_names`] order.
    pub features: Vec<f64>,
}

/// Observation columns plus the derived feature columns; every value is defined.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureFrame {
    feature_names: Vec<String>,
    rows: Vec<FeatureRow>,
}

impl FeatureFrame {
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    #[must_use]
    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Observation columns plus derived columns.
    #[must_use]
    pub fn column_count(&self) -> usize {
        3 + self.feature_names.len()
    }

    #[must_use]
    pub fn feature_index(&self, name: &str) -> Option<usize> {
        self.feature_names.iter().position(|n| n == name)
    }

    #[must_use]
    pub fn targets(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.precipitation).collect()
    }

    /// Row-major inputs restricted to `names`, in the order given.
    pub fn select(&self, names: &[String]) -> PipelineResult<Vec<Vec<f64>>> {
        let indices = names
            .iter()
            .map(|name| {
                self.feature_index(name).ok_or_else(|| {
                    PipelineError::Config(format!(
                        "unknown feature {name}, available: {}",
                        self.feature_names.join(", ")
                    ))
                })
            })
            .collect::<PipelineResult<Vec<_>>>()?;

        Ok(self.rows.iter().map(|row| indices.iter().map(|&i| row.features[i]).collect()).collect())
    }

    /// Distinct station names in first-seen order.
    #[must_use]
    pub fn station_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for row in &self.rows {
            if !names.contains(&row.station_name) {
                names.push(row.station_name.clone());
            }
        }
        names
    }
}

impl Columnar for FeatureFrame {
    fn columns(&self) -> Vec<Column> {
        let mut columns = vec![
            Column {
                name: NAME.to_string(),
                data: ColumnData::Categorical(self.rows.iter().map(|r| Some(r.station_name.clone())).collect()),
            },
            Column { name: DATE.to_string(), data: ColumnData::Date(self.rows.iter().map(|r| Some(r.date)).collect()) },
            Column { name: PRCP.to_string(), data: ColumnData::Numeric(self.rows.iter().map(|r| Some(r.precipitation)).collect()) },
        ];
        for (i, name) in self.feature_names.iter().enumerate() {
            columns.push(Column {
                name: name.clone(),
                data: ColumnData::Numeric(self.rows.iter().map(|r| Some(r.features[i])).collect()),
            });
        }
        columns
    }
}

/// Derive the features of `spec` for every row of `snapshot` and keep only
/// the rows where all of them are defined.
pub fn build_features(snapshot: &Snapshot, spec: &FeatureSpec) -> PipelineResult<FeatureFrame> {
    spec.validate()?;

    let values: Vec<Option<f64>> =
        snapshot.iter().map(|r| r.precipitation.filter(|v| v.is_finite())).collect();
    let mut rows = Vec::with_capacity(snapshot.len().saturating_sub(spec.max_history()));

    for (i, record) in snapshot.iter().enumerate() {
        let Some(precipitation) = values[i] else {
            continue;
        };

        let lags = spec.lags.iter().map(|&lag| i.checked_sub(lag).and_then(|j| values[j]));
        let windows = spec.windows.iter().flat_map(|&w| {
            let window = trailing_window(&values, i, w);
            [window.as_deref().map(mean), window.as_deref().and_then(sample_std)]
        });

        if let Some(features) = lags.chain(windows).collect::<Option<Vec<f64>>>() {
            rows.push(FeatureRow {
                station_name: record.station_name.clone(),
                date: record.date,
                precipitation,
                features,
            });
        }
    }

    info!(
        input_rows = snapshot.len(),
        output_rows = rows.len(),
        derived_columns = spec.feature_names().len(),
        "Built feature frame"
    );

    Ok(FeatureFrame { feature_names: spec.feature_names(), rows })
}

/// The `size` values ending at row `end` inclusive, if all exist.
fn trailing_window(values: &[Option<f64>], end: usize, size: usize) -> Option<Vec<f64>> {
    let start = (end + 1).checked_sub(size)?;
    values[start..=end].iter().copied().collect()
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

#[allow(clippy::cast_precision_loss)]
fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    Some((ss / (values.len() - 1) as f64).sqrt())
}
