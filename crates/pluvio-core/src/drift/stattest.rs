//! Default drift comparator.
//!
//! Test selection per column, `n` being the number of distinct values across
//! both sides:
//!
//! | reference rows | numeric, `n > 5` | otherwise |
//! |---|---|---|
//! | `<= small_sample_limit` | Kolmogorov-Smirnov | chi-square (`n > 2`) or two-proportion z-test |
//! | larger | Wasserstein distance normed by reference std | Jensen-Shannon distance |

use super::{ColumnDrift, DriftDetector, StatTest};
use crate::config::DriftConfig;
use crate::dataset::ColumnData;
use crate::error::{PipelineError, PipelineResult};
use statrs::distribution::{ChiSquared, ContinuousCDF, Normal};
use std::collections::{BTreeMap, BTreeSet};

/// Numeric columns with at most this many distinct values are compared as categories.
const CATEGORY_LIMIT: usize = 5;
const BINARY_LIMIT: usize = 2;
/// Floor for the reference standard deviation that norms the Wasserstein distance.
const MIN_STD: f64 = 0.001;
/// Share given to empty histogram bins so the divergence stays finite.
const EMPTY_SHARE: f64 = 0.0001;

#[derive(Debug, Clone, Default)]
pub struct StatTestDetector {
    config: DriftConfig,
}

impl StatTestDetector {
    #[must_use]
    pub fn new(config: DriftConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn from_config(config: &DriftConfig) -> Self {
        Self::new(config.clone())
    }

    #[must_use]
    pub fn select_test(&self, reference_len: usize, distinct: usize, numeric: bool) -> StatTest {
        let continuous = numeric && distinct > CATEGORY_LIMIT;
        if reference_len <= self.config.small_sample_limit {
            if continuous {
                StatTest::KolmogorovSmirnov
            } else if distinct > BINARY_LIMIT {
                StatTest::ChiSquare
            } else {
                StatTest::ZTest
            }
        } else if continuous {
            StatTest::Wasserstein
        } else {
            StatTest::JensenShannon
        }
    }

    fn threshold(&self, test: StatTest) -> f64 {
        if test.is_p_value() { self.config.p_value_threshold } else { self.config.distance_threshold }
    }

    fn compare_numeric(&self, column: &str, reference: &[f64], current: &[f64]) -> PipelineResult<ColumnDrift> {
        let reference_keys: Vec<u64> = reference.iter().map(|v| float_key(*v)).collect();
        let current_keys: Vec<u64> = current.iter().map(|v| float_key(*v)).collect();

        let test = self.select_test(reference.len(), distinct_count(&reference_keys, &current_keys), true);
        let score = match test {
            StatTest::KolmogorovSmirnov => ks_p_value(reference, current),
            StatTest::ChiSquare => chi_square_p_value(&reference_keys, &current_keys)?,
            StatTest::ZTest => z_test_p_value(&reference_keys, &current_keys)?,
            StatTest::Wasserstein => wasserstein_normed(reference, current),
            StatTest::JensenShannon => jensen_shannon_binned(reference, current, self.config.bins),
        };
        Ok(ColumnDrift::new(column, test, score, self.threshold(test)))
    }

    fn compare_categorical(&self, column: &str, reference: &[&str], current: &[&str]) -> PipelineResult<ColumnDrift> {
        let test = self.select_test(reference.len(), distinct_count(reference, current), false);
        let score = match test {
            StatTest::ChiSquare => chi_square_p_value(reference, current)?,
            StatTest::ZTest => z_test_p_value(reference, current)?,
            _ => {
                let (p, q) = category_shares(reference, current);
                jensen_shannon_distance(&p, &q)
            }
        };
        Ok(ColumnDrift::new(column, test, score, self.threshold(test)))
    }
}

impl DriftDetector for StatTestDetector {
    fn name(&self) -> &'static str {
        "stattest"
    }

    fn compare_column(&self, column: &str, reference: &ColumnData, current: &ColumnData) -> PipelineResult<ColumnDrift> {
        match (reference, current) {
            (ColumnData::Numeric(r), ColumnData::Numeric(c)) => {
                let r: Vec<f64> = r.iter().flatten().copied().filter(|v| v.is_finite()).collect();
                let c: Vec<f64> = c.iter().flatten().copied().filter(|v| v.is_finite()).collect();
                ensure_values(column, r.len(), c.len())?;
                self.compare_numeric(column, &r, &c)
            }
            (ColumnData::Categorical(r), ColumnData::Categorical(c)) => {
                let r: Vec<&str> = r.iter().flatten().map(String::as_str).collect();
                let c: Vec<&str> = c.iter().flatten().map(String::as_str).collect();
                ensure_values(column, r.len(), c.len())?;
                self.compare_categorical(column, &r, &c)
            }
            (r, c) => Err(PipelineError::Drift(format!(
                "cannot compare {} column {column} with a {} column",
                r.kind(),
                c.kind()
            ))),
        }
    }
}

fn ensure_values(column: &str, reference: usize, current: usize) -> PipelineResult<()> {
    let side = match (reference, current) {
        (0, _) => "reference",
        (_, 0) => "current",
        _ => return Ok(()),
    };
    Err(PipelineError::EmptyDataset(format!("column {column} has no values in the {side} snapshot")))
}

/// Hashable identity of a float; `-0.0` and `0.0` are the same value.
fn float_key(value: f64) -> u64 {
    if value == 0.0 { 0.0_f64.to_bits() } else { value.to_bits() }
}

fn distinct_count<K: Ord>(reference: &[K], current: &[K]) -> usize {
    reference.iter().chain(current).collect::<BTreeSet<_>>().len()
}

fn counts<K: Ord>(values: &[K]) -> BTreeMap<&K, usize> {
    let mut counts = BTreeMap::new();
    for value in values {
        *counts.entry(value).or_insert(0) += 1;
    }
    counts
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut values = values.to_vec();
    values.sort_by(f64::total_cmp);
    values
}

/// Goodness of fit of the current counts against reference counts scaled to
/// the current size. A value absent from the reference makes the statistic
/// infinite.
#[allow(clippy::cast_precision_loss)]
fn chi_square_p_value<K: Ord>(reference: &[K], current: &[K]) -> PipelineResult<f64> {
    let expected_counts = counts(reference);
    let observed_counts = counts(current);
    let keys: BTreeSet<&K> = expected_counts.keys().chain(observed_counts.keys()).copied().collect();
    let scale = current.len() as f64 / reference.len() as f64;

    let mut statistic = 0.0;
    for key in &keys {
        let expected = expected_counts.get(key).copied().unwrap_or(0) as f64 * scale;
        let observed = observed_counts.get(key).copied().unwrap_or(0) as f64;
        if expected == 0.0 {
            if observed > 0.0 {
                return Ok(0.0);
            }
            continue;
        }
        statistic += (observed - expected).powi(2) / expected;
    }

    let dof = keys.len().saturating_sub(1);
    if dof == 0 {
        return Ok(1.0);
    }
    let distribution = ChiSquared::new(dof as f64).map_err(|e| PipelineError::Drift(e.to_string()))?;
    Ok((1.0 - distribution.cdf(statistic)).clamp(0.0, 1.0))
}

/// Two-sided test on the share of values different from the smallest key.
#[allow(clippy::cast_precision_loss)]
fn z_test_p_value<K: Ord>(reference: &[K], current: &[K]) -> PipelineResult<f64> {
    let Some(first) = reference.iter().chain(current).min() else {
        return Ok(1.0);
    };
    let share = |values: &[K]| values.iter().filter(|v| *v != first).count() as f64 / values.len() as f64;

    let (n1, n2) = (reference.len() as f64, current.len() as f64);
    let (p1, p2) = (share(reference), share(current));
    let pooled = (p1 * n1 + p2 * n2) / (n1 + n2);
    let denominator = (pooled * (1.0 - pooled) * (1.0 / n1 + 1.0 / n2)).sqrt();
    if denominator == 0.0 {
        return Ok(1.0);
    }

    let z = (p1 - p2) / denominator;
    let normal = Normal::new(0.0, 1.0).map_err(|e| PipelineError::Drift(e.to_string()))?;
    Ok((2.0 * (1.0 - normal.cdf(z.abs()))).clamp(0.0, 1.0))
}

/// Two-sample Kolmogorov-Smirnov p-value (asymptotic, Stephens' small-sample correction).
#[allow(clippy::cast_precision_loss)]
fn ks_p_value(reference: &[f64], current: &[f64]) -> f64 {
    let (a, b) = (sorted(reference), sorted(current));
    let (n, m) = (a.len(), b.len());

    let (mut i, mut j) = (0, 0);
    let mut statistic = 0.0_f64;
    while i < n && j < m {
        let x = if a[i] <= b[j] { a[i] } else { b[j] };
        while i < n && a[i] <= x {
            i += 1;
        }
        while j < m && b[j] <= x {
            j += 1;
        }
        statistic = statistic.max((i as f64 / n as f64 - j as f64 / m as f64).abs());
    }

    let effective = ((n * m) as f64 / (n + m) as f64).sqrt();
    kolmogorov_q((effective + 0.12 + 0.11 / effective) * statistic)
}

/// Survival function of the Kolmogorov distribution.
fn kolmogorov_q(z: f64) -> f64 {
    if z <= 0.0 {
        return 1.0;
    }
    let p = if z < 1.18 {
        let y = (-std::f64::consts::PI.powi(2) / (8.0 * z * z)).exp();
        (2.0 * std::f64::consts::PI).sqrt() / z * (y + y.powi(9) + y.powi(25) + y.powi(49))
    } else {
        let x = (-2.0 * z * z).exp();
        1.0 - 2.0 * (x - x.powi(4) + x.powi(9))
    };
    (1.0 - p).clamp(0.0, 1.0)
}

#[allow(clippy::cast_precision_loss)]
fn population_std(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

/// First Wasserstein distance between the empirical distributions.
#[allow(clippy::cast_precision_loss)]
fn wasserstein_distance(reference: &[f64], current: &[f64]) -> f64 {
    let (a, b) = (sorted(reference), sorted(current));
    let (n, m) = (a.len(), b.len());
    let mut all: Vec<f64> = a.iter().chain(&b).copied().collect();
    all.sort_by(f64::total_cmp);

    let (mut i, mut j) = (0, 0);
    let mut distance = 0.0;
    for pair in all.windows(2) {
        let x = pair[0];
        while i < n && a[i] <= x {
            i += 1;
        }
        while j < m && b[j] <= x {
            j += 1;
        }
        distance += (i as f64 / n as f64 - j as f64 / m as f64).abs() * (pair[1] - pair[0]);
    }
    distance
}

fn wasserstein_normed(reference: &[f64], current: &[f64]) -> f64 {
    wasserstein_distance(reference, current) / population_std(reference).max(MIN_STD)
}

/// Jensen-Shannon distance over `bins` equal-width bins spanning both samples.
#[allow(clippy::cast_precision_loss)]
fn jensen_shannon_binned(reference: &[f64], current: &[f64], bins: usize) -> f64 {
    let bins = bins.max(2);
    let min = reference.iter().chain(current).copied().fold(f64::INFINITY, f64::min);
    let max = reference.iter().chain(current).copied().fold(f64::NEG_INFINITY, f64::max);
    let (low, high) = if max > min { (min, max) } else { (min - 0.5, max + 0.5) };
    let width = (high - low) / bins as f64;

    let histogram = |values: &[f64]| {
        let mut shares = vec![0.0; bins];
        for v in values {
            let bin = (((v - low) / width) as usize).min(bins - 1);
            shares[bin] += 1.0;
        }
        let total = values.len() as f64;
        shares.iter().map(|c| fill_empty(c / total)).collect::<Vec<_>>()
    };

    jensen_shannon_distance(&histogram(reference), &histogram(current))
}

#[allow(clippy::cast_precision_loss)]
fn category_shares<K: Ord>(reference: &[K], current: &[K]) -> (Vec<f64>, Vec<f64>) {
    let (reference_counts, current_counts) = (counts(reference), counts(current));
    let keys: BTreeSet<&K> = reference_counts.keys().chain(current_counts.keys()).copied().collect();

    let shares = |counts: &BTreeMap<&K, usize>, total: usize| {
        keys.iter()
            .map(|k| fill_empty(counts.get(k).copied().unwrap_or(0) as f64 / total as f64))
            .collect::<Vec<_>>()
    };
    (shares(&reference_counts, reference.len()), shares(&current_counts, current.len()))
}

fn fill_empty(share: f64) -> f64 {
    if share == 0.0 { EMPTY_SHARE } else { share }
}

/// Square root of the Jensen-Shannon divergence (natural log) of the normalized inputs.
fn jensen_shannon_distance(p: &[f64], q: &[f64]) -> f64 {
    let (p_total, q_total) = (p.iter().sum::<f64>(), q.iter().sum::<f64>());
    let mut divergence = 0.0;
    for (p, q) in p.iter().zip(q) {
        let (p, q) = (p / p_total, q / q_total);
        let m = (p + q) / 2.0;
        if p > 0.0 {
            divergence += 0.5 * p * (p / m).ln();
        }
        if q > 0.0 {
            divergence += 0.5 * q * (q / m).ln();
        }
    }
    divergence.max(0.0).sqrt()
}
