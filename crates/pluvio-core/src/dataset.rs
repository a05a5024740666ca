//! Observation records, dataset snapshots and their column view.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Source column holding the observation date.
pub const DATE: &str = "DATE";
/// Source column holding the station name.
pub const NAME: &str = "NAME";
/// Source column holding daily precipitation.
pub const PRCP: &str = "PRCP";

/// Columns every source table must carry.
pub const REQUIRED_COLUMNS: [&str; 3] = [DATE, NAME, PRCP];

/// One daily observation from a station feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub station_name: String,
    pub date: NaiveDate,
    pub precipitation: Option<f64>,
}

impl Observation {
    /// No field is missing.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.station_name.trim().is_empty() && self.precipitation.is_some_and(f64::is_finite)
    }
}

/// An ordered, read-only sequence of observations produced by one pipeline stage.
///
/// Stages never mutate a snapshot; they build a new one.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    records: Vec<Observation>,
}

impl Snapshot {
    #[must_use]
    pub fn new(records: Vec<Observation>) -> Self {
        Self { records }
    }

    #[must_use]
    pub fn records(&self) -> &[Observation] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Observation> {
        self.records.iter()
    }

    #[must_use]
    pub fn precipitation(&self) -> Vec<Option<f64>> {
        self.records.iter().map(|r| r.precipitation).collect()
    }
}

impl FromIterator<Observation> for Snapshot {
    fn from_iter<I: IntoIterator<Item = Observation>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a Observation;
    type IntoIter = std::slice::Iter<'a, Observation>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Values of one column; `None` marks a missing cell.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Numeric(Vec<Option<f64>>),
    Categorical(Vec<Option<String>>),
    Date(Vec<Option<NaiveDate>>),
}

impl ColumnData {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Numeric(v) => v.len(),
            Self::Categorical(v) => v.len(),
            Self::Date(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Numeric(_) => "numeric",
            Self::Categorical(_) => "categorical",
            Self::Date(_) => "date",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    #[must_use]
    pub fn numeric(name: &str, values: &[f64]) -> Self {
        Self { name: name.to_string(), data: ColumnData::Numeric(values.iter().copied().map(Some).collect()) }
    }
}

/// Anything that can be viewed column by column.
pub trait Columnar {
    fn columns(&self) -> Vec<Column>;
}

impl Columnar for Snapshot {
    fn columns(&self) -> Vec<Column> {
        vec![
            Column {
                name: NAME.to_string(),
                data: ColumnData::Categorical(
                    self.records
                        .iter()
                        .map(|r| (!r.station_name.trim().is_empty()).then(|| r.station_name.clone()))
                        .collect(),
                ),
            },
            Column {
                name: DATE.to_string(),
                data: ColumnData::Date(self.records.iter().map(|r| Some(r.date)).collect()),
            },
            Column { name: PRCP.to_string(), data: ColumnData::Numeric(self.precipitation()) },
        ]
    }
}

impl Columnar for [Column] {
    fn columns(&self) -> Vec<Column> {
        self.to_vec()
    }
}

impl Columnar for Vec<Column> {
    fn columns(&self) -> Vec<Column> {
        self.clone()
    }
}
