//! Cleaning rule for the Barcelona airport feed (SP000008181).
//!
//! The station's record has a quality gap that ends at the start of 1939, so
//! everything dated on or before the cutoff is discarded and then any record
//! with a missing field is dropped. This is a rule about one station's
//! history, not a general missing-data strategy; other feeds need their own
//! cutoff or none at all.

use crate::config::CleaningConfig;
use crate::dataset::Snapshot;
use chrono::NaiveDate;
use tracing::info;

/// Last day of the known gap in the source feed.
#[must_use]
pub fn default_cutoff() -> NaiveDate {
    NaiveDate::from_ymd_opt(1939, 1, 1).expect("valid cutoff date")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cleaner {
    cutoff: NaiveDate,
}

impl Default for Cleaner {
    fn default() -> Self {
        Self::new(default_cutoff())
    }
}

impl Cleaner {
    #[must_use]
    pub fn new(cutoff: NaiveDate) -> Self {
        Self { cutoff }
    }

    #[must_use]
    pub fn from_config(config: &CleaningConfig) -> Self {
        Self::new(config.cutoff)
    }

    #[must_use]
    pub fn cutoff(&self) -> NaiveDate {
        self.cutoff
    }

    /// Records strictly after the cutoff with every field present, in input order.
    #[must_use]
    pub fn clean(&self, raw: &Snapshot) -> Snapshot {
        let cleaned: Snapshot = raw
            .iter()
            .filter(|r| r.date > self.cutoff)
            .filter(|r| r.is_complete())
            .cloned()
            .collect();

        info!(
            cutoff = %self.cutoff,
            raw_rows = raw.len(),
            clean_rows = cleaned.len(),
            "Cleaned dataset"
        );
        cleaned
    }
}
