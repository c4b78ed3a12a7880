//! Period bucketing.
//!
//! Maps a timestamp to the [`PeriodKey`] of its bucket:
//!
//! - **Day**: the record's calendar date
//! - **Week**: the first week-ending weekday on or after the record's date
//!   (Sunday by default, so a Sunday record is its own bucket and a Monday
//!   record belongs to the following Sunday)
//! - **Month**: the first day of the record's month
//!
//! Bucketing is a pure function of (timestamp, granularity, week-ending day).

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::error::TemporaResult;
use crate::types::{Date, Granularity, PeriodKey, Timestamp};

/// Default week-ending day.
pub const DEFAULT_WEEK_ENDING: Weekday = Weekday::Sun;

/// Assigns timestamps to period buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodBucketer {
    /// Weekday on which weekly buckets end.
    pub week_ending: Weekday,
}

impl Default for PeriodBucketer {
    fn default() -> Self {
        Self {
            week_ending: DEFAULT_WEEK_ENDING,
        }
    }
}

impl PeriodBucketer {
    /// Creates a bucketer with weeks ending on Sunday.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the week-ending day.
    #[must_use]
    pub fn with_week_ending(mut self, weekday: Weekday) -> Self {
        self.week_ending = weekday;
        self
    }

    /// Buckets a calendar date.
    #[must_use]
    pub fn bucket_date(&self, date: Date, granularity: Granularity) -> PeriodKey {
        let anchor = match granularity {
            Granularity::Day => date,
            Granularity::Week => date.next_on_or_after(self.week_ending),
            Granularity::Month => date.start_of_month(),
        };
        PeriodKey::new(anchor, granularity)
    }

    /// Buckets a parsed timestamp. The time of day is irrelevant.
    #[must_use]
    pub fn bucket(&self, timestamp: Timestamp, granularity: Granularity) -> PeriodKey {
        self.bucket_date(timestamp.date(), granularity)
    }

    /// Parses and buckets a raw timestamp field.
    ///
    /// # Errors
    ///
    /// Returns `TemporaError::TimestampParse` if `raw` is not a timestamp.
    pub fn bucket_raw(&self, raw: &str, granularity: Granularity) -> TemporaResult<PeriodKey> {
        Timestamp::parse(raw).map(|ts| self.bucket(ts, granularity))
    }
}
