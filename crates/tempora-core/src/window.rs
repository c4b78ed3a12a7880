//! Rolling time-window selection.
//!
//! A window is always measured back from a single reference instant that is
//! resolved once per pipeline run. The engine never reads the wall clock: a
//! caller that wants "now" declares it with [`ReferenceInstant::At`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TemporaError;
use crate::types::{Granularity, Record, Timestamp};

/// Selection option for the rolling window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeWindow {
    /// The 30 days up to the reference instant.
    #[serde(rename = "last_30_days")]
    Last30Days,
    /// The 12 weeks (84 days) up to the reference instant.
    #[serde(rename = "last_12_weeks")]
    Last12Weeks,
    /// The 12 months (365 days) up to the reference instant.
    #[serde(rename = "last_12_months")]
    Last12Months,
    /// Every record, unfiltered.
    AllTime,
}

impl TimeWindow {
    /// Returns all options in display order.
    #[must_use]
    pub fn all() -> &'static [TimeWindow] {
        &[
            TimeWindow::Last30Days,
            TimeWindow::Last12Weeks,
            TimeWindow::Last12Months,
            TimeWindow::AllTime,
        ]
    }

    /// Window length in days, or `None` for all time.
    #[must_use]
    pub fn length_days(&self) -> Option<i64> {
        match self {
            Self::Last30Days => Some(30),
            Self::Last12Weeks => Some(84),
            Self::Last12Months => Some(365),
            Self::AllTime => None,
        }
    }

    /// Returns the selection label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Last30Days => "Last 30 days",
            Self::Last12Weeks => "Last 12 Weeks",
            Self::Last12Months => "Last 12 Months",
            Self::AllTime => "All Time",
        }
    }

    /// Parses a selection label, case-insensitively.
    ///
    /// "Last 1 Year" is accepted as an alias of "Last 12 Months".
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "last 30 days" | "last_30_days" => Some(Self::Last30Days),
            "last 12 weeks" | "last_12_weeks" => Some(Self::Last12Weeks),
            "last 12 months" | "last_12_months" | "last 1 year" => Some(Self::Last12Months),
            "all time" | "all_time" => Some(Self::AllTime),
            _ => None,
        }
    }

    /// Granularity a view uses with this window unless it declares one.
    #[must_use]
    pub fn default_granularity(&self) -> Granularity {
        match self {
            Self::Last30Days => Granularity::Day,
            Self::Last12Weeks => Granularity::Week,
            Self::Last12Months | Self::AllTime => Granularity::Month,
        }
    }

    /// Inclusive lower bound of the window relative to `reference`.
    #[must_use]
    pub fn lower_bound(&self, reference: Timestamp) -> Option<Timestamp> {
        self.length_days().map(|days| reference.minus_days(days))
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TimeWindow {
    type Err = TemporaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_label(s)
            .ok_or_else(|| TemporaError::invalid_request(format!("unknown time window '{s}'")))
    }
}

/// Declared source of the reference instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceInstant {
    /// The maximum timestamp observed in the record set.
    #[default]
    DatasetMax,
    /// A caller-declared instant.
    At(Timestamp),
}

impl ReferenceInstant {
    /// Resolves the reference instant against the parsed timestamps of a run.
    ///
    /// Returns `None` for `DatasetMax` over an empty set.
    pub fn resolve<I>(&self, timestamps: I) -> Option<Timestamp>
    where
        I: IntoIterator<Item = Timestamp>,
    {
        match self {
            Self::DatasetMax => timestamps.into_iter().max(),
            Self::At(ts) => Some(*ts),
        }
    }
}

/// A record paired with its parsed timestamp and input row index.
#[derive(Debug, Clone, Copy)]
pub struct StampedRecord<'a> {
    /// Row index in the source record set.
    pub row: usize,
    /// Parsed timestamp.
    pub timestamp: Timestamp,
    /// The record itself.
    pub record: &'a Record,
}

/// Filters records to `[reference - window, reference]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindowSelector {
    window: TimeWindow,
    reference: Option<Timestamp>,
}

impl TimeWindowSelector {
    /// Creates a selector for `window` ending at the resolved `reference`.
    ///
    /// A bounded window without a reference selects nothing.
    #[must_use]
    pub fn new(window: TimeWindow, reference: Option<Timestamp>) -> Self {
        Self { window, reference }
    }

    /// Returns the window.
    #[must_use]
    pub fn window(&self) -> TimeWindow {
        self.window
    }

    /// Returns the resolved reference instant.
    #[must_use]
    pub fn reference(&self) -> Option<Timestamp> {
        self.reference
    }

    /// Returns true if `timestamp` lies inside the window (bounds inclusive).
    #[must_use]
    pub fn includes(&self, timestamp: Timestamp) -> bool {
        match (self.window.length_days(), self.reference) {
            (None, _) => true,
            (Some(days), Some(reference)) => {
                timestamp >= reference.minus_days(days) && timestamp <= reference
            }
            (Some(_), None) => false,
        }
    }

    /// Keeps the records inside the window, preserving order.
    #[must_use]
    pub fn select<'a>(&self, records: &[StampedRecord<'a>]) -> Vec<StampedRecord<'a>> {
        records
            .iter()
            .filter(|r| self.includes(r.timestamp))
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    #[test]
    fn test_window_lengths() {
        assert_eq!(TimeWindow::Last30Days.length_days(), Some(30));
        assert_eq!(TimeWindow::Last12Weeks.length_days(), Some(84));
        assert_eq!(TimeWindow::Last12Months.length_days(), Some(365));
        assert_eq!(TimeWindow::AllTime.length_days(), None);
    }

    #[test]
    fn test_thirty_day_window() {
        let selector = TimeWindowSelector::new(TimeWindow::Last30Days, Some(ts("2024-03-31")));
        assert!(!selector.includes(ts("2024-02-01")));
        assert!(selector.includes(ts("2024-03-15")));
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let selector = TimeWindowSelector::new(TimeWindow::Last30Days, Some(ts("2024-03-31")));
        assert!(selector.includes(ts("2024-03-01")));
        assert!(selector.includes(ts("2024-03-31")));
        assert!(!selector.includes(ts("2024-02-29 23:59:59")));
        assert!(!selector.includes(ts("2024-03-31 00:00:01")));
    }

    #[test]
    fn test_all_time_ignores_reference() {
        let selector = TimeWindowSelector::new(TimeWindow::AllTime, None);
        assert!(selector.includes(ts("1999-01-01")));
    }

    #[test]
    fn test_bounded_window_without_reference_selects_nothing() {
        let selector = TimeWindowSelector::new(TimeWindow::Last12Weeks, None);
        assert!(!selector.includes(ts("2024-01-01")));
    }

    #[test]
    fn test_select_preserves_order() {
        let record = Record::new("", vec![], vec![]);
        let stamped: Vec<_> = ["2024-03-20", "2023-01-01", "2024-03-10"]
            .iter()
            .enumerate()
            .map(|(row, s)| StampedRecord {
                row,
                timestamp: ts(s),
                record: &record,
            })
            .collect();
        let selector = TimeWindowSelector::new(TimeWindow::Last30Days, Some(ts("2024-03-31")));
        let rows: Vec<_> = selector.select(&stamped).iter().map(|r| r.row).collect();
        assert_eq!(rows, vec![0, 2]);
        assert!(selector.select(&[]).is_empty());
    }

    #[test]
    fn test_reference_resolution() {
        let stamps = vec![ts("2024-01-01"), ts("2024-03-31"), ts("2024-02-15")];
        assert_eq!(
            ReferenceInstant::DatasetMax.resolve(stamps.clone()),
            Some(ts("2024-03-31"))
        );
        assert_eq!(
            ReferenceInstant::At(ts("2025-01-01")).resolve(stamps),
            Some(ts("2025-01-01"))
        );
        assert_eq!(ReferenceInstant::DatasetMax.resolve(Vec::new()), None);
    }

    #[test]
    fn test_labels_and_defaults() {
        assert_eq!(
            TimeWindow::from_label("Last 1 Year"),
            Some(TimeWindow::Last12Months)
        );
        for window in TimeWindow::all() {
            assert_eq!(TimeWindow::from_label(window.label()), Some(*window));
        }
        assert_eq!(TimeWindow::Last12Weeks.default_granularity(), Granularity::Week);
        assert!("Last 2 days".parse::<TimeWindow>().is_err());
    }
}
