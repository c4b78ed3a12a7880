//! Calendar date type used for period anchors.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{TemporaError, TemporaResult};

/// A calendar date.
///
/// Newtype around `chrono::NaiveDate` carrying the calendar operations the
/// bucketing rules need (month starts, week endings).
///
/// # Example
///
/// ```rust
/// use chrono::Weekday;
/// use tempora_core::types::Date;
///
/// let date = Date::from_ymd(2024, 3, 13).unwrap();
/// assert_eq!(date.start_of_month(), Date::from_ymd(2024, 3, 1).unwrap());
/// assert_eq!(
///     date.next_on_or_after(Weekday::Sun),
///     Date::from_ymd(2024, 3, 17).unwrap()
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Date(NaiveDate);

impl Date {
    /// Creates a new date from year, month, and day.
    ///
    /// # Errors
    ///
    /// Returns `TemporaError::InvalidRequest` if the date does not exist.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> TemporaResult<Self> {
        NaiveDate::from_ymd_opt(year, month, day)
            .map(Date)
            .ok_or_else(|| {
                TemporaError::invalid_request(format!(
                    "invalid date {year}-{month:02}-{day:02}"
                ))
            })
    }

    /// Creates a date from an ISO 8601 string (YYYY-MM-DD).
    ///
    /// # Errors
    ///
    /// Returns `TemporaError::TimestampParse` if the string is not a valid date.
    pub fn parse(s: &str) -> TemporaResult<Self> {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map(Date)
            .map_err(|_| TemporaError::timestamp_parse(s))
    }

    /// Returns the year component.
    #[must_use]
    pub fn year(&self) -> i32 {
        self.0.year()
    }

    /// Returns the month component (1-12).
    #[must_use]
    pub fn month(&self) -> u32 {
        self.0.month()
    }

    /// Returns the day component (1-31).
    #[must_use]
    pub fn day(&self) -> u32 {
        self.0.day()
    }

    /// Returns the day of week.
    #[must_use]
    pub fn weekday(&self) -> Weekday {
        self.0.weekday()
    }

    /// Adds a number of days to the date, saturating at the calendar limits.
    #[must_use]
    pub fn add_days(&self, days: i64) -> Self {
        let limit = if days < 0 { NaiveDate::MIN } else { NaiveDate::MAX };
        chrono::Duration::try_days(days)
            .and_then(|d| self.0.checked_add_signed(d))
            .map_or(Date(limit), Date)
    }

    /// Calculates the number of calendar days between two dates.
    #[must_use]
    pub fn days_between(&self, other: &Date) -> i64 {
        (other.0 - self.0).num_days()
    }

    /// Returns the first day of the month.
    #[must_use]
    pub fn start_of_month(&self) -> Self {
        // Day 1 exists in every month, so `with_day` cannot fail here.
        Date(self.0.with_day(1).unwrap_or(self.0))
    }

    /// Returns the first date on or after `self` that falls on `weekday`.
    ///
    /// A date that already falls on `weekday` is returned unchanged.
    #[must_use]
    pub fn next_on_or_after(&self, weekday: Weekday) -> Self {
        let current = i64::from(self.weekday().num_days_from_monday());
        let target = i64::from(weekday.num_days_from_monday());
        self.add_days((target - current).rem_euclid(7))
    }

    /// Formats the date with a chrono format string.
    #[must_use]
    pub fn format(&self, fmt: &str) -> String {
        self.0.format(fmt).to_string()
    }

    /// Returns the underlying `NaiveDate`.
    #[must_use]
    pub fn as_naive_date(&self) -> NaiveDate {
        self.0
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl From<NaiveDate> for Date {
    fn from(date: NaiveDate) -> Self {
        Date(date)
    }
}

impl From<Date> for NaiveDate {
    fn from(date: Date) -> Self {
        date.0
    }
}
