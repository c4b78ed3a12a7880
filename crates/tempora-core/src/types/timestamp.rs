//! Parsed record timestamps.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::Date;
use crate::error::{TemporaError, TemporaResult};

/// Date-time layouts tried in order before falling back to date-only forms.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// A parsed, timezone-naive instant.
///
/// RFC 3339 input with an offset is normalized to UTC. Serializes as
/// `YYYY-MM-DDTHH:MM:SS[.fff]` and deserializes from any accepted textual form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timestamp(NaiveDateTime);

impl Timestamp {
    /// Parses a raw timestamp field.
    ///
    /// # Errors
    ///
    /// Returns `TemporaError::TimestampParse` when no accepted layout matches.
    pub fn parse(raw: &str) -> TemporaResult<Self> {
        let text = raw.trim();
        if text.is_empty() {
            return Err(TemporaError::timestamp_parse(raw));
        }

        for fmt in DATETIME_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
                return Ok(Timestamp(dt));
            }
        }

        for fmt in DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(text, fmt) {
                return Ok(Timestamp(date.and_time(NaiveTime::MIN)));
            }
        }

        DateTime::parse_from_rfc3339(text)
            .map(|dt| Timestamp(dt.naive_utc()))
            .map_err(|_| TemporaError::timestamp_parse(raw))
    }

    /// Midnight at the start of `date`.
    #[must_use]
    pub fn from_date(date: Date) -> Self {
        Timestamp(date.as_naive_date().and_time(NaiveTime::MIN))
    }

    /// Returns the calendar date of this instant.
    #[must_use]
    pub fn date(&self) -> Date {
        Date::from(self.0.date())
    }

    /// Moves the instant back by whole days, saturating at the earliest
    /// representable instant.
    #[must_use]
    pub fn minus_days(&self, days: i64) -> Self {
        chrono::Duration::try_days(days)
            .and_then(|d| self.0.checked_sub_signed(d))
            .map_or(Timestamp(NaiveDateTime::MIN), Timestamp)
    }

    /// Returns the underlying `NaiveDateTime`.
    #[must_use]
    pub fn as_naive(&self) -> NaiveDateTime {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%dT%H:%M:%S%.f"))
    }
}

impl FromStr for Timestamp {
    type Err = TemporaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Timestamp {
    type Error = TemporaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Timestamp> for String {
    fn from(ts: Timestamp) -> Self {
        ts.to_string()
    }
}

impl From<NaiveDateTime> for Timestamp {
    fn from(dt: NaiveDateTime) -> Self {
        Timestamp(dt)
    }
}

impl From<Date> for Timestamp {
    fn from(date: Date) -> Self {
        Timestamp::from_date(date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> Date {
        Date::from_ymd(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_date_only() {
        let ts = Timestamp::parse("2024-01-05").unwrap();
        assert_eq!(ts.date(), ymd(2024, 1, 5));
        assert_eq!(ts.to_string(), "2024-01-05T00:00:00");
    }

    #[test]
    fn test_parse_datetime_forms() {
        for raw in [
            "2024-01-05 13:45:10",
            "2024-01-05T13:45:10",
            "2024-01-05 13:45:10.250",
            "  2024-01-05 13:45:10  ",
        ] {
            let ts = Timestamp::parse(raw).unwrap();
            assert_eq!(ts.date(), ymd(2024, 1, 5), "{raw}");
        }
    }

    #[test]
    fn test_parse_us_format() {
        let ts = Timestamp::parse("03/15/2024").unwrap();
        assert_eq!(ts.date(), ymd(2024, 3, 15));
        let ts = Timestamp::parse("03/15/2024 08:30").unwrap();
        assert_eq!(ts.date(), ymd(2024, 3, 15));
    }

    #[test]
    fn test_parse_rfc3339_normalizes_to_utc() {
        let ts = Timestamp::parse("2024-03-31T23:30:00-02:00").unwrap();
        assert_eq!(ts.date(), ymd(2024, 4, 1));
    }

    #[test]
    fn test_parse_failures() {
        for raw in ["", "   ", "yesterday", "2024-13-01", "2024-02-30"] {
            let err = Timestamp::parse(raw).unwrap_err();
            assert!(matches!(err, TemporaError::TimestampParse { .. }), "{raw}");
        }
    }

    #[test]
    fn test_minus_days() {
        let ts = Timestamp::parse("2024-03-31").unwrap();
        assert_eq!(ts.minus_days(30).date(), ymd(2024, 3, 1));
    }

    #[test]
    fn test_minus_days_saturates_at_min() {
        let ts = Timestamp::from(NaiveDateTime::MIN);
        assert_eq!(ts.minus_days(30), Timestamp::from(NaiveDateTime::MIN));
        let near = Timestamp::from_date(Date::from(NaiveDate::MIN).add_days(9));
        assert_eq!(near.minus_days(30), Timestamp::from(NaiveDateTime::MIN));
        assert_eq!(near.minus_days(i64::MAX), Timestamp::from(NaiveDateTime::MIN));
    }

    #[test]
    fn test_fractional_seconds_survive_serde() {
        let ts = Timestamp::parse("2024-03-31 08:15:30.250").unwrap();
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "\"2024-03-31T08:15:30.250\"");
        assert_eq!(serde_json::from_str::<Timestamp>(&json).unwrap(), ts);
    }

    #[test]
    fn test_serde_roundtrip_accepts_any_form() {
        let ts: Timestamp = serde_json::from_str("\"2024-03-31\"").unwrap();
        assert_eq!(serde_json::to_string(&ts).unwrap(), "\"2024-03-31T00:00:00\"");
    }
}
