//! Bucketing resolution.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::Date;
use crate::error::TemporaError;

/// Time resolution used to bucket records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// One bucket per calendar date.
    Day,
    /// One bucket per week, anchored on the week-ending date.
    Week,
    /// One bucket per calendar month, anchored on the first day.
    Month,
}

impl Granularity {
    /// Returns all granularities from finest to coarsest.
    #[must_use]
    pub fn all() -> &'static [Granularity] {
        &[Granularity::Day, Granularity::Week, Granularity::Month]
    }

    /// Returns the lowercase identifier.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }

    /// Renders the display label for a bucket anchored on `anchor`.
    ///
    /// Labels are for display only and never used for ordering.
    #[must_use]
    pub fn format_label(&self, anchor: Date) -> String {
        match self {
            Self::Day | Self::Week => anchor.format("%b-%d-%Y"),
            Self::Month => anchor.format("%b-%Y"),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = TemporaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "day" | "daily" | "d" => Ok(Self::Day),
            "week" | "weekly" | "w" => Ok(Self::Week),
            "month" | "monthly" | "m" => Ok(Self::Month),
            other => Err(TemporaError::invalid_request(format!(
                "unknown granularity '{other}'"
            ))),
        }
    }
}
