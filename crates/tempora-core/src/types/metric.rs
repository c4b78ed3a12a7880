//! Aggregate metrics addressable by name.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{TemporaError, TemporaResult};

/// A statistic that can be read from an aggregate row.
///
/// Metrics have canonical names (`records`, `count(m)`, `sum(m)`, `mean(m)`,
/// `min(m)`, `max(m)`) used for column ordering and for (de)serialization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Metric {
    /// Number of records in the bucket, regardless of measure nullity.
    RecordCount,
    /// Number of non-null values of a measure.
    Count(String),
    /// Sum of non-null values of a measure.
    Sum(String),
    /// Mean of non-null values of a measure.
    Mean(String),
    /// Minimum non-null value of a measure.
    Min(String),
    /// Maximum non-null value of a measure.
    Max(String),
}

impl Metric {
    /// Mean of `measure`.
    #[must_use]
    pub fn mean(measure: impl Into<String>) -> Self {
        Self::Mean(measure.into())
    }

    /// Sum of `measure`.
    #[must_use]
    pub fn sum(measure: impl Into<String>) -> Self {
        Self::Sum(measure.into())
    }

    /// Non-null count of `measure`.
    #[must_use]
    pub fn count(measure: impl Into<String>) -> Self {
        Self::Count(measure.into())
    }

    /// Minimum of `measure`.
    #[must_use]
    pub fn min(measure: impl Into<String>) -> Self {
        Self::Min(measure.into())
    }

    /// Maximum of `measure`.
    #[must_use]
    pub fn max(measure: impl Into<String>) -> Self {
        Self::Max(measure.into())
    }

    /// Returns the canonical name.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::RecordCount => "records".to_string(),
            Self::Count(m) => format!("count({m})"),
            Self::Sum(m) => format!("sum({m})"),
            Self::Mean(m) => format!("mean({m})"),
            Self::Min(m) => format!("min({m})"),
            Self::Max(m) => format!("max({m})"),
        }
    }

    /// Returns the measure this metric reads, if any.
    #[must_use]
    pub fn measure(&self) -> Option<&str> {
        match self {
            Self::RecordCount => None,
            Self::Count(m) | Self::Sum(m) | Self::Mean(m) | Self::Min(m) | Self::Max(m) => {
                Some(m)
            }
        }
    }

    /// Returns true for integral counting metrics.
    #[must_use]
    pub fn is_count(&self) -> bool {
        matches!(self, Self::RecordCount | Self::Count(_))
    }

    /// Parses a canonical metric name.
    ///
    /// # Errors
    ///
    /// Returns `TemporaError::InvalidMetric` for unrecognized names.
    pub fn parse(s: &str) -> TemporaResult<Self> {
        let text = s.trim();
        if matches!(text, "records" | "record_count" | "size") {
            return Ok(Self::RecordCount);
        }

        let (func, rest) = text
            .split_once('(')
            .ok_or_else(|| TemporaError::invalid_metric(s, "expected func(measure)"))?;
        let measure = rest
            .strip_suffix(')')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .ok_or_else(|| TemporaError::invalid_metric(s, "expected func(measure)"))?
            .to_string();

        match func.trim().to_lowercase().as_str() {
            "count" => Ok(Self::Count(measure)),
            "sum" => Ok(Self::Sum(measure)),
            "mean" | "avg" => Ok(Self::Mean(measure)),
            "min" => Ok(Self::Min(measure)),
            "max" => Ok(Self::Max(measure)),
            other => Err(TemporaError::invalid_metric(
                s,
                format!("unknown function '{other}'"),
            )),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for Metric {
    type Err = TemporaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Metric {
    type Error = TemporaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Metric> for String {
    fn from(metric: Metric) -> Self {
        metric.name()
    }
}
