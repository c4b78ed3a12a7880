//! Error types for the Tempora engine.
//!
//! Load and schema errors are fatal to a view. Timestamp parse errors are
//! per-record and are collected by the pipeline instead of aborting it.
//! Contract errors (unknown measures, dimensions or metrics) abort the run.

use thiserror::Error;

/// A specialized Result type for Tempora operations.
pub type TemporaResult<T> = Result<T, TemporaError>;

/// The main error type for Tempora operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemporaError {
    /// The record source could not be read.
    #[error("Failed to load source '{source_id}': {reason}")]
    SourceLoad {
        /// Identity of the source (usually a path).
        source_id: String,
        /// Description of the failure.
        reason: String,
    },

    /// A declared column is missing or the schema is inconsistent.
    #[error("Schema error on column '{column}': {reason}")]
    Schema {
        /// The offending column.
        column: String,
        /// Description of the problem.
        reason: String,
    },

    /// A timestamp could not be parsed.
    #[error("Cannot parse timestamp: '{value}'")]
    TimestampParse {
        /// The raw text that failed to parse.
        value: String,
    },

    /// A measure name is not part of the schema or the aggregates.
    #[error("Unknown measure: {name}")]
    UnknownMeasure {
        /// The requested measure.
        name: String,
    },

    /// A dimension name is not part of the schema or the grouping.
    #[error("Unknown dimension: {name}")]
    UnknownDimension {
        /// The requested dimension.
        name: String,
    },

    /// A metric could not be resolved.
    #[error("Invalid metric '{metric}': {reason}")]
    InvalidMetric {
        /// The metric as written.
        metric: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A request was structurally invalid.
    #[error("Invalid request: {reason}")]
    InvalidRequest {
        /// Description of what's invalid.
        reason: String,
    },
}

impl TemporaError {
    /// Creates a source load error.
    #[must_use]
    pub fn source_load(source_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SourceLoad {
            source_id: source_id.into(),
            reason: reason.into(),
        }
    }

    /// Creates a schema error.
    #[must_use]
    pub fn schema(column: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Schema {
            column: column.into(),
            reason: reason.into(),
        }
    }

    /// Creates a timestamp parse error.
    #[must_use]
    pub fn timestamp_parse(value: impl Into<String>) -> Self {
        Self::TimestampParse {
            value: value.into(),
        }
    }

    /// Creates an unknown measure error.
    #[must_use]
    pub fn unknown_measure(name: impl Into<String>) -> Self {
        Self::UnknownMeasure { name: name.into() }
    }

    /// Creates an unknown dimension error.
    #[must_use]
    pub fn unknown_dimension(name: impl Into<String>) -> Self {
        Self::UnknownDimension { name: name.into() }
    }

    /// Creates an invalid metric error.
    #[must_use]
    pub fn invalid_metric(metric: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidMetric {
            metric: metric.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid request error.
    #[must_use]
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// Returns true for errors that stop a view before any computation.
    #[must_use]
    pub fn is_fatal_load(&self) -> bool {
        matches!(self, Self::SourceLoad { .. } | Self::Schema { .. })
    }

    /// Returns true for programmer/contract errors.
    #[must_use]
    pub fn is_contract(&self) -> bool {
        matches!(
            self,
            Self::UnknownMeasure { .. }
                | Self::UnknownDimension { .. }
                | Self::InvalidMetric { .. }
                | Self::InvalidRequest { .. }
        )
    }
}
