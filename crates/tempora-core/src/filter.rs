//! Declarative record predicates applied before bucketing.

use serde::{Deserialize, Serialize};

use crate::error::TemporaResult;
use crate::types::{Record, RecordSchema};

/// A predicate over records, expressed by column name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecordFilter {
    /// Keeps records whose measure is present and strictly above `threshold`.
    MeasureGreaterThan {
        /// Measure column.
        measure: String,
        /// Exclusive lower bound.
        threshold: f64,
    },
    /// Keeps records whose dimension equals `value`.
    DimensionEquals {
        /// Dimension column.
        dimension: String,
        /// Required value.
        value: String,
    },
    /// Keeps records whose dimension is one of `values`.
    DimensionIn {
        /// Dimension column.
        dimension: String,
        /// Accepted values.
        values: Vec<String>,
    },
    /// Keeps records matching every inner filter.
    All {
        /// Inner filters.
        filters: Vec<RecordFilter>,
    },
}

impl RecordFilter {
    /// Keeps records with `measure > threshold`.
    #[must_use]
    pub fn measure_above(measure: impl Into<String>, threshold: f64) -> Self {
        Self::MeasureGreaterThan {
            measure: measure.into(),
            threshold,
        }
    }

    /// Keeps records with `dimension == value`.
    #[must_use]
    pub fn dimension_equals(dimension: impl Into<String>, value: impl Into<String>) -> Self {
        Self::DimensionEquals {
            dimension: dimension.into(),
            value: value.into(),
        }
    }

    /// Resolves column names against `schema`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownMeasure` or `UnknownDimension` for names not in the schema.
    pub fn compile(&self, schema: &RecordSchema) -> TemporaResult<CompiledFilter> {
        Ok(match self {
            Self::MeasureGreaterThan { measure, threshold } => CompiledFilter::MeasureAbove {
                index: schema.measure_index(measure)?,
                threshold: *threshold,
            },
            Self::DimensionEquals { dimension, value } => CompiledFilter::DimensionIn {
                index: schema.dimension_index(dimension)?,
                values: vec![value.clone()],
            },
            Self::DimensionIn { dimension, values } => CompiledFilter::DimensionIn {
                index: schema.dimension_index(dimension)?,
                values: values.clone(),
            },
            Self::All { filters } => CompiledFilter::All(
                filters
                    .iter()
                    .map(|f| f.compile(schema))
                    .collect::<TemporaResult<Vec<_>>>()?,
            ),
        })
    }
}

/// A filter with column names resolved to record positions.
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledFilter {
    /// Measure at `index` present and above `threshold`.
    MeasureAbove {
        /// Measure position.
        index: usize,
        /// Exclusive lower bound.
        threshold: f64,
    },
    /// Dimension at `index` present and one of `values`.
    DimensionIn {
        /// Dimension position.
        index: usize,
        /// Accepted values.
        values: Vec<String>,
    },
    /// Conjunction.
    All(Vec<CompiledFilter>),
}

impl CompiledFilter {
    /// Returns true if `record` passes the filter.
    #[must_use]
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Self::MeasureAbove { index, threshold } => {
                record.measure(*index).is_some_and(|v| v > *threshold)
            }
            Self::DimensionIn { index, values } => record
                .dimension(*index)
                .is_some_and(|v| values.iter().any(|accepted| accepted == v)),
            Self::All(filters) => filters.iter().all(|f| f.matches(record)),
        }
    }
}
