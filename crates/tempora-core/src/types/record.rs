//! Records, record schemas and record sets.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{TemporaError, TemporaResult};

/// Declares which columns of a tabular source play which role.
///
/// The source is not self-describing: the caller names the timestamp column,
/// the categorical dimensions and the numeric measures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSchema {
    /// Timestamp column name.
    pub timestamp: String,

    /// Dimension column names, in record order.
    #[serde(default)]
    pub dimensions: Vec<String>,

    /// Measure column names, in record order.
    #[serde(default)]
    pub measures: Vec<String>,
}

impl RecordSchema {
    /// Creates a schema with only a timestamp column.
    #[must_use]
    pub fn new(timestamp: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            dimensions: Vec::new(),
            measures: Vec::new(),
        }
    }

    /// Adds a dimension column.
    #[must_use]
    pub fn with_dimension(mut self, name: impl Into<String>) -> Self {
        self.dimensions.push(name.into());
        self
    }

    /// Adds a measure column.
    #[must_use]
    pub fn with_measure(mut self, name: impl Into<String>) -> Self {
        self.measures.push(name.into());
        self
    }

    /// Adds several measure columns.
    #[must_use]
    pub fn with_measures<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.measures.extend(names.into_iter().map(Into::into));
        self
    }

    /// Returns the position of a measure.
    ///
    /// # Errors
    ///
    /// Returns `TemporaError::UnknownMeasure` if the schema has no such measure.
    pub fn measure_index(&self, name: &str) -> TemporaResult<usize> {
        self.measures
            .iter()
            .position(|m| m == name)
            .ok_or_else(|| TemporaError::unknown_measure(name))
    }

    /// Returns the position of a dimension.
    ///
    /// # Errors
    ///
    /// Returns `TemporaError::UnknownDimension` if the schema has no such dimension.
    pub fn dimension_index(&self, name: &str) -> TemporaResult<usize> {
        self.dimensions
            .iter()
            .position(|d| d == name)
            .ok_or_else(|| TemporaError::unknown_dimension(name))
    }

    /// All declared column names: timestamp, dimensions, then measures.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.timestamp.as_str())
            .chain(self.dimensions.iter().map(String::as_str))
            .chain(self.measures.iter().map(String::as_str))
    }

    /// Checks that no column is declared twice.
    ///
    /// # Errors
    ///
    /// Returns `TemporaError::Schema` naming the first duplicate.
    pub fn validate(&self) -> TemporaResult<()> {
        if self.timestamp.trim().is_empty() {
            return Err(TemporaError::schema("", "timestamp column name is empty"));
        }
        let mut seen = HashSet::new();
        for column in self.columns() {
            if !seen.insert(column) {
                return Err(TemporaError::schema(column, "declared more than once"));
            }
        }
        Ok(())
    }
}

/// A single raw record.
///
/// The timestamp is kept as loaded; parsing happens in the pipeline so that a
/// bad value drops only its own record. Absent measures stay `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    timestamp: String,
    dimensions: Vec<Option<String>>,
    measures: Vec<Option<f64>>,
}

impl Record {
    /// Creates a record. Non-finite measure values are stored as absent.
    #[must_use]
    pub fn new(
        timestamp: impl Into<String>,
        dimensions: Vec<Option<String>>,
        measures: Vec<Option<f64>>,
    ) -> Self {
        Self {
            timestamp: timestamp.into(),
            dimensions,
            measures: measures
                .into_iter()
                .map(|v| v.filter(|x| x.is_finite()))
                .collect(),
        }
    }

    /// Returns the raw timestamp text.
    #[must_use]
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// Returns a dimension value by position.
    #[must_use]
    pub fn dimension(&self, index: usize) -> Option<&str> {
        self.dimensions.get(index).and_then(|v| v.as_deref())
    }

    /// Returns a measure value by position.
    #[must_use]
    pub fn measure(&self, index: usize) -> Option<f64> {
        self.measures.get(index).copied().flatten()
    }

    /// Replaces a dimension value. Out-of-range positions are ignored.
    pub fn set_dimension(&mut self, index: usize, value: Option<String>) {
        if let Some(slot) = self.dimensions.get_mut(index) {
            *slot = value;
        }
    }
}

/// An immutable, schema-checked collection of records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSet {
    schema: RecordSchema,
    records: Vec<Record>,
}

impl RecordSet {
    /// Creates a record set, checking every record against the schema arity.
    ///
    /// # Errors
    ///
    /// Returns `TemporaError::Schema` if the schema is inconsistent or a record
    /// has the wrong number of dimension or measure fields.
    pub fn new(schema: RecordSchema, records: Vec<Record>) -> TemporaResult<Self> {
        schema.validate()?;
        for (row, record) in records.iter().enumerate() {
            if record.dimensions.len() != schema.dimensions.len() {
                return Err(TemporaError::schema(
                    schema.dimensions.join(","),
                    format!(
                        "row {row} has {} dimension values, expected {}",
                        record.dimensions.len(),
                        schema.dimensions.len()
                    ),
                ));
            }
            if record.measures.len() != schema.measures.len() {
                return Err(TemporaError::schema(
                    schema.measures.join(","),
                    format!(
                        "row {row} has {} measure values, expected {}",
                        record.measures.len(),
                        schema.measures.len()
                    ),
                ));
            }
        }
        Ok(Self { schema, records })
    }

    /// Creates an empty record set.
    ///
    /// # Errors
    ///
    /// Returns `TemporaError::Schema` if the schema is inconsistent.
    pub fn empty(schema: RecordSchema) -> TemporaResult<Self> {
        Self::new(schema, Vec::new())
    }

    /// Returns the schema.
    #[must_use]
    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }

    /// Returns the records.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Consumes the set, returning its schema and records.
    #[must_use]
    pub fn into_parts(self) -> (RecordSchema, Vec<Record>) {
        (self.schema, self.records)
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if there are no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> RecordSchema {
        RecordSchema::new("DATE_DAY")
            .with_dimension("CAMP_SITE")
            .with_measures(["TALKSCORE_OVERALL", "TEST_COMPLETED"])
    }

    #[test]
    fn test_lookup() {
        let schema = schema();
        assert_eq!(schema.dimension_index("CAMP_SITE").unwrap(), 0);
        assert_eq!(schema.measure_index("TEST_COMPLETED").unwrap(), 1);
        assert!(matches!(
            schema.measure_index("VOC"),
            Err(TemporaError::UnknownMeasure { .. })
        ));
        assert!(matches!(
            schema.dimension_index("CEFR"),
            Err(TemporaError::UnknownDimension { .. })
        ));
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let schema = RecordSchema::new("DATE_DAY")
            .with_measure("VOC")
            .with_dimension("VOC");
        assert!(matches!(schema.validate(), Err(TemporaError::Schema { .. })));
    }

    #[test]
    fn test_non_finite_measures_become_absent() {
        let record = Record::new(
            "2024-01-05",
            vec![Some("A".into())],
            vec![Some(f64::NAN), Some(f64::INFINITY)],
        );
        assert_eq!(record.measure(0), None);
        assert_eq!(record.measure(1), None);
    }

    #[test]
    fn test_arity_checked() {
        let bad = Record::new("2024-01-05", vec![], vec![Some(1.0), None]);
        assert!(RecordSet::new(schema(), vec![bad]).is_err());

        let good = Record::new("2024-01-05", vec![None], vec![Some(1.0), None]);
        let set = RecordSet::new(schema(), vec![good]).unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.records()[0].dimension(0), None);
    }
}
