//! Record source abstraction.
//!
//! The engine never reads files itself. Adapters implement [`RecordSource`]
//! and hand the pipeline a validated [`RecordSet`].

use std::sync::Arc;

use crate::error::TemporaResult;
use crate::types::RecordSet;

/// Something that can produce a record set.
pub trait RecordSource: Send + Sync {
    /// Stable identity of the source, used as a cache key.
    fn source_id(&self) -> &str;

    /// Loads every record.
    ///
    /// # Errors
    ///
    /// Returns `TemporaError::SourceLoad` if the source cannot be read and
    /// `TemporaError::Schema` if it lacks a declared column.
    fn load(&self) -> TemporaResult<RecordSet>;
}

/// A source over an already materialized record set.
#[derive(Debug, Clone)]
pub struct InMemorySource {
    id: String,
    records: Arc<RecordSet>,
}

impl InMemorySource {
    /// Wraps `records` under the identity `id`.
    pub fn new(id: impl Into<String>, records: RecordSet) -> Self {
        Self {
            id: id.into(),
            records: Arc::new(records),
        }
    }
}

impl RecordSource for InMemorySource {
    fn source_id(&self) -> &str {
        &self.id
    }

    fn load(&self) -> TemporaResult<RecordSet> {
        Ok(self.records.as_ref().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Record, RecordSchema};

    #[test]
    fn test_in_memory_source() {
        let schema = RecordSchema::new("DATE_DAY").with_dimension("SITE");
        let set = RecordSet::new(
            schema,
            vec![Record::new("2024-01-01", vec![Some("A".into())], vec![])],
        )
        .unwrap();
        let source = InMemorySource::new("memory", set.clone());
        assert_eq!(source.source_id(), "memory");
        assert_eq!(source.load().unwrap(), set);
    }
}
