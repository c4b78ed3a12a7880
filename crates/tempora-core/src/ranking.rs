//! Top-N frequency ranking of a dimension.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::TemporaResult;
use crate::types::{Record, RecordSchema};

/// Occurrences of one dimension value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    /// Dimension value.
    pub value: String,
    /// Number of records carrying it.
    pub count: usize,
}

/// Counts the values of `dimension`, most frequent first.
///
/// Ties are broken by value ascending. Absent values are not ranked.
/// At most `limit` entries are returned.
///
/// # Errors
///
/// Returns `TemporaError::UnknownDimension` if the dimension is not in the schema.
pub fn top_categories<'a, I>(
    records: I,
    schema: &RecordSchema,
    dimension: &str,
    limit: usize,
) -> TemporaResult<Vec<CategoryCount>>
where
    I: IntoIterator<Item = &'a Record>,
{
    let index = schema.dimension_index(dimension)?;

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for record in records {
        if let Some(value) = record.dimension(index) {
            *counts.entry(value).or_default() += 1;
        }
    }

    let mut ranked: Vec<CategoryCount> = counts
        .into_iter()
        .map(|(value, count)| CategoryCount {
            value: value.to_string(),
            count,
        })
        .collect();
    // stable sort keeps the BTreeMap's value order among ties
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(limit);
    Ok(ranked)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_categories() {
        let schema = RecordSchema::new("DATE_DAY").with_dimension("CAMPAIGN_TITLE");
        let records: Vec<Record> = [Some("b"), Some("a"), None, Some("c"), Some("b"), Some("a"), Some("d")]
            .iter()
            .map(|v| Record::new("2024-01-01", vec![v.map(String::from)], vec![]))
            .collect();

        let top = top_categories(&records, &schema, "CAMPAIGN_TITLE", 3).unwrap();
        let got: Vec<_> = top.iter().map(|c| (c.value.as_str(), c.count)).collect();
        assert_eq!(got, vec![("a", 2), ("b", 2), ("c", 1)]);

        assert!(top_categories(&records, &schema, "CAMPAIGN_TITLE", 0)
            .unwrap()
            .is_empty());
        assert!(top_categories(&records, &schema, "SOURCE", 10).is_err());
    }
}
