//! Dimension rewrites applied to a record set before any selection.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

use crate::error::{TemporaError, TemporaResult};
use crate::types::{RecordSchema, RecordSet};

/// Pattern that strips a `+tag` from the local part of an e-mail address.
pub const PLUS_TAG_PATTERN: &str = r"\+.*?@";

/// Replaces every match of `pattern` in one dimension with `replacement`.
///
/// Absent values stay absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionRewrite {
    /// Dimension column.
    pub dimension: String,
    /// Regular expression.
    pub pattern: String,
    /// Replacement text; `$1`-style group references are expanded.
    pub replacement: String,
}

impl DimensionRewrite {
    /// Creates a rewrite.
    #[must_use]
    pub fn new(
        dimension: impl Into<String>,
        pattern: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Self {
        Self {
            dimension: dimension.into(),
            pattern: pattern.into(),
            replacement: replacement.into(),
        }
    }

    /// Normalizes `user+tag@host` to `user@host`.
    #[must_use]
    pub fn strip_plus_tag(dimension: impl Into<String>) -> Self {
        Self::new(dimension, PLUS_TAG_PATTERN, "@")
    }

    /// Resolves the dimension and compiles the pattern.
    ///
    /// # Errors
    ///
    /// Returns `UnknownDimension` for a dimension not in the schema, or
    /// `InvalidRequest` if the pattern does not compile.
    pub fn compile(&self, schema: &RecordSchema) -> TemporaResult<CompiledRewrite> {
        let index = schema.dimension_index(&self.dimension)?;
        let regex = Regex::new(&self.pattern).map_err(|e| {
            TemporaError::invalid_request(format!(
                "invalid pattern for '{}': {e}",
                self.dimension
            ))
        })?;
        Ok(CompiledRewrite {
            index,
            regex,
            replacement: self.replacement.clone(),
        })
    }
}

/// A rewrite with its dimension resolved and its pattern compiled.
#[derive(Debug, Clone)]
pub struct CompiledRewrite {
    index: usize,
    regex: Regex,
    replacement: String,
}

impl CompiledRewrite {
    /// Dimension position.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Rewrites one value.
    #[must_use]
    pub fn rewrite<'a>(&self, value: &'a str) -> Cow<'a, str> {
        self.regex.replace_all(value, self.replacement.as_str())
    }
}

/// Applies `rewrites` in order, returning the input unchanged if there are none.
///
/// # Errors
///
/// Returns the first compile error; no record is touched in that case.
pub fn apply_rewrites<'a>(
    set: &'a RecordSet,
    rewrites: &[DimensionRewrite],
) -> TemporaResult<Cow<'a, RecordSet>> {
    if rewrites.is_empty() {
        return Ok(Cow::Borrowed(set));
    }
    let compiled = rewrites
        .iter()
        .map(|r| r.compile(set.schema()))
        .collect::<TemporaResult<Vec<_>>>()?;

    let (schema, mut records) = set.clone().into_parts();
    let mut changed = 0usize;
    for record in &mut records {
        for rewrite in &compiled {
            let rewritten = match record.dimension(rewrite.index).map(|v| rewrite.rewrite(v)) {
                Some(Cow::Owned(new)) => new,
                _ => continue,
            };
            record.set_dimension(rewrite.index, Some(rewritten));
            changed += 1;
        }
    }
    tracing::debug!(rewrites = compiled.len(), changed, "Rewrote dimension values");
    RecordSet::new(schema, records).map(Cow::Owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Record;

    fn movers(emails: &[Option<&str>]) -> RecordSet {
        let schema = RecordSchema::new("DATE_DAY").with_dimension("MOVER_EMAIL");
        let records = emails
            .iter()
            .map(|e| Record::new("2024-01-05", vec![e.map(String::from)], vec![]))
            .collect();
        RecordSet::new(schema, records).unwrap()
    }

    #[test]
    fn test_strip_plus_tag() {
        let set = movers(&[
            Some("ana+hm@acme.com"),
            Some("ana@acme.com"),
            Some("bo+a+b@acme.com"),
            None,
        ]);
        let rewritten = apply_rewrites(&set, &[DimensionRewrite::strip_plus_tag("MOVER_EMAIL")])
            .unwrap();
        let values: Vec<_> = rewritten.records().iter().map(|r| r.dimension(0)).collect();
        assert_eq!(
            values,
            vec![
                Some("ana@acme.com"),
                Some("ana@acme.com"),
                Some("bo@acme.com"),
                None
            ]
        );
    }

    #[test]
    fn test_no_rewrites_borrows() {
        let set = movers(&[Some("x+y@z")]);
        assert!(matches!(apply_rewrites(&set, &[]).unwrap(), Cow::Borrowed(_)));
    }

    #[test]
    fn test_compile_errors() {
        let set = movers(&[]);
        assert!(matches!(
            apply_rewrites(&set, &[DimensionRewrite::strip_plus_tag("EMAIL")]),
            Err(TemporaError::UnknownDimension { .. })
        ));
        assert!(matches!(
            apply_rewrites(&set, &[DimensionRewrite::new("MOVER_EMAIL", "(", "")]),
            Err(TemporaError::InvalidRequest { .. })
        ));
    }
}
