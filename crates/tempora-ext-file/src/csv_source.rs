//! CSV record source.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use tempora_core::error::{TemporaError, TemporaResult};
use tempora_core::source::RecordSource;
use tempora_core::types::{Record, RecordSchema, RecordSet};

// =============================================================================
// CELL PARSING
// =============================================================================

/// Cell spellings read as an absent value.
const ABSENT_MARKERS: [&str; 4] = ["", "nan", "null", "none"];

/// Parses a measure cell.
///
/// Absent markers (empty, `nan`, `null`, `None`, any case) are `None`.
/// Boolean cells (`t`, `true`, `f`, `false`, any case) read as 1 and 0.
/// Anything else must parse as a float, otherwise it is `None`.
pub fn parse_measure(cell: &str) -> Option<f64> {
    if is_absent_marker(cell) {
        return None;
    }
    let cell = cell.trim();
    match cell.to_ascii_lowercase().as_str() {
        "t" | "true" => Some(1.0),
        "f" | "false" => Some(0.0),
        _ => cell.parse::<f64>().ok().filter(|v| v.is_finite()),
    }
}

fn is_absent_marker(cell: &str) -> bool {
    ABSENT_MARKERS.contains(&cell.trim().to_ascii_lowercase().as_str())
}

/// Parses a dimension cell: trimmed text, empty is absent.
pub fn parse_dimension(cell: &str) -> Option<String> {
    let cell = cell.trim();
    (!cell.is_empty()).then(|| cell.to_string())
}

// =============================================================================
// CSV RECORD SOURCE
// =============================================================================

/// CSV-backed record source with a declared schema.
#[derive(Debug, Clone)]
pub struct CsvRecordSource {
    file_path: PathBuf,
    source_id: String,
    schema: RecordSchema,
    delimiter: u8,
}

impl CsvRecordSource {
    /// Create a new CSV record source. Nothing is read until [`load`].
    ///
    /// [`load`]: RecordSource::load
    pub fn new(file_path: impl AsRef<Path>, schema: RecordSchema) -> Self {
        let file_path = file_path.as_ref().to_path_buf();
        Self {
            source_id: file_path.display().to_string(),
            file_path,
            schema,
            delimiter: b',',
        }
    }

    /// Overrides the field delimiter.
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// File read by this source.
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Declared schema.
    pub fn schema(&self) -> &RecordSchema {
        &self.schema
    }
}

impl RecordSource for CsvRecordSource {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn load(&self) -> TemporaResult<RecordSet> {
        let file = File::open(&self.file_path)
            .map_err(|e| TemporaError::source_load(&self.source_id, e.to_string()))?;
        let set = read_records(file, &self.schema, &self.source_id, self.delimiter)?;
        tracing::info!(source = %self.source_id, records = set.len(), "Loaded CSV source");
        Ok(set)
    }
}

/// Column positions of the schema within a CSV header.
struct ColumnMap {
    timestamp: usize,
    dimensions: Vec<usize>,
    measures: Vec<usize>,
}

impl ColumnMap {
    fn resolve(header: &csv::StringRecord, schema: &RecordSchema) -> TemporaResult<Self> {
        let position = |column: &str| {
            header
                .iter()
                .position(|h| h == column)
                .ok_or_else(|| TemporaError::schema(column, "missing from CSV header"))
        };
        Ok(Self {
            timestamp: position(&schema.timestamp)?,
            dimensions: schema
                .dimensions
                .iter()
                .map(|d| position(d))
                .collect::<TemporaResult<_>>()?,
            measures: schema
                .measures
                .iter()
                .map(|m| position(m))
                .collect::<TemporaResult<_>>()?,
        })
    }
}

/// Reads CSV text, checking the header against `schema` before any row.
///
/// # Errors
///
/// Returns `TemporaError::Schema` if a declared column is missing from the
/// header and `TemporaError::SourceLoad` if the CSV is malformed.
pub fn read_records<R: Read>(
    reader: R,
    schema: &RecordSchema,
    source_id: &str,
    delimiter: u8,
) -> TemporaResult<RecordSet> {
    schema.validate()?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .trim(csv::Trim::Headers)
        .flexible(true)
        .from_reader(reader);

    let header = reader
        .headers()
        .map_err(|e| TemporaError::source_load(source_id, e.to_string()))?
        .clone();
    let columns = ColumnMap::resolve(&header, schema)?;

    let mut records = Vec::new();
    let mut unparseable = 0usize;
    for (row, result) in reader.records().enumerate() {
        let raw = result.map_err(|e| TemporaError::source_load(source_id, e.to_string()))?;
        let cell = |i: usize| raw.get(i).unwrap_or("");

        let dimensions = columns
            .dimensions
            .iter()
            .map(|&i| parse_dimension(cell(i)))
            .collect();
        let measures = columns
            .measures
            .iter()
            .zip(&schema.measures)
            .map(|(&i, name)| {
                let text = cell(i);
                let value = parse_measure(text);
                if value.is_none() && !is_absent_marker(text) {
                    unparseable += 1;
                    tracing::debug!(row, column = %name, value = text, "Unparseable measure cell");
                }
                value
            })
            .collect();

        records.push(Record::new(cell(columns.timestamp).trim(), dimensions, measures));
    }

    if unparseable > 0 {
        tracing::debug!(
            source = source_id,
            count = unparseable,
            "Read unparseable measure cells as absent"
        );
    }

    RecordSet::new(schema.clone(), records)
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
    fn test_parse_measure() {
        assert_eq!(parse_measure("12.5"), Some(12.5));
        assert_eq!(parse_measure(" 7 "), Some(7.0));
        for absent in ["", "nan", "NaN", "null", "NULL", "None"] {
            assert_eq!(parse_measure(absent), None, "{absent}");
        }
        assert_eq!(parse_measure("True"), Some(1.0));
        assert_eq!(parse_measure("t"), Some(1.0));
        assert_eq!(parse_measure("FALSE"), Some(0.0));
        assert_eq!(parse_measure("f"), Some(0.0));
        assert_eq!(parse_measure("n/a"), None);
        assert_eq!(parse_measure("inf"), None);
    }

    #[test]
    fn test_parse_dimension() {
        assert_eq!(parse_dimension("  Manila "), Some("Manila".into()));
        assert_eq!(parse_dimension("   "), None);
    }

    #[test]
    fn test_read_records_reorders_columns() {
        let text = "TEST_COMPLETED,DATE_DAY,EXTRA,CAMP_SITE,TALKSCORE_OVERALL\n\
                    true,2024-01-05,x, Manila ,71\n\
                    f,2024-01-06,y,,\n";
        let set = read_records(text.as_bytes(), &schema(), "inline", b',').unwrap();

        assert_eq!(set.len(), 2);
        let first = &set.records()[0];
        assert_eq!(first.timestamp(), "2024-01-05");
        assert_eq!(first.dimension(0), Some("Manila"));
        assert_eq!(first.measure(0), Some(71.0));
        assert_eq!(first.measure(1), Some(1.0));

        let second = &set.records()[1];
        assert_eq!(second.dimension(0), None);
        assert_eq!(second.measure(0), None);
        assert_eq!(second.measure(1), Some(0.0));
    }

    #[test]
    fn test_missing_column_fails_before_rows() {
        // header check runs before the malformed row is reached
        let text = "DATE_DAY,CAMP_SITE\n2024-01-05,A\n\"unterminated";
        let err = read_records(text.as_bytes(), &schema(), "inline", b',').unwrap_err();
        assert!(matches!(err, TemporaError::Schema { ref column, .. } if column == "TALKSCORE_OVERALL"));
        assert!(err.is_fatal_load());
    }

    #[test]
    fn test_short_rows_read_as_absent() {
        let text = "DATE_DAY,CAMP_SITE,TALKSCORE_OVERALL,TEST_COMPLETED\n2024-01-05,A\n";
        let set = read_records(text.as_bytes(), &schema(), "inline", b',').unwrap();
        assert_eq!(set.records()[0].measure(0), None);
        assert_eq!(set.records()[0].dimension(0), Some("A"));
    }

    #[test]
    fn test_semicolon_delimiter() {
        let text = "DATE_DAY;CAMP_SITE;TALKSCORE_OVERALL;TEST_COMPLETED\n2024-01-05;A;3,5;1\n";
        let set = read_records(text.as_bytes(), &schema(), "inline", b';').unwrap();
        // comma decimals are not numbers
        assert_eq!(set.records()[0].measure(0), None);
        assert_eq!(set.records()[0].measure(1), Some(1.0));
    }

    #[test]
    fn test_missing_file() {
        let source = CsvRecordSource::new("/nonexistent/TP_raw_data1.csv", schema());
        assert!(matches!(
            source.load(),
            Err(TemporaError::SourceLoad { .. })
        ));
        assert_eq!(source.source_id(), "/nonexistent/TP_raw_data1.csv");
    }
}
