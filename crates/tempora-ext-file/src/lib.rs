//! # Tempora Ext File
//!
//! File-based record sources for the Tempora engine.
//!
//! - CSV record source validated against a declared [`RecordSchema`]
//! - Raw-record cache keyed by source identity and load version
//!
//! ```no_run
//! use tempora_core::types::RecordSchema;
//! use tempora_ext_file::{CsvRecordSource, RecordCache};
//!
//! let schema = RecordSchema::new("DATE_DAY").with_dimension("CAMP_SITE");
//! let source = CsvRecordSource::new("data/TP_raw_data1.csv", schema);
//!
//! let cache = RecordCache::new();
//! let records = cache.get_or_load(&source).unwrap();
//! println!("{} records", records.len());
//! ```
//!
//! [`RecordSchema`]: tempora_core::types::RecordSchema

#![warn(missing_docs)]
#![warn(clippy::all)]

mod cache;
mod csv_source;

pub use cache::*;
pub use csv_source::*;

use std::path::Path;

use tempora_core::types::RecordSchema;

/// Create a CSV source for `file_name` resolved against `data_dir`.
pub fn create_csv_source(
    data_dir: impl AsRef<Path>,
    file_name: &str,
    schema: RecordSchema,
) -> CsvRecordSource {
    CsvRecordSource::new(data_dir.as_ref().join(file_name), schema)
}
