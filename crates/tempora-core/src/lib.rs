//! # Tempora Core
//!
//! Time-bucketing and pivot aggregation for timestamped record sets.
//!
//! This crate turns raw records into period-bucketed statistics and reshapes
//! them into chronologically ordered comparison tables:
//!
//! - **Types**: `Timestamp`, `Granularity`, `PeriodKey`, record schemas and sets
//! - **Bucketing**: day, week-ending and month buckets
//! - **Windows**: rolling windows measured back from one reference instant
//! - **Aggregation**: null-aware count/sum/mean/min/max per (period, category)
//! - **Ratios**: percentages with safe-divide semantics
//! - **Pivots and series**: wide tables and long-form chart series
//! - **Summaries**: whole-window tables, scorecards and measure correlations
//! - **Transforms**: regex rewrites of dimension values
//! - **Sources**: the `RecordSource` seam implemented by loader crates
//!
//! ## Example
//!
//! ```rust
//! use tempora_core::prelude::*;
//!
//! let schema = RecordSchema::new("DATE_DAY")
//!     .with_dimension("CAMP_SITE")
//!     .with_measure("VOC");
//! let records = vec![
//!     Record::new("2024-01-05", vec![Some("A".into())], vec![Some(10.0)]),
//!     Record::new("2024-02-10", vec![Some("B".into())], vec![Some(8.0)]),
//! ];
//! let set = RecordSet::new(schema, records).unwrap();
//!
//! let config = PipelineConfig::new(TimeWindow::AllTime);
//! let request = AggregateRequest::new().with_measure("VOC").group_by("CAMP_SITE");
//! let output = Pipeline::run(&set, &config, &request).unwrap();
//!
//! let table = PivotReshaper::new()
//!     .reshape(output.aggregates.by_dimension("CAMP_SITE").unwrap(), &[Metric::mean("VOC")])
//!     .unwrap();
//! assert_eq!(table.row_labels(), vec!["A", "B"]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]

pub mod aggregate;
pub mod bucketing;
pub mod correlation;
pub mod error;
pub mod filter;
pub mod format;
pub mod pipeline;
pub mod pivot;
pub mod ranking;
pub mod ratio;
pub mod series;
pub mod source;
pub mod summary;
pub mod transform;
pub mod types;
pub mod window;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::aggregate::{
        AggregateRequest, AggregateRow, AggregateSet, Aggregator, CategoryKey,
        GroupedAggregates, GroupedSummary, Grouping, MeasureStats, SummaryRow,
    };
    pub use crate::bucketing::PeriodBucketer;
    pub use crate::correlation::{correlate, CorrelationMatrix};
    pub use crate::error::{TemporaError, TemporaResult};
    pub use crate::filter::RecordFilter;
    pub use crate::pipeline::{Pipeline, PipelineConfig, PipelineOutput, RunReport};
    pub use crate::pivot::{Cell, PivotReshaper, PivotTable};
    pub use crate::ranking::{top_categories, CategoryCount};
    pub use crate::ratio::{DenominatorScope, RatioComputer, RatioPoint};
    pub use crate::series::{SeriesBuilder, SeriesPoint};
    pub use crate::source::{InMemorySource, RecordSource};
    pub use crate::summary::{SummaryBuilder, SummaryRatio, SummaryTable};
    pub use crate::transform::{apply_rewrites, DimensionRewrite};
    pub use crate::types::{
        Date, Granularity, Metric, PeriodKey, Record, RecordSchema, RecordSet, Timestamp,
    };
    pub use crate::window::{ReferenceInstant, TimeWindow, TimeWindowSelector};
}

// Re-export commonly used types at crate root
pub use error::{TemporaError, TemporaResult};
pub use types::{Granularity, Metric, PeriodKey, Timestamp};
