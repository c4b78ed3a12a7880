//! Core types for the Tempora engine.
//!
//! This module provides the fundamental data types:
//!
//! - [`Date`] and [`Timestamp`]: calendar dates and parsed instants
//! - [`Granularity`] and [`PeriodKey`]: bucket resolution and bucket identity
//! - [`RecordSchema`], [`Record`], [`RecordSet`]: the raw input
//! - [`Metric`]: named statistics read from aggregates

mod date;
mod granularity;
mod metric;
mod period;
mod record;
mod timestamp;

pub use date::*;
pub use granularity::*;
pub use metric::*;
pub use period::*;
pub use record::*;
pub use timestamp::*;
