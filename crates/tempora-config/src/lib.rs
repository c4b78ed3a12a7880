//! Tempora View Configuration
//!
//! This crate describes dashboard views declaratively and evaluates them
//! with the Tempora engine. A view names a record source and its schema,
//! the time selection (window, granularity, reference instant, week ending,
//! record filter) and the outputs computed from the selected records.
//!
//! # Features
//!
//! - **Views**: pivots, ratio series, chart series, frequency rankings,
//!   whole-window summaries and correlation matrices, each optionally
//!   restricted by its own record filter
//! - **Validation**: every metric and dimension a view names is checked
//!   against its schema before the view is registered
//! - **Documents**: views load from TOML (`[[views]]`) or JSON (`views`)
//! - **Standard Views**: built-in read-only views for the recruitment dashboard
//!
//! # Example
//!
//! ```rust
//! use tempora_config::{ConfigManager, SeriesSpec, ViewConfig};
//! use tempora_core::types::{Granularity, RecordSchema};
//! use tempora_core::window::TimeWindow;
//!
//! let manager = ConfigManager::new();
//!
//! // Switch a standard view to the weekly window
//! let weekly = manager.get_with_window("overview", TimeWindow::Last12Weeks).unwrap();
//! assert_eq!(weekly.pipeline_config().granularity, Granularity::Week);
//!
//! // Register a custom view
//! let schema = RecordSchema::new("DATE_DAY").with_dimension("SOURCE");
//! let view = ViewConfig::new("leads", "leads.csv", schema)
//!     .with_series(SeriesSpec::new("by_source", ["records"]).by("SOURCE"));
//! manager.register(view).unwrap();
//! ```
//!
//! # Standard Views
//!
//! - `overview` - score trends, lead counts, test completion, source mix
//! - `candidate_info` - top campaigns, sources, managers and folders
//! - `failure_reasons` - counts and average scores per failure reason
//! - `cefr_dive` - CEFR distribution and score range for scored candidates
//! - `hm_actions` - hiring-manager moves and rejection percentage
//! - `talkscore_analysis` - rejection reasons and score correlations

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod evaluate;
mod manager;
mod view;

// Re-export core types
pub use error::{ConfigError, ConfigResult, Validate, ValidationError};
pub use evaluate::{
    NamedCorrelation, NamedPivot, NamedRanking, NamedSeries, NamedSummary, ViewOutput,
};
pub use manager::{ConfigManager, DocumentFormat, ViewDocument};
pub use view::{
    CorrelationSpec, PivotSpec, RankingSpec, RatioSpec, SeriesSpec, SummaryRatioSpec,
    SummarySpec, ViewConfig,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{ConfigError, ConfigResult, Validate};
    pub use crate::evaluate::ViewOutput;
    pub use crate::manager::ConfigManager;
    pub use crate::view::{
        CorrelationSpec, PivotSpec, RankingSpec, RatioSpec, SeriesSpec, SummarySpec, ViewConfig,
    };
}
