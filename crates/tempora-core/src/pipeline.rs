//! One pipeline execution: parse, window, filter, bucket, aggregate.
//!
//! Every input is an explicit value threaded through the call. Nothing
//! persists between runs, and the same record set with the same
//! configuration always serializes to the same bytes.

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::aggregate::{AggregateRequest, AggregateSet, Aggregator, GroupedSummary};
use crate::bucketing::{PeriodBucketer, DEFAULT_WEEK_ENDING};
use crate::error::TemporaResult;
use crate::filter::RecordFilter;
use crate::types::{Granularity, RecordSchema, RecordSet, Timestamp};
use crate::window::{ReferenceInstant, StampedRecord, TimeWindow, TimeWindowSelector};

// =============================================================================
// CONFIGURATION
// =============================================================================

fn default_week_ending() -> Weekday {
    DEFAULT_WEEK_ENDING
}

/// Parameters of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Rolling window.
    pub window: TimeWindow,
    /// Bucket granularity.
    pub granularity: Granularity,
    /// Source of the reference instant.
    #[serde(default)]
    pub reference: ReferenceInstant,
    /// Weekday on which weekly buckets end.
    #[serde(default = "default_week_ending")]
    pub week_ending: Weekday,
    /// Predicate applied after window selection.
    #[serde(default)]
    pub filter: Option<RecordFilter>,
}

impl PipelineConfig {
    /// Config for `window` at its default granularity, referenced on the
    /// dataset maximum.
    #[must_use]
    pub fn new(window: TimeWindow) -> Self {
        Self {
            window,
            granularity: window.default_granularity(),
            reference: ReferenceInstant::default(),
            week_ending: DEFAULT_WEEK_ENDING,
            filter: None,
        }
    }

    /// Overrides the granularity.
    #[must_use]
    pub fn with_granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = granularity;
        self
    }

    /// Sets the reference instant source.
    #[must_use]
    pub fn with_reference(mut self, reference: ReferenceInstant) -> Self {
        self.reference = reference;
        self
    }

    /// Sets the week-ending day.
    #[must_use]
    pub fn with_week_ending(mut self, weekday: Weekday) -> Self {
        self.week_ending = weekday;
        self
    }

    /// Sets the record filter.
    #[must_use]
    pub fn with_filter(mut self, filter: RecordFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Bucketer configured for this run.
    #[must_use]
    pub fn bucketer(&self) -> PeriodBucketer {
        PeriodBucketer::new().with_week_ending(self.week_ending)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new(TimeWindow::AllTime)
    }
}

// =============================================================================
// REPORT
// =============================================================================

/// A record whose timestamp could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseFailure {
    /// Row index in the record set.
    pub row: usize,
    /// Raw timestamp text.
    pub value: String,
}

/// Where every input record went.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Records in the input set.
    pub input: usize,
    /// Records excluded for an unparseable timestamp.
    pub parse_failures: Vec<ParseFailure>,
    /// Records outside the window.
    pub outside_window: usize,
    /// Records rejected by the record filter.
    pub filtered_out: usize,
    /// Records assigned to a bucket.
    pub bucketed: usize,
}

impl RunReport {
    /// Returns true if every input record is accounted for exactly once.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.bucketed + self.parse_failures.len() + self.outside_window + self.filtered_out
            == self.input
    }
}

// =============================================================================
// PIPELINE
// =============================================================================

/// Records that survived parsing, windowing and filtering.
#[derive(Debug, Clone)]
pub struct Selection<'a> {
    /// Resolved reference instant, `None` for an empty dataset.
    pub reference: Option<Timestamp>,
    /// Selected records in input order.
    pub records: Vec<StampedRecord<'a>>,
    /// Accounting so far; `bucketed` is the number of selected records.
    pub report: RunReport,
}

impl<'a> Selection<'a> {
    /// Selected records that also pass `filter`, in input order.
    ///
    /// # Errors
    ///
    /// Returns a contract error if the filter names an unknown column.
    pub fn subset(
        &self,
        filter: &RecordFilter,
        schema: &RecordSchema,
    ) -> TemporaResult<Vec<StampedRecord<'a>>> {
        let filter = filter.compile(schema)?;
        Ok(self
            .records
            .iter()
            .filter(|s| filter.matches(s.record))
            .copied()
            .collect())
    }
}

/// Output of [`Pipeline::run`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineOutput {
    /// Resolved reference instant.
    pub reference: Option<Timestamp>,
    /// Window applied.
    pub window: TimeWindow,
    /// Bucket granularity.
    pub granularity: Granularity,
    /// Aggregates per requested grouping.
    pub aggregates: AggregateSet,
    /// Record accounting.
    pub report: RunReport,
}

/// Stateless pipeline entry points.
#[derive(Debug, Clone, Copy, Default)]
pub struct Pipeline;

impl Pipeline {
    /// Parses timestamps, resolves the reference instant once, then applies
    /// the window and the record filter.
    ///
    /// # Errors
    ///
    /// Returns a contract error if the filter names an unknown column.
    /// Unparseable timestamps are reported, not raised.
    pub fn select<'a>(
        set: &'a RecordSet,
        config: &PipelineConfig,
    ) -> TemporaResult<Selection<'a>> {
        let filter = config
            .filter
            .as_ref()
            .map(|f| f.compile(set.schema()))
            .transpose()?;

        let mut report = RunReport {
            input: set.len(),
            ..RunReport::default()
        };

        let mut stamped = Vec::with_capacity(set.len());
        for (row, record) in set.records().iter().enumerate() {
            match Timestamp::parse(record.timestamp()) {
                Ok(timestamp) => stamped.push(StampedRecord {
                    row,
                    timestamp,
                    record,
                }),
                Err(_) => report.parse_failures.push(ParseFailure {
                    row,
                    value: record.timestamp().to_string(),
                }),
            }
        }
        if !report.parse_failures.is_empty() {
            tracing::warn!(
                count = report.parse_failures.len(),
                "Dropped records with unparseable timestamps"
            );
        }

        let reference = config.reference.resolve(stamped.iter().map(|s| s.timestamp));
        let selector = TimeWindowSelector::new(config.window, reference);
        let in_window = selector.select(&stamped);
        report.outside_window = stamped.len() - in_window.len();

        let records: Vec<StampedRecord<'a>> = match &filter {
            Some(filter) => in_window
                .into_iter()
                .filter(|s| filter.matches(s.record))
                .collect(),
            None => in_window,
        };
        report.filtered_out = stamped.len() - report.outside_window - records.len();
        report.bucketed = records.len();

        tracing::debug!(
            input = report.input,
            parse_failures = report.parse_failures.len(),
            outside_window = report.outside_window,
            filtered_out = report.filtered_out,
            selected = report.bucketed,
            window = %config.window,
            "Selected records"
        );

        Ok(Selection {
            reference,
            records,
            report,
        })
    }

    /// Runs the whole pipeline.
    ///
    /// Every name in `request` and in the filter is resolved before any record
    /// is touched.
    ///
    /// # Errors
    ///
    /// Returns `UnknownMeasure` or `UnknownDimension` for names not in the
    /// schema.
    pub fn run(
        set: &RecordSet,
        config: &PipelineConfig,
        request: &AggregateRequest,
    ) -> TemporaResult<PipelineOutput> {
        let aggregator = Aggregator::new(set.schema(), request, config.granularity)?;
        let selection = Self::select(set, config)?;
        let aggregates = Self::bucket_and_aggregate(&aggregator, &selection.records, config);

        Ok(PipelineOutput {
            reference: selection.reference,
            window: config.window,
            granularity: config.granularity,
            aggregates,
            report: selection.report,
        })
    }

    /// Buckets and aggregates records that were already selected.
    ///
    /// # Errors
    ///
    /// Returns `UnknownMeasure` or `UnknownDimension` for names not in the
    /// schema.
    pub fn aggregate(
        schema: &RecordSchema,
        records: &[StampedRecord<'_>],
        config: &PipelineConfig,
        request: &AggregateRequest,
    ) -> TemporaResult<AggregateSet> {
        let aggregator = Aggregator::new(schema, request, config.granularity)?;
        Ok(Self::bucket_and_aggregate(&aggregator, records, config))
    }

    /// Aggregates selected records over the whole window, without buckets.
    ///
    /// # Errors
    ///
    /// Returns `UnknownMeasure` or `UnknownDimension` for names not in the
    /// schema.
    pub fn summarize(
        schema: &RecordSchema,
        records: &[StampedRecord<'_>],
        request: &AggregateRequest,
    ) -> TemporaResult<Vec<GroupedSummary>> {
        // granularity plays no part in a whole-window summary
        let aggregator = Aggregator::new(schema, request, Granularity::Month)?;
        Ok(aggregator.summarize(records.iter().map(|s| s.record)))
    }

    fn bucket_and_aggregate(
        aggregator: &Aggregator,
        records: &[StampedRecord<'_>],
        config: &PipelineConfig,
    ) -> AggregateSet {
        let bucketer = config.bucketer();
        let aggregates = aggregator.aggregate(
            records
                .iter()
                .map(|s| (bucketer.bucket(s.timestamp, config.granularity), s.record)),
        );
        tracing::debug!(
            granularity = %config.granularity,
            groupings = aggregates.groups.len(),
            bucketed = records.len(),
            "Aggregated records"
        );
        aggregates
    }
}
