//! View configuration types.
//!
//! A view names one record source, its schema, the time selection and the
//! outputs (pivots, ratio series, chart series, rankings) computed from it.

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use tempora_core::aggregate::{AggregateRequest, Grouping};
use tempora_core::bucketing::DEFAULT_WEEK_ENDING;
use tempora_core::filter::RecordFilter;
use tempora_core::pipeline::PipelineConfig;
use tempora_core::pivot::PivotReshaper;
use tempora_core::ratio::DenominatorScope;
use tempora_core::summary::{SummaryBuilder, SummaryRatio};
use tempora_core::transform::DimensionRewrite;
use tempora_core::types::{Granularity, Metric, RecordSchema};
use tempora_core::TemporaResult;
use tempora_core::window::{ReferenceInstant, TimeWindow};

use crate::error::{Validate, ValidationError};

// =============================================================================
// OUTPUT SPECS
// =============================================================================

/// A pivot table over one dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotSpec {
    /// Output name.
    pub name: String,
    /// Row dimension.
    pub dimension: String,
    /// Canonical metric names, e.g. `mean(VOC)`.
    pub metrics: Vec<String>,
    /// Put the metric level outermost.
    #[serde(default)]
    pub metric_outer: bool,
    /// Declared rows, in display order.
    #[serde(default)]
    pub row_order: Option<Vec<String>>,
    /// Extra predicate for this output only.
    #[serde(default)]
    pub filter: Option<RecordFilter>,
}

impl PivotSpec {
    /// Creates a pivot spec.
    pub fn new<I, S>(name: impl Into<String>, dimension: impl Into<String>, metrics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            dimension: dimension.into(),
            metrics: metrics.into_iter().map(Into::into).collect(),
            metric_outer: false,
            row_order: None,
            filter: None,
        }
    }

    /// Declares the row set and order.
    pub fn with_row_order<I, S>(mut self, rows: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.row_order = Some(rows.into_iter().map(Into::into).collect());
        self
    }

    /// Restricts this pivot to records passing `filter`.
    pub fn filtered(mut self, filter: RecordFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Reshaper configured for this pivot.
    pub fn reshaper(&self) -> PivotReshaper {
        PivotReshaper {
            row_order: self.row_order.clone(),
            metric_outer: self.metric_outer,
        }
    }
}

/// A percentage series `numerator / denominator * 100`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioSpec {
    /// Output name.
    pub name: String,
    /// Numerator metric name.
    pub numerator: String,
    /// Denominator metric name.
    pub denominator: String,
    /// Which denominator row each numerator row is divided by.
    #[serde(default)]
    pub scope: DenominatorScope,
    /// Category dimension; period-only when absent.
    #[serde(default)]
    pub dimension: Option<String>,
    /// Also reshape the ratio into a pivot table.
    #[serde(default)]
    pub pivot: bool,
    /// Extra predicate for this output only.
    #[serde(default)]
    pub filter: Option<RecordFilter>,
}

impl RatioSpec {
    /// Creates a period-only, same-key ratio.
    pub fn new(
        name: impl Into<String>,
        numerator: impl Into<String>,
        denominator: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            numerator: numerator.into(),
            denominator: denominator.into(),
            scope: DenominatorScope::SameKey,
            dimension: None,
            pivot: false,
            filter: None,
        }
    }

    /// Splits the numerator by `dimension` and divides by the period total.
    pub fn of_period_total(mut self, dimension: impl Into<String>) -> Self {
        self.dimension = Some(dimension.into());
        self.scope = DenominatorScope::PeriodTotal;
        self
    }

    /// Restricts this ratio to records passing `filter`.
    pub fn filtered(mut self, filter: RecordFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub(crate) fn groupings(&self) -> Vec<Grouping> {
        let mut groupings = vec![grouping_of(self.dimension.as_deref())];
        if self.scope == DenominatorScope::PeriodTotal {
            groupings.push(Grouping::period_only());
        }
        groupings
    }
}

/// A long-form chart series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSpec {
    /// Output name.
    pub name: String,
    /// Canonical metric names.
    pub metrics: Vec<String>,
    /// Category dimension; period-only when absent.
    #[serde(default)]
    pub dimension: Option<String>,
    /// Express each category as a percentage of its period total.
    #[serde(default)]
    pub share: bool,
    /// Extra predicate for this output only.
    #[serde(default)]
    pub filter: Option<RecordFilter>,
}

impl SeriesSpec {
    /// Creates a period-only series.
    pub fn new<I, S>(name: impl Into<String>, metrics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            metrics: metrics.into_iter().map(Into::into).collect(),
            dimension: None,
            share: false,
            filter: None,
        }
    }

    /// Splits the series by `dimension`.
    pub fn by(mut self, dimension: impl Into<String>) -> Self {
        self.dimension = Some(dimension.into());
        self
    }

    /// Renders category shares of the period total.
    pub fn as_share(mut self) -> Self {
        self.share = true;
        self
    }

    /// Restricts this series to records passing `filter`.
    pub fn filtered(mut self, filter: RecordFilter) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// A top-N frequency ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingSpec {
    /// Output name.
    pub name: String,
    /// Ranked dimension.
    pub dimension: String,
    /// Maximum entries.
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Extra predicate for this output only.
    #[serde(default)]
    pub filter: Option<RecordFilter>,
}

fn default_limit() -> usize {
    10
}

impl RankingSpec {
    /// Creates a ranking spec.
    pub fn new(name: impl Into<String>, dimension: impl Into<String>, limit: usize) -> Self {
        Self {
            name: name.into(),
            dimension: dimension.into(),
            limit,
            filter: None,
        }
    }

    /// Restricts this ranking to records passing `filter`.
    pub fn filtered(mut self, filter: RecordFilter) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// A percentage column of a summary table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRatioSpec {
    /// Column name.
    pub name: String,
    /// Numerator metric name.
    pub numerator: String,
    /// Denominator metric name.
    pub denominator: String,
}

/// A whole-window table: one row per category, or a single scorecard row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummarySpec {
    /// Output name.
    pub name: String,
    /// Row dimension; a single scorecard row when absent.
    #[serde(default)]
    pub dimension: Option<String>,
    /// Canonical metric names.
    pub metrics: Vec<String>,
    /// Percentage columns.
    #[serde(default)]
    pub ratios: Vec<SummaryRatioSpec>,
    /// Sort rows by this metric, largest first.
    #[serde(default)]
    pub sort_by: Option<String>,
    /// Keep at most this many rows.
    #[serde(default)]
    pub limit: Option<usize>,
    /// Extra predicate for this output only.
    #[serde(default)]
    pub filter: Option<RecordFilter>,
}

impl SummarySpec {
    /// Creates a scorecard over the whole window.
    pub fn new<I, S>(name: impl Into<String>, metrics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            dimension: None,
            metrics: metrics.into_iter().map(Into::into).collect(),
            ratios: Vec::new(),
            sort_by: None,
            limit: None,
            filter: None,
        }
    }

    /// One row per value of `dimension`.
    pub fn by(mut self, dimension: impl Into<String>) -> Self {
        self.dimension = Some(dimension.into());
        self
    }

    /// Adds a percentage column.
    pub fn with_ratio(
        mut self,
        name: impl Into<String>,
        numerator: impl Into<String>,
        denominator: impl Into<String>,
    ) -> Self {
        self.ratios.push(SummaryRatioSpec {
            name: name.into(),
            numerator: numerator.into(),
            denominator: denominator.into(),
        });
        self
    }

    /// Sorts rows by `metric`, descending.
    pub fn sorted_by(mut self, metric: impl Into<String>) -> Self {
        self.sort_by = Some(metric.into());
        self
    }

    /// Caps the number of rows.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Restricts this summary to records passing `filter`.
    pub fn filtered(mut self, filter: RecordFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Builder for the table, metric names resolved.
    ///
    /// # Errors
    ///
    /// Returns `TemporaError::InvalidMetric` for an unparseable metric name.
    pub fn builder(&self) -> TemporaResult<SummaryBuilder> {
        let metrics = self
            .metrics
            .iter()
            .map(|m| Metric::parse(m))
            .collect::<TemporaResult<Vec<_>>>()?;
        let mut builder = SummaryBuilder::new(metrics);
        for ratio in &self.ratios {
            builder = builder.with_ratio(SummaryRatio::new(
                ratio.name.clone(),
                Metric::parse(&ratio.numerator)?,
                Metric::parse(&ratio.denominator)?,
            ));
        }
        if let Some(metric) = &self.sort_by {
            builder = builder.sorted_by(Metric::parse(metric)?);
        }
        if let Some(limit) = self.limit {
            builder = builder.with_limit(limit);
        }
        Ok(builder)
    }
}

/// A correlation matrix between measures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationSpec {
    /// Output name.
    pub name: String,
    /// Correlated measures, in matrix order.
    pub measures: Vec<String>,
    /// Extra predicate for this output only.
    #[serde(default)]
    pub filter: Option<RecordFilter>,
}

impl CorrelationSpec {
    /// Creates a correlation spec.
    pub fn new<I, S>(name: impl Into<String>, measures: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            measures: measures.into_iter().map(Into::into).collect(),
            filter: None,
        }
    }
}

// =============================================================================
// VIEW CONFIGURATION
// =============================================================================

fn default_window() -> TimeWindow {
    TimeWindow::Last12Months
}

fn default_week_ending() -> Weekday {
    DEFAULT_WEEK_ENDING
}

/// A declarative dashboard view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewConfig {
    /// View name/identifier.
    pub name: String,

    /// Description of this view.
    #[serde(default)]
    pub description: Option<String>,

    /// Record source identity (e.g. a CSV path).
    pub source: String,

    /// Column roles of the source.
    pub schema: RecordSchema,

    /// Rolling window.
    #[serde(default = "default_window")]
    pub window: TimeWindow,

    /// Granularity override; the window's default when absent.
    #[serde(default)]
    pub granularity: Option<Granularity>,

    /// Source of the reference instant.
    #[serde(default)]
    pub reference: ReferenceInstant,

    /// Weekday on which weekly buckets end.
    #[serde(default = "default_week_ending")]
    pub week_ending: Weekday,

    /// Predicate applied after window selection.
    #[serde(default)]
    pub filter: Option<RecordFilter>,

    /// Dimension rewrites applied to the loaded records.
    #[serde(default)]
    pub rewrites: Vec<DimensionRewrite>,

    /// Measures to aggregate.
    #[serde(default)]
    pub measures: Vec<String>,

    /// Extra groupings beyond those implied by the outputs.
    #[serde(default)]
    pub groupings: Vec<Grouping>,

    /// Pivot tables.
    #[serde(default)]
    pub pivots: Vec<PivotSpec>,

    /// Ratio series.
    #[serde(default)]
    pub ratios: Vec<RatioSpec>,

    /// Chart series.
    #[serde(default)]
    pub series: Vec<SeriesSpec>,

    /// Frequency rankings.
    #[serde(default)]
    pub rankings: Vec<RankingSpec>,

    /// Whole-window tables and scorecards.
    #[serde(default)]
    pub summaries: Vec<SummarySpec>,

    /// Correlation matrices.
    #[serde(default)]
    pub correlations: Vec<CorrelationSpec>,

    /// Whether this view is read-only (built-in).
    #[serde(default)]
    pub read_only: bool,
}

impl ViewConfig {
    /// Creates an empty view over `source`.
    pub fn new(name: impl Into<String>, source: impl Into<String>, schema: RecordSchema) -> Self {
        Self {
            name: name.into(),
            description: None,
            source: source.into(),
            schema,
            window: default_window(),
            granularity: None,
            reference: ReferenceInstant::default(),
            week_ending: DEFAULT_WEEK_ENDING,
            filter: None,
            rewrites: Vec::new(),
            measures: Vec::new(),
            groupings: Vec::new(),
            pivots: Vec::new(),
            ratios: Vec::new(),
            series: Vec::new(),
            rankings: Vec::new(),
            summaries: Vec::new(),
            correlations: Vec::new(),
            read_only: false,
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the window.
    pub fn with_window(mut self, window: TimeWindow) -> Self {
        self.window = window;
        self
    }

    /// Overrides the granularity.
    pub fn with_granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = Some(granularity);
        self
    }

    /// Sets the reference instant source.
    pub fn with_reference(mut self, reference: ReferenceInstant) -> Self {
        self.reference = reference;
        self
    }

    /// Sets the record filter.
    pub fn with_filter(mut self, filter: RecordFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Adds a dimension rewrite.
    pub fn with_rewrite(mut self, rewrite: DimensionRewrite) -> Self {
        self.rewrites.push(rewrite);
        self
    }

    /// Adds measures to aggregate.
    pub fn with_measures<I, S>(mut self, measures: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.measures.extend(measures.into_iter().map(Into::into));
        self
    }

    /// Adds a pivot.
    pub fn with_pivot(mut self, pivot: PivotSpec) -> Self {
        self.pivots.push(pivot);
        self
    }

    /// Adds a ratio.
    pub fn with_ratio(mut self, ratio: RatioSpec) -> Self {
        self.ratios.push(ratio);
        self
    }

    /// Adds a series.
    pub fn with_series(mut self, series: SeriesSpec) -> Self {
        self.series.push(series);
        self
    }

    /// Adds a ranking.
    pub fn with_ranking(mut self, ranking: RankingSpec) -> Self {
        self.rankings.push(ranking);
        self
    }

    /// Adds a summary table.
    pub fn with_summary(mut self, summary: SummarySpec) -> Self {
        self.summaries.push(summary);
        self
    }

    /// Adds a correlation matrix.
    pub fn with_correlation(mut self, correlation: CorrelationSpec) -> Self {
        self.correlations.push(correlation);
        self
    }

    /// Marks the view read-only.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Granularity in effect for this view.
    pub fn effective_granularity(&self) -> Granularity {
        self.granularity
            .unwrap_or_else(|| self.window.default_granularity())
    }

    /// Pipeline parameters of this view.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            window: self.window,
            granularity: self.effective_granularity(),
            reference: self.reference,
            week_ending: self.week_ending,
            filter: self.filter.clone(),
        }
    }

    /// Aggregation request covering every output without its own filter.
    pub fn aggregate_request(&self) -> AggregateRequest {
        let mut request = self.output_request(self.groupings.iter().cloned());
        for pivot in self.pivots.iter().filter(|p| p.filter.is_none()) {
            request = request.group_by(pivot.dimension.clone());
        }
        for ratio in self.ratios.iter().filter(|r| r.filter.is_none()) {
            for grouping in ratio.groupings() {
                request = request.with_grouping(grouping);
            }
        }
        for series in self.series.iter().filter(|s| s.filter.is_none()) {
            request = request.with_grouping(grouping_of(series.dimension.as_deref()));
        }
        request
    }

    /// Request over the view's measures for the given groupings.
    pub fn output_request<I>(&self, groupings: I) -> AggregateRequest
    where
        I: IntoIterator<Item = Grouping>,
    {
        groupings.into_iter().fold(
            AggregateRequest::new().with_measures(self.measures.iter().cloned()),
            AggregateRequest::with_grouping,
        )
    }

    fn check_filter(
        &self,
        field: &str,
        filter: Option<&RecordFilter>,
        errors: &mut Vec<ValidationError>,
    ) {
        if let Some(Err(e)) = filter.map(|f| f.compile(&self.schema)) {
            errors.push(ValidationError::with_rule(
                field,
                e.to_string(),
                "known_filter_column",
            ));
        }
    }

    fn check_metric(&self, field: &str, name: &str, errors: &mut Vec<ValidationError>) {
        match Metric::parse(name) {
            Ok(metric) => {
                if let Some(measure) = metric.measure() {
                    if !self.measures.iter().any(|m| m == measure) {
                        errors.push(ValidationError::with_rule(
                            field,
                            format!("Metric '{name}' reads undeclared measure '{measure}'"),
                            "declared_measure",
                        ));
                    }
                }
            }
            Err(e) => errors.push(ValidationError::new(field, e.to_string())),
        }
    }

    fn check_dimension(&self, field: &str, dimension: &str, errors: &mut Vec<ValidationError>) {
        if self.schema.dimension_index(dimension).is_err() {
            errors.push(ValidationError::with_rule(
                field,
                format!("Dimension '{dimension}' is not in the schema"),
                "known_dimension",
            ));
        }
    }
}

pub(crate) fn grouping_of(dimension: Option<&str>) -> Grouping {
    dimension.map_or_else(Grouping::period_only, |d| Grouping::by(d))
}

impl Validate for ViewConfig {
    fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.name.is_empty() {
            errors.push(ValidationError::new("name", "Name cannot be empty"));
        }

        if self.source.is_empty() {
            errors.push(ValidationError::new("source", "Source cannot be empty"));
        }

        if let Err(e) = self.schema.validate() {
            errors.push(ValidationError::new("schema", e.to_string()));
        }

        if self.pivots.is_empty()
            && self.ratios.is_empty()
            && self.series.is_empty()
            && self.rankings.is_empty()
            && self.summaries.is_empty()
            && self.correlations.is_empty()
        {
            errors.push(ValidationError::with_rule(
                "outputs",
                "View must declare at least one output",
                "has_output",
            ));
        }

        for rewrite in &self.rewrites {
            if let Err(e) = rewrite.compile(&self.schema) {
                errors.push(ValidationError::new("rewrites", e.to_string()));
            }
        }

        for measure in &self.measures {
            if self.schema.measure_index(measure).is_err() {
                errors.push(ValidationError::with_rule(
                    "measures",
                    format!("Measure '{measure}' is not in the schema"),
                    "known_measure",
                ));
            }
        }

        for grouping in &self.groupings {
            for dimension in grouping.dimensions() {
                self.check_dimension("groupings", dimension, &mut errors);
            }
        }

        if let Some(filter) = &self.filter {
            if let Err(e) = filter.compile(&self.schema) {
                errors.push(ValidationError::new("filter", e.to_string()));
            }
        }

        for pivot in &self.pivots {
            let field = format!("pivots.{}", pivot.name);
            self.check_dimension(&field, &pivot.dimension, &mut errors);
            self.check_filter(&field, pivot.filter.as_ref(), &mut errors);
            if pivot.metrics.is_empty() {
                errors.push(ValidationError::new(&field, "Pivot needs at least one metric"));
            }
            for metric in &pivot.metrics {
                self.check_metric(&field, metric, &mut errors);
            }
        }

        for ratio in &self.ratios {
            let field = format!("ratios.{}", ratio.name);
            self.check_filter(&field, ratio.filter.as_ref(), &mut errors);
            self.check_metric(&field, &ratio.numerator, &mut errors);
            self.check_metric(&field, &ratio.denominator, &mut errors);
            match (&ratio.dimension, ratio.scope) {
                (Some(dimension), _) => self.check_dimension(&field, dimension, &mut errors),
                (None, DenominatorScope::PeriodTotal) => errors.push(ValidationError::with_rule(
                    &field,
                    "Period-total ratio needs a dimension",
                    "period_total_dimension",
                )),
                (None, DenominatorScope::SameKey) => {}
            }
            if ratio.pivot && ratio.dimension.is_none() {
                errors.push(ValidationError::new(&field, "Ratio pivot needs a dimension"));
            }
        }

        for series in &self.series {
            let field = format!("series.{}", series.name);
            self.check_filter(&field, series.filter.as_ref(), &mut errors);
            if let Some(dimension) = &series.dimension {
                self.check_dimension(&field, dimension, &mut errors);
            }
            if series.metrics.is_empty() {
                errors.push(ValidationError::new(&field, "Series needs at least one metric"));
            }
            if series.share && series.metrics.len() != 1 {
                errors.push(ValidationError::with_rule(
                    &field,
                    "Share series needs exactly one metric",
                    "share_single_metric",
                ));
            }
            for metric in &series.metrics {
                self.check_metric(&field, metric, &mut errors);
            }
        }

        for ranking in &self.rankings {
            let field = format!("rankings.{}", ranking.name);
            self.check_dimension(&field, &ranking.dimension, &mut errors);
            self.check_filter(&field, ranking.filter.as_ref(), &mut errors);
            if ranking.limit == 0 {
                errors.push(ValidationError::new(&field, "Limit must be positive"));
            }
        }

        for summary in &self.summaries {
            let field = format!("summaries.{}", summary.name);
            self.check_filter(&field, summary.filter.as_ref(), &mut errors);
            if let Some(dimension) = &summary.dimension {
                self.check_dimension(&field, dimension, &mut errors);
            }
            if summary.metrics.is_empty() && summary.ratios.is_empty() {
                errors.push(ValidationError::new(&field, "Summary needs at least one column"));
            }
            let names = summary
                .metrics
                .iter()
                .chain(summary.ratios.iter().flat_map(|r| [&r.numerator, &r.denominator]))
                .chain(&summary.sort_by);
            for metric in names {
                self.check_metric(&field, metric, &mut errors);
            }
            if summary.limit == Some(0) {
                errors.push(ValidationError::new(&field, "Limit must be positive"));
            }
        }

        for correlation in &self.correlations {
            let field = format!("correlations.{}", correlation.name);
            self.check_filter(&field, correlation.filter.as_ref(), &mut errors);
            if correlation.measures.is_empty() {
                errors.push(ValidationError::new(&field, "Correlation needs at least one measure"));
            }
            for measure in &correlation.measures {
                if self.schema.measure_index(measure).is_err() {
                    errors.push(ValidationError::with_rule(
                        &field,
                        format!("Measure '{measure}' is not in the schema"),
                        "known_measure",
                    ));
                }
            }
        }

        errors
    }
}

// =============================================================================
// STANDARD VIEWS
// =============================================================================

const TALKSCORE_COMPONENTS: [&str; 4] = [
    "TALKSCORE_VOCAB",
    "TALKSCORE_FLUENCY",
    "TALKSCORE_GRAMMAR",
    "TALKSCORE_PRONUNCIATION",
];

fn scored() -> RecordFilter {
    RecordFilter::measure_above("TALKSCORE_OVERALL", 0.0)
}

impl ViewConfig {
    /// Assessment overview: score trends, lead counts, test completion and
    /// source mix. Score averages only consider scored candidates.
    pub fn overview() -> Self {
        let schema = RecordSchema::new("DATE_DAY")
            .with_dimension("CAMP_SITE")
            .with_dimension("NEW_SOURCE")
            .with_measures(["TALKSCORE_OVERALL", "TEST_COMPLETED", "FOR_TS_REVIEW"])
            .with_measures(TALKSCORE_COMPONENTS);
        let component_means = || TALKSCORE_COMPONENTS.iter().map(|m| format!("mean({m})"));

        Self::new("overview", "TP_raw_data1.csv", schema.clone())
            .with_description("Assessment overview")
            .with_measures(schema.measures.iter().cloned())
            .with_summary(
                SummarySpec::new("overall_scorecard", ["mean(TALKSCORE_OVERALL)"])
                    .filtered(scored()),
            )
            .with_summary(SummarySpec::new("lead_scorecard", ["records"]))
            .with_summary(
                SummarySpec::new("component_scorecard", component_means()).filtered(scored()),
            )
            .with_series(
                SeriesSpec::new("average_overall", ["mean(TALKSCORE_OVERALL)"]).filtered(scored()),
            )
            .with_series(SeriesSpec::new("lead_count", ["records"]))
            .with_series(SeriesSpec::new("score_components", component_means()).filtered(scored()))
            .with_series(SeriesSpec::new("tests_completed", ["sum(TEST_COMPLETED)"]).by("CAMP_SITE"))
            .with_series(SeriesSpec::new("ts_review", ["sum(FOR_TS_REVIEW)"]))
            .with_series(SeriesSpec::new("source_mix", ["records"]).by("NEW_SOURCE").as_share())
            .with_ratio(
                RatioSpec::new(
                    "test_completion_pct",
                    "sum(TEST_COMPLETED)",
                    "count(TEST_COMPLETED)",
                )
                .of_period_total("CAMP_SITE"),
            )
            .read_only()
    }

    /// Failure reasons: counts and average scores per reason.
    pub fn failure_reasons() -> Self {
        let scores = ["VOC", "FLU", "GRAM", "PRON", "OVERALL"];
        let schema = RecordSchema::new("DATE_DAY")
            .with_dimension("FAILED_REASON")
            .with_dimension("CEFR")
            .with_measures(scores);

        Self::new("failure_reasons", "Failure_Reasons.csv", schema)
            .with_description("Candidate failure reasons")
            .with_measures(scores)
            .with_pivot(PivotSpec::new("reason_counts", "FAILED_REASON", ["records"]))
            .with_pivot(PivotSpec::new(
                "reason_scores",
                "FAILED_REASON",
                scores.iter().map(|m| format!("mean({m})")),
            ))
            .with_series(SeriesSpec::new("cefr_counts", ["records"]).by("CEFR"))
            .read_only()
    }

    /// CEFR level distribution and overall score range per level.
    pub fn cefr_dive() -> Self {
        let schema = RecordSchema::new("DATE_DAY")
            .with_dimension("TALKSCORE_CEFR")
            .with_measure("TALKSCORE_OVERALL");

        Self::new("cefr_dive", "TP_raw_data1.csv", schema)
            .with_description("CEFR level distribution for scored candidates")
            .with_filter(scored())
            .with_measures(["TALKSCORE_OVERALL"])
            .with_series(SeriesSpec::new("cefr_distribution", ["records"]).by("TALKSCORE_CEFR"))
            .with_pivot(
                PivotSpec::new(
                    "overall_range",
                    "TALKSCORE_CEFR",
                    [
                        "min(TALKSCORE_OVERALL)",
                        "max(TALKSCORE_OVERALL)",
                        "count(TALKSCORE_OVERALL)",
                    ],
                )
                .with_row_order(["A1", "A2", "B1", "B2", "C1", "C2"]),
            )
            .read_only()
    }

    /// Hiring-manager folder moves and rejection rate.
    pub fn hm_actions() -> Self {
        let schema = RecordSchema::new("DATE_DAY")
            .with_dimension("MOVED_BY")
            .with_dimension("FOLDER_TO_TITLE")
            .with_dimension("MOVER_EMAIL")
            .with_measures(["REJECTED_BY_MANAGER", "MOVED_BY_MANAGER"]);

        Self::new("hm_actions", "Folder_Logs.csv", schema)
            .with_description("Hiring-manager actions")
            .with_rewrite(DimensionRewrite::strip_plus_tag("MOVER_EMAIL"))
            .with_measures(["REJECTED_BY_MANAGER", "MOVED_BY_MANAGER"])
            .with_ratio(RatioSpec::new(
                "reject_pct",
                "sum(REJECTED_BY_MANAGER)",
                "sum(MOVED_BY_MANAGER)",
            ))
            .with_series(
                SeriesSpec::new("manager_actions", ["records"])
                    .by("FOLDER_TO_TITLE")
                    .as_share()
                    .filtered(RecordFilter::dimension_equals("MOVED_BY", "Manager")),
            )
            .with_summary(
                SummarySpec::new(
                    "rejection_by_manager",
                    ["sum(REJECTED_BY_MANAGER)", "sum(MOVED_BY_MANAGER)"],
                )
                .by("MOVER_EMAIL")
                .with_ratio("reject_pct", "sum(REJECTED_BY_MANAGER)", "sum(MOVED_BY_MANAGER)")
                .sorted_by("sum(REJECTED_BY_MANAGER)"),
            )
            .read_only()
    }

    /// Candidate pipeline: top campaigns, sources and managers.
    pub fn candidate_info() -> Self {
        let dimensions = [
            "CAMPAIGNTITLE",
            "SOURCE",
            "ASSIGNEDMANAGER",
            "FOLDER",
            "COMPLETIONMETHOD",
            "CAMPAIGN_TYPE",
            "CAMPAIGN_SITE",
            "REPEATAPPLICATION",
        ];
        let schema = dimensions
            .iter()
            .fold(RecordSchema::new("INVITATIONDT"), |s, d| s.with_dimension(*d));

        Self::new("candidate_info", "TalkpushCI_data_fetch.csv", schema)
            .with_description("Candidate pipeline")
            .with_series(SeriesSpec::new("lead_count", ["records"]))
            .with_series(SeriesSpec::new("repeat_applications", ["records"]).by("REPEATAPPLICATION"))
            .with_ranking(RankingSpec::new("top_campaigns", "CAMPAIGNTITLE", 10))
            .with_ranking(RankingSpec::new("top_sources", "SOURCE", 10))
            .with_ranking(RankingSpec::new("top_managers", "ASSIGNEDMANAGER", 10))
            .with_ranking(RankingSpec::new("top_folders", "FOLDER", 10))
            .with_ranking(RankingSpec::new("top_completion_methods", "COMPLETIONMETHOD", 5))
            .with_ranking(RankingSpec::new("top_campaign_types", "CAMPAIGN_TYPE", 5))
            .with_ranking(RankingSpec::new("top_campaign_sites", "CAMPAIGN_SITE", 5))
            .read_only()
    }

    /// Scored candidates: top rejection reasons and how the score components
    /// move together.
    pub fn talkscore_analysis() -> Self {
        let measures = [
            "TALKSCORE_VOCAB",
            "TALKSCORE_FLUENCY",
            "TALKSCORE_GRAMMAR",
            "TALKSCORE_COMPREHENSION",
            "TALKSCORE_PRONUNCIATION",
            "TALKSCORE_OVERALL",
        ];
        let schema = RecordSchema::new("INVITATIONDT_UTC")
            .with_dimension("REJECTED_REASON")
            .with_measures(measures);

        Self::new("talkscore_analysis", "TalkpushCI_SC1.csv", schema)
            .with_description("Talkscore analysis of scored candidates")
            .with_window(TimeWindow::Last30Days)
            .with_filter(scored())
            .with_measures(measures)
            .with_ranking(RankingSpec::new("top_rejection_reasons", "REJECTED_REASON", 5))
            .with_correlation(CorrelationSpec::new("talkscore_correlation", measures))
            .with_summary(SummarySpec::new(
                "talkscore_means",
                measures.iter().map(|m| format!("mean({m})")),
            ))
            .read_only()
    }

    /// Every built-in view.
    pub fn standard_views() -> Vec<Self> {
        vec![
            Self::overview(),
            Self::failure_reasons(),
            Self::cefr_dive(),
            Self::hm_actions(),
            Self::candidate_info(),
            Self::talkscore_analysis(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_views_are_valid() {
        for view in ViewConfig::standard_views() {
            assert!(view.is_valid(), "{}: {:?}", view.name, view.validate());
            assert!(view.read_only);
        }
    }

    #[test]
    fn test_pipeline_config_uses_window_default() {
        let view = ViewConfig::cefr_dive();
        assert_eq!(view.pipeline_config().granularity, Granularity::Month);

        let weekly = view.clone().with_window(TimeWindow::Last12Weeks);
        assert_eq!(weekly.pipeline_config().granularity, Granularity::Week);

        let daily = weekly.with_granularity(Granularity::Day);
        assert_eq!(daily.pipeline_config().granularity, Granularity::Day);
        assert!(daily.pipeline_config().filter.is_some());
    }

    #[test]
    fn test_aggregate_request_covers_outputs() {
        let groupings = ViewConfig::overview().aggregate_request().effective_groupings();
        assert!(groupings.contains(&Grouping::period_only()));
        assert!(groupings.contains(&Grouping::by("CAMP_SITE")));
        assert!(groupings.contains(&Grouping::by("NEW_SOURCE")));
        assert_eq!(groupings.len(), 3);
    }

    #[test]
    fn test_validation_errors() {
        let schema = RecordSchema::new("DATE_DAY")
            .with_dimension("SITE")
            .with_measure("VOC");
        let view = ViewConfig::new("", "data.csv", schema)
            .with_measures(["VOC", "FLU"])
            .with_pivot(PivotSpec::new("p", "CEFR", ["mean(GRAM)", "median(VOC)"]))
            .with_ratio(RatioSpec {
                scope: DenominatorScope::PeriodTotal,
                ..RatioSpec::new("r", "records", "records")
            })
            .with_series(SeriesSpec::new("s", ["records", "mean(VOC)"]).as_share())
            .with_ranking(RankingSpec::new("k", "SITE", 0));

        let fields: Vec<_> = view.validate().into_iter().map(|e| e.field).collect();
        for expected in [
            "name",
            "measures",
            "pivots.p",
            "ratios.r",
            "series.s",
            "rankings.k",
        ] {
            assert!(fields.iter().any(|f| f == expected), "missing {expected} in {fields:?}");
        }
    }

    #[test]
    fn test_view_without_outputs_is_invalid() {
        let view = ViewConfig::new("empty", "data.csv", RecordSchema::new("DATE_DAY"));
        let errors = view.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].rule.as_deref(), Some("has_output"));
    }
}
