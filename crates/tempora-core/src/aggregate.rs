//! Period aggregation.
//!
//! Groups bucketed records by (period, category) and computes, per measure,
//! the non-null count, sum, mean, min and max. Absent measure values are
//! excluded from every statistic; `record_count` counts every record.
//!
//! Every requested grouping and measure is computed in a single pass over the
//! input. Output rows are sorted by period instant then category, and sums
//! are taken over sorted values, so the result does not depend on the order
//! in which records arrive.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{TemporaError, TemporaResult};
use crate::types::{Granularity, Metric, PeriodKey, Record, RecordSchema};

/// Label shown for an absent dimension value.
pub const ABSENT_LABEL: &str = "(none)";

// =============================================================================
// GROUPING AND CATEGORY KEYS
// =============================================================================

/// An ordered list of dimensions aggregated together.
///
/// The empty grouping aggregates by period only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Grouping(Vec<String>);

impl Grouping {
    /// Aggregate by period only.
    #[must_use]
    pub fn period_only() -> Self {
        Self(Vec::new())
    }

    /// Aggregate by period and one dimension.
    #[must_use]
    pub fn by(dimension: impl Into<String>) -> Self {
        Self(vec![dimension.into()])
    }

    /// Aggregate by period and several dimensions.
    #[must_use]
    pub fn new<I, S>(dimensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(dimensions.into_iter().map(Into::into).collect())
    }

    /// Returns the dimensions.
    #[must_use]
    pub fn dimensions(&self) -> &[String] {
        &self.0
    }

    /// Returns true for the period-only grouping.
    #[must_use]
    pub fn is_period_only(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the dimension when the grouping has exactly one.
    #[must_use]
    pub fn single_dimension(&self) -> Option<&str> {
        match self.0.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }
}

impl fmt::Display for Grouping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("period")
        } else {
            f.write_str(&self.0.join("+"))
        }
    }
}

/// Dimension values identifying a category within a grouping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
#[serde(transparent)]
pub struct CategoryKey(Vec<Option<String>>);

impl CategoryKey {
    /// Creates a key from dimension values.
    #[must_use]
    pub fn new(values: Vec<Option<String>>) -> Self {
        Self(values)
    }

    /// The key of the period-only grouping.
    #[must_use]
    pub fn none() -> Self {
        Self(Vec::new())
    }

    /// Key with a single present value.
    #[must_use]
    pub fn single(value: impl Into<String>) -> Self {
        Self(vec![Some(value.into())])
    }

    /// Returns the dimension values.
    #[must_use]
    pub fn values(&self) -> &[Option<String>] {
        &self.0
    }

    /// Returns true for the period-only key.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Display label: values joined by `" / "`, absent values as `(none)`.
    ///
    /// A present value that would read as the absent label is wrapped in
    /// double quotes, so distinct keys never share a label.
    #[must_use]
    pub fn label(&self) -> String {
        self.0
            .iter()
            .map(|v| display_value(v.as_deref()))
            .collect::<Vec<_>>()
            .join(" / ")
    }
}

fn display_value(value: Option<&str>) -> Cow<'_, str> {
    match value {
        None => Cow::Borrowed(ABSENT_LABEL),
        Some(v) if v.trim_matches('"') == ABSENT_LABEL => Cow::Owned(format!("\"{v}\"")),
        Some(v) => Cow::Borrowed(v),
    }
}

// =============================================================================
// STATISTICS
// =============================================================================

/// Null-aware statistics of one measure within one bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MeasureStats {
    /// Number of non-null values.
    pub count: usize,
    /// Sum of non-null values, `None` when there are none.
    pub sum: Option<f64>,
    /// Mean of non-null values, `None` when there are none.
    pub mean: Option<f64>,
    /// Smallest non-null value.
    pub min: Option<f64>,
    /// Largest non-null value.
    pub max: Option<f64>,
}

impl MeasureStats {
    /// Computes statistics over the non-null values of a bucket.
    ///
    /// Values are summed in ascending order so the result is independent of
    /// arrival order.
    #[must_use]
    pub fn from_values(mut values: Vec<f64>) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        values.sort_by(f64::total_cmp);

        let count = values.len();
        let sum: f64 = values.iter().sum();
        Self {
            count,
            sum: Some(sum),
            mean: Some(sum / count as f64),
            min: values.first().copied(),
            max: values.last().copied(),
        }
    }

    /// Returns true if no value was observed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Aggregate statistics for one (period, category) key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    /// Bucket.
    pub period: PeriodKey,
    /// Category within the grouping (empty for period-only).
    pub category: CategoryKey,
    /// Number of records, regardless of measure nullity.
    pub record_count: usize,
    /// Statistics per measure name.
    pub measures: BTreeMap<String, MeasureStats>,
}

impl AggregateRow {
    /// Returns the statistics of `measure`.
    ///
    /// # Errors
    ///
    /// Returns `TemporaError::UnknownMeasure` if the measure was not aggregated.
    pub fn stats(&self, measure: &str) -> TemporaResult<&MeasureStats> {
        self.measures
            .get(measure)
            .ok_or_else(|| TemporaError::unknown_measure(measure))
    }

    /// Reads a metric. `None` means "no value" (e.g. mean of zero values).
    ///
    /// # Errors
    ///
    /// Returns `TemporaError::UnknownMeasure` if the metric's measure was not
    /// aggregated.
    pub fn metric_value(&self, metric: &Metric) -> TemporaResult<Option<f64>> {
        read_metric(self.record_count, &self.measures, metric)
    }
}

/// Whole-window statistics for one category, with no period split.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    /// Category within the grouping (empty for the window total).
    pub category: CategoryKey,
    /// Number of records, regardless of measure nullity.
    pub record_count: usize,
    /// Statistics per measure name.
    pub measures: BTreeMap<String, MeasureStats>,
}

impl SummaryRow {
    /// Reads a metric, like [`AggregateRow::metric_value`].
    ///
    /// # Errors
    ///
    /// Returns `TemporaError::UnknownMeasure` if the metric's measure was not
    /// aggregated.
    pub fn metric_value(&self, metric: &Metric) -> TemporaResult<Option<f64>> {
        read_metric(self.record_count, &self.measures, metric)
    }
}

fn read_metric(
    record_count: usize,
    measures: &BTreeMap<String, MeasureStats>,
    metric: &Metric,
) -> TemporaResult<Option<f64>> {
    let Some(measure) = metric.measure() else {
        return Ok(Some(record_count as f64));
    };
    let stats = measures
        .get(measure)
        .ok_or_else(|| TemporaError::unknown_measure(measure))?;
    Ok(match metric {
        Metric::RecordCount => Some(record_count as f64),
        Metric::Count(_) => Some(stats.count as f64),
        Metric::Sum(_) => stats.sum,
        Metric::Mean(_) => stats.mean,
        Metric::Min(_) => stats.min,
        Metric::Max(_) => stats.max,
    })
}

// =============================================================================
// REQUEST AND RESULT TYPES
// =============================================================================

/// What to aggregate: measures and groupings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateRequest {
    /// Measures to compute statistics for.
    #[serde(default)]
    pub measures: Vec<String>,
    /// Groupings to compute. Empty means period-only.
    #[serde(default)]
    pub groupings: Vec<Grouping>,
}

impl AggregateRequest {
    /// Creates an empty request (record counts by period).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a measure.
    #[must_use]
    pub fn with_measure(mut self, measure: impl Into<String>) -> Self {
        self.measures.push(measure.into());
        self
    }

    /// Adds several measures.
    #[must_use]
    pub fn with_measures<I, S>(mut self, measures: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.measures.extend(measures.into_iter().map(Into::into));
        self
    }

    /// Adds a grouping.
    #[must_use]
    pub fn with_grouping(mut self, grouping: Grouping) -> Self {
        self.groupings.push(grouping);
        self
    }

    /// Adds a single-dimension grouping.
    #[must_use]
    pub fn group_by(self, dimension: impl Into<String>) -> Self {
        self.with_grouping(Grouping::by(dimension))
    }

    /// Distinct measures in request order.
    #[must_use]
    pub fn distinct_measures(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for m in &self.measures {
            if !out.contains(m) {
                out.push(m.clone());
            }
        }
        out
    }

    /// Distinct groupings in request order; period-only if none were given.
    #[must_use]
    pub fn effective_groupings(&self) -> Vec<Grouping> {
        if self.groupings.is_empty() {
            return vec![Grouping::period_only()];
        }
        let mut out: Vec<Grouping> = Vec::new();
        for g in &self.groupings {
            if !out.contains(g) {
                out.push(g.clone());
            }
        }
        out
    }
}

/// Aggregate rows of one grouping.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedAggregates {
    /// The grouping these rows belong to.
    pub grouping: Grouping,
    /// Measures available in every row.
    pub measures: Vec<String>,
    /// Rows sorted by period then category.
    pub rows: Vec<AggregateRow>,
}

impl GroupedAggregates {
    /// Finds the row for a key.
    #[must_use]
    pub fn row(&self, period: &PeriodKey, category: &CategoryKey) -> Option<&AggregateRow> {
        self.rows
            .binary_search_by(|r| (&r.period, &r.category).cmp(&(period, category)))
            .ok()
            .map(|i| &self.rows[i])
    }

    /// Distinct periods in chronological order.
    #[must_use]
    pub fn periods(&self) -> Vec<PeriodKey> {
        let mut periods: Vec<PeriodKey> = Vec::new();
        for row in &self.rows {
            if periods.last() != Some(&row.period) {
                periods.push(row.period.clone());
            }
        }
        periods
    }

    /// Checks that `metric` can be read from these rows.
    ///
    /// # Errors
    ///
    /// Returns `TemporaError::UnknownMeasure` if the metric's measure was not
    /// aggregated, even when there are no rows.
    pub fn check_metric(&self, metric: &Metric) -> TemporaResult<()> {
        match metric.measure() {
            Some(m) if !self.measures.iter().any(|x| x == m) => {
                Err(TemporaError::unknown_measure(m))
            }
            _ => Ok(()),
        }
    }
}

/// Whole-window rows of one grouping, sorted by category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedSummary {
    /// The grouping these rows belong to.
    pub grouping: Grouping,
    /// Measures available in every row.
    pub measures: Vec<String>,
    /// One row per observed category; a single row for period-only.
    pub rows: Vec<SummaryRow>,
}

impl GroupedSummary {
    /// Checks that `metric` can be read from these rows.
    ///
    /// # Errors
    ///
    /// Returns `TemporaError::UnknownMeasure` if the metric's measure was not
    /// aggregated.
    pub fn check_metric(&self, metric: &Metric) -> TemporaResult<()> {
        match metric.measure() {
            Some(m) if !self.measures.iter().any(|x| x == m) => {
                Err(TemporaError::unknown_measure(m))
            }
            _ => Ok(()),
        }
    }
}

/// Aggregates for every requested grouping.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateSet {
    /// Bucket granularity.
    pub granularity: Granularity,
    /// One entry per requested grouping, in request order.
    pub groups: Vec<GroupedAggregates>,
}

impl AggregateSet {
    /// Returns the rows of `grouping`.
    ///
    /// # Errors
    ///
    /// Returns `TemporaError::InvalidRequest` if the grouping was not requested.
    pub fn get(&self, grouping: &Grouping) -> TemporaResult<&GroupedAggregates> {
        self.groups
            .iter()
            .find(|g| &g.grouping == grouping)
            .ok_or_else(|| {
                TemporaError::invalid_request(format!("grouping '{grouping}' was not aggregated"))
            })
    }

    /// Returns the rows grouped by a single dimension.
    ///
    /// # Errors
    ///
    /// Returns `TemporaError::InvalidRequest` if that grouping was not requested.
    pub fn by_dimension(&self, dimension: &str) -> TemporaResult<&GroupedAggregates> {
        self.get(&Grouping::by(dimension))
    }

    /// Returns the period-only rows.
    ///
    /// # Errors
    ///
    /// Returns `TemporaError::InvalidRequest` if period totals were not requested.
    pub fn period_totals(&self) -> TemporaResult<&GroupedAggregates> {
        self.get(&Grouping::period_only())
    }
}

// =============================================================================
// AGGREGATOR
// =============================================================================

#[derive(Debug)]
struct Accumulator {
    record_count: usize,
    values: Vec<Vec<f64>>,
}

impl Accumulator {
    fn new(measures: usize) -> Self {
        Self {
            record_count: 0,
            values: vec![Vec::new(); measures],
        }
    }

    fn observe(&mut self, record: &Record, measure_indices: &[usize]) {
        self.record_count += 1;
        for (slot, &index) in self.values.iter_mut().zip(measure_indices) {
            if let Some(v) = record.measure(index) {
                slot.push(v);
            }
        }
    }
}

/// Single-pass, multi-grouping aggregator with names resolved up front.
#[derive(Debug, Clone)]
pub struct Aggregator {
    granularity: Granularity,
    measures: Vec<String>,
    measure_indices: Vec<usize>,
    groupings: Vec<(Grouping, Vec<usize>)>,
}

impl Aggregator {
    /// Resolves `request` against `schema`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownMeasure` or `UnknownDimension` for names not in the
    /// schema. Nothing is computed in that case.
    pub fn new(
        schema: &RecordSchema,
        request: &AggregateRequest,
        granularity: Granularity,
    ) -> TemporaResult<Self> {
        let measures = request.distinct_measures();
        let measure_indices = measures
            .iter()
            .map(|m| schema.measure_index(m))
            .collect::<TemporaResult<Vec<_>>>()?;

        let groupings = request
            .effective_groupings()
            .into_iter()
            .map(|g| {
                let indices = g
                    .dimensions()
                    .iter()
                    .map(|d| schema.dimension_index(d))
                    .collect::<TemporaResult<Vec<_>>>()?;
                Ok((g, indices))
            })
            .collect::<TemporaResult<Vec<_>>>()?;

        Ok(Self {
            granularity,
            measures,
            measure_indices,
            groupings,
        })
    }

    /// Aggregates bucketed records in one pass.
    pub fn aggregate<'a, I>(&self, items: I) -> AggregateSet
    where
        I: IntoIterator<Item = (PeriodKey, &'a Record)>,
    {
        let mut tables: Vec<BTreeMap<(PeriodKey, CategoryKey), Accumulator>> =
            (0..self.groupings.len()).map(|_| BTreeMap::new()).collect();

        for (period, record) in items {
            for (table, (_, dims)) in tables.iter_mut().zip(&self.groupings) {
                table
                    .entry((period.clone(), category_of(record, dims)))
                    .or_insert_with(|| Accumulator::new(self.measures.len()))
                    .observe(record, &self.measure_indices);
            }
        }

        let groups = tables
            .into_iter()
            .zip(&self.groupings)
            .map(|(table, (grouping, _))| GroupedAggregates {
                grouping: grouping.clone(),
                measures: self.measures.clone(),
                rows: table
                    .into_iter()
                    .map(|((period, category), acc)| AggregateRow {
                        period,
                        category,
                        record_count: acc.record_count,
                        measures: self.stats_of(acc),
                    })
                    .collect(),
            })
            .collect();

        AggregateSet {
            granularity: self.granularity,
            groups,
        }
    }

    /// Aggregates records over the whole window, one table per grouping.
    ///
    /// The period-only grouping yields exactly one row, even for no input.
    pub fn summarize<'a, I>(&self, records: I) -> Vec<GroupedSummary>
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let mut tables: Vec<BTreeMap<CategoryKey, Accumulator>> =
            (0..self.groupings.len()).map(|_| BTreeMap::new()).collect();
        for (table, (grouping, _)) in tables.iter_mut().zip(&self.groupings) {
            if grouping.is_period_only() {
                table.insert(CategoryKey::none(), Accumulator::new(self.measures.len()));
            }
        }

        for record in records {
            for (table, (_, dims)) in tables.iter_mut().zip(&self.groupings) {
                table
                    .entry(category_of(record, dims))
                    .or_insert_with(|| Accumulator::new(self.measures.len()))
                    .observe(record, &self.measure_indices);
            }
        }

        tables
            .into_iter()
            .zip(&self.groupings)
            .map(|(table, (grouping, _))| GroupedSummary {
                grouping: grouping.clone(),
                measures: self.measures.clone(),
                rows: table
                    .into_iter()
                    .map(|(category, acc)| SummaryRow {
                        category,
                        record_count: acc.record_count,
                        measures: self.stats_of(acc),
                    })
                    .collect(),
            })
            .collect()
    }

    fn stats_of(&self, acc: Accumulator) -> BTreeMap<String, MeasureStats> {
        self.measures
            .iter()
            .cloned()
            .zip(acc.values.into_iter().map(MeasureStats::from_values))
            .collect()
    }
}

fn category_of(record: &Record, dims: &[usize]) -> CategoryKey {
    CategoryKey::new(
        dims.iter()
            .map(|&i| record.dimension(i).map(String::from))
            .collect(),
    )
}
