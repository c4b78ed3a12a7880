//! Wide pivot tables: rows x (metric, period).
//!
//! Columns are ordered by each period's instant and then by metric name, or
//! the other way round once [`PivotTable::swap_levels`] has been applied.
//! Display labels never take part in ordering.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::aggregate::{AggregateRow, CategoryKey, GroupedAggregates, Grouping};
use crate::error::{TemporaError, TemporaResult};
use crate::format::format_value;
use crate::ratio::RatioPoint;
use crate::types::{Metric, PeriodKey};

/// One column of a pivot table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PivotColumn {
    /// Canonical metric name.
    pub metric: String,
    /// Bucket.
    pub period: PeriodKey,
}

impl PivotColumn {
    fn compare(&self, other: &Self, metric_outer: bool) -> Ordering {
        if metric_outer {
            self.metric
                .cmp(&other.metric)
                .then_with(|| self.period.cmp(&other.period))
        } else {
            self.period
                .cmp(&other.period)
                .then_with(|| self.metric.cmp(&other.metric))
        }
    }
}

/// A pivot cell: a formatted value or an explicit blank.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Cell {
    /// A present value.
    Value {
        /// Unrounded value.
        value: f64,
        /// Display text.
        text: String,
    },
    /// No record, or no non-null value, for this (row, column).
    NoData,
}

impl Cell {
    /// Returns the unrounded value.
    #[must_use]
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Value { value, .. } => Some(*value),
            Self::NoData => None,
        }
    }

    /// Returns the display text, empty for no data.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Value { text, .. } => text,
            Self::NoData => "",
        }
    }

    /// Returns true for a blank cell.
    #[must_use]
    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData)
    }
}

/// One row of a pivot table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotRow {
    /// Category label.
    pub label: String,
    /// One cell per column.
    pub cells: Vec<Cell>,
}

/// A reshaped table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PivotTable {
    /// Dimension whose values label the rows.
    pub row_dimension: String,
    /// Whether the metric is the outer column level.
    pub metric_outer: bool,
    /// Ordered columns.
    pub columns: Vec<PivotColumn>,
    /// Ordered rows.
    pub rows: Vec<PivotRow>,
}

impl PivotTable {
    /// Row labels in order.
    #[must_use]
    pub fn row_labels(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.label.as_str()).collect()
    }

    /// Position of the (metric, period) column.
    #[must_use]
    pub fn column_index(&self, metric: &str, period: &PeriodKey) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.metric == metric && &c.period == period)
    }

    /// Looks up a cell by row label and column.
    #[must_use]
    pub fn cell(&self, row: &str, metric: &str, period: &PeriodKey) -> Option<&Cell> {
        let column = self.column_index(metric, period)?;
        self.rows
            .iter()
            .find(|r| r.label == row)
            .and_then(|r| r.cells.get(column))
    }

    /// Swaps which column level is outermost. No aggregate is recomputed.
    #[must_use]
    pub fn swap_levels(mut self) -> Self {
        let metric_outer = !self.metric_outer;
        let mut order: Vec<usize> = (0..self.columns.len()).collect();
        order.sort_by(|&a, &b| self.columns[a].compare(&self.columns[b], metric_outer));

        self.columns = order.iter().map(|&i| self.columns[i].clone()).collect();
        for row in &mut self.rows {
            row.cells = order.iter().map(|&i| row.cells[i].clone()).collect();
        }
        self.metric_outer = metric_outer;
        self
    }
}

/// Builds pivot tables from single-dimension aggregates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PivotReshaper {
    /// Declared rows, in display order. When set, exactly these rows appear.
    #[serde(default)]
    pub row_order: Option<Vec<String>>,
    /// Put the metric level outermost.
    #[serde(default)]
    pub metric_outer: bool,
}

impl PivotReshaper {
    /// Creates a reshaper with label-sorted rows and periods outermost.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares the row set and order.
    #[must_use]
    pub fn with_row_order<I, S>(mut self, rows: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.row_order = Some(rows.into_iter().map(Into::into).collect());
        self
    }

    /// Puts the metric level outermost.
    #[must_use]
    pub fn with_metric_outer(mut self, metric_outer: bool) -> Self {
        self.metric_outer = metric_outer;
        self
    }

    /// Reshapes aggregates into a table of `metrics` x observed periods.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` if the grouping does not have exactly one
    /// dimension or no metric is requested, and `UnknownMeasure` if a metric
    /// reads a measure that was not aggregated.
    pub fn reshape(
        &self,
        aggregates: &GroupedAggregates,
        metrics: &[Metric],
    ) -> TemporaResult<PivotTable> {
        let dimension = pivot_dimension(&aggregates.grouping)?;
        if metrics.is_empty() {
            return Err(TemporaError::invalid_request("pivot needs at least one metric"));
        }
        for metric in metrics {
            aggregates.check_metric(metric)?;
        }

        let mut by_name: BTreeMap<String, &Metric> = BTreeMap::new();
        for metric in metrics {
            by_name.entry(metric.name()).or_insert(metric);
        }

        let mut lookup: BTreeMap<(&CategoryKey, &PeriodKey), &AggregateRow> = BTreeMap::new();
        let mut periods: BTreeSet<&PeriodKey> = BTreeSet::new();
        for row in &aggregates.rows {
            lookup.insert((&row.category, &row.period), row);
            periods.insert(&row.period);
        }
        let categories: BTreeSet<&CategoryKey> = lookup.keys().map(|(c, _)| *c).collect();

        let columns = self.columns(by_name.keys().cloned(), periods.into_iter().cloned());
        let rows = self.rows(categories.into_iter(), &columns, |category, column| {
            let Some(row) = lookup.get(&(category, &column.period)) else {
                return Ok(Cell::NoData);
            };
            // Column metrics come from `by_name`
            let Some(metric) = by_name.get(&column.metric) else {
                return Ok(Cell::NoData);
            };
            Ok(match row.metric_value(metric)? {
                Some(value) => Cell::Value {
                    value,
                    text: format_value(value, metric.is_count()),
                },
                None => Cell::NoData,
            })
        })?;

        Ok(PivotTable {
            row_dimension: dimension.to_string(),
            metric_outer: self.metric_outer,
            columns,
            rows,
        })
    }

    /// Reshapes ratio points into the same layout, the cell text being the
    /// percentage label. `name` labels the single metric level.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` if `grouping` does not have exactly one
    /// dimension.
    pub fn reshape_ratios(
        &self,
        grouping: &Grouping,
        name: &str,
        points: &[RatioPoint],
    ) -> TemporaResult<PivotTable> {
        let dimension = pivot_dimension(grouping)?;

        let mut lookup: BTreeMap<(&CategoryKey, &PeriodKey), &RatioPoint> = BTreeMap::new();
        let mut periods: BTreeSet<&PeriodKey> = BTreeSet::new();
        for point in points {
            lookup.insert((&point.category, &point.period), point);
            periods.insert(&point.period);
        }
        let categories: BTreeSet<&CategoryKey> = lookup.keys().map(|(c, _)| *c).collect();

        let columns = self.columns(std::iter::once(name.to_string()), periods.into_iter().cloned());
        let rows = self.rows(categories.into_iter(), &columns, |category, column| {
            Ok(lookup
                .get(&(category, &column.period))
                .and_then(|p| {
                    p.value.map(|value| Cell::Value {
                        value,
                        text: p.label(),
                    })
                })
                .unwrap_or(Cell::NoData))
        })?;

        Ok(PivotTable {
            row_dimension: dimension.to_string(),
            metric_outer: self.metric_outer,
            columns,
            rows,
        })
    }

    fn columns<M, P>(&self, metrics: M, periods: P) -> Vec<PivotColumn>
    where
        M: Iterator<Item = String> + Clone,
        P: Iterator<Item = PeriodKey>,
    {
        let mut columns: Vec<PivotColumn> = periods
            .flat_map(|period| {
                metrics.clone().map(move |metric| PivotColumn {
                    metric,
                    period: period.clone(),
                })
            })
            .collect();
        columns.sort_by(|a, b| a.compare(b, self.metric_outer));
        columns
    }

    fn rows<'a, C, F>(
        &self,
        categories: C,
        columns: &[PivotColumn],
        mut cell: F,
    ) -> TemporaResult<Vec<PivotRow>>
    where
        C: Iterator<Item = &'a CategoryKey>,
        F: FnMut(&CategoryKey, &PivotColumn) -> TemporaResult<Cell>,
    {
        let observed: Vec<(String, &CategoryKey)> =
            categories.map(|c| (c.label(), c)).collect();

        let labeled: Vec<(String, Option<&CategoryKey>)> = match &self.row_order {
            Some(order) => order
                .iter()
                .map(|label| {
                    let category = observed.iter().find(|(l, _)| l == label).map(|(_, c)| *c);
                    (label.clone(), category)
                })
                .collect(),
            None => observed.into_iter().map(|(l, c)| (l, Some(c))).collect(),
        };

        labeled
            .into_iter()
            .map(|(label, category)| {
                let cells = columns
                    .iter()
                    .map(|column| match category {
                        Some(c) => cell(c, column),
                        None => Ok(Cell::NoData),
                    })
                    .collect::<TemporaResult<Vec<_>>>()?;
                Ok(PivotRow { label, cells })
            })
            .collect()
    }
}

fn pivot_dimension(grouping: &Grouping) -> TemporaResult<&str> {
    grouping.single_dimension().ok_or_else(|| {
        TemporaError::invalid_request(format!(
            "pivot needs exactly one dimension, got '{grouping}'"
        ))
    })
}
