//! Whole-window summary tables.
//!
//! A summary aggregates the selected records without splitting them into
//! periods: one row per category (or a single scorecard row), one column per
//! metric and per ratio.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::aggregate::{CategoryKey, GroupedSummary, SummaryRow};
use crate::error::TemporaResult;
use crate::format::{format_percent, format_value};
use crate::pivot::Cell;
use crate::ratio::safe_percentage;
use crate::types::Metric;

/// A per-row percentage column `numerator / denominator * 100`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRatio {
    /// Column name.
    pub name: String,
    /// Numerator metric.
    pub numerator: Metric,
    /// Denominator metric.
    pub denominator: Metric,
}

impl SummaryRatio {
    /// Creates a ratio column.
    #[must_use]
    pub fn new(name: impl Into<String>, numerator: Metric, denominator: Metric) -> Self {
        Self {
            name: name.into(),
            numerator,
            denominator,
        }
    }
}

/// One column of a summary table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryColumn {
    /// Metric name or ratio name.
    pub name: String,
    /// Whether the column holds percentages.
    pub percent: bool,
}

/// One row of a summary table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryTableRow {
    /// Category label, empty for the window total.
    pub label: String,
    /// One cell per column.
    pub cells: Vec<Cell>,
}

/// A rendered whole-window table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SummaryTable {
    /// Metric columns first, then ratio columns.
    pub columns: Vec<SummaryColumn>,
    /// Rows in display order.
    pub rows: Vec<SummaryTableRow>,
}

impl SummaryTable {
    /// Position of a column.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Looks up a cell by row label and column name.
    #[must_use]
    pub fn cell(&self, row: &str, column: &str) -> Option<&Cell> {
        let column = self.column_index(column)?;
        self.rows
            .iter()
            .find(|r| r.label == row)
            .and_then(|r| r.cells.get(column))
    }

    /// Row labels in order.
    #[must_use]
    pub fn row_labels(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.label.as_str()).collect()
    }
}

/// Renders a [`GroupedSummary`] into a [`SummaryTable`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryBuilder {
    /// Metric columns.
    pub metrics: Vec<Metric>,
    /// Ratio columns.
    pub ratios: Vec<SummaryRatio>,
    /// Sort rows by this metric, largest first. Category order otherwise.
    pub sort_by: Option<Metric>,
    /// Keep at most this many rows.
    pub limit: Option<usize>,
}

impl SummaryBuilder {
    /// Creates a builder with the given metric columns.
    #[must_use]
    pub fn new(metrics: Vec<Metric>) -> Self {
        Self {
            metrics,
            ..Self::default()
        }
    }

    /// Adds a ratio column.
    #[must_use]
    pub fn with_ratio(mut self, ratio: SummaryRatio) -> Self {
        self.ratios.push(ratio);
        self
    }

    /// Sorts rows by `metric`, descending. Rows without a value go last.
    #[must_use]
    pub fn sorted_by(mut self, metric: Metric) -> Self {
        self.sort_by = Some(metric);
        self
    }

    /// Caps the number of rows.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Builds the table.
    ///
    /// # Errors
    ///
    /// Returns `TemporaError::UnknownMeasure` if any metric reads a measure
    /// that was not aggregated.
    pub fn build(&self, summary: &GroupedSummary) -> TemporaResult<SummaryTable> {
        let ratio_metrics = self
            .ratios
            .iter()
            .flat_map(|r| [&r.numerator, &r.denominator]);
        for metric in self.metrics.iter().chain(ratio_metrics).chain(&self.sort_by) {
            summary.check_metric(metric)?;
        }

        let mut rows: Vec<&SummaryRow> = summary.rows.iter().collect();
        if let Some(metric) = &self.sort_by {
            let mut keyed = rows
                .into_iter()
                .map(|row| Ok((row.metric_value(metric)?, row)))
                .collect::<TemporaResult<Vec<_>>>()?;
            // stable, so ties keep category order
            keyed.sort_by(|(a, _), (b, _)| descending(*a, *b));
            rows = keyed.into_iter().map(|(_, row)| row).collect();
        }
        if let Some(limit) = self.limit {
            rows.truncate(limit);
        }

        let columns = self
            .metrics
            .iter()
            .map(|m| SummaryColumn {
                name: m.name(),
                percent: false,
            })
            .chain(self.ratios.iter().map(|r| SummaryColumn {
                name: r.name.clone(),
                percent: true,
            }))
            .collect();

        let rows = rows
            .into_iter()
            .map(|row| self.render_row(row))
            .collect::<TemporaResult<Vec<_>>>()?;

        Ok(SummaryTable { columns, rows })
    }

    fn render_row(&self, row: &SummaryRow) -> TemporaResult<SummaryTableRow> {
        let mut cells = Vec::with_capacity(self.metrics.len() + self.ratios.len());
        for metric in &self.metrics {
            cells.push(match row.metric_value(metric)? {
                Some(value) => Cell::Value {
                    value,
                    text: format_value(value, metric.is_count()),
                },
                None => Cell::NoData,
            });
        }
        for ratio in &self.ratios {
            let value = safe_percentage(
                row.metric_value(&ratio.numerator)?,
                row.metric_value(&ratio.denominator)?,
            );
            cells.push(match value {
                Some(value) => Cell::Value {
                    value,
                    text: format_percent(value),
                },
                None => Cell::NoData,
            });
        }
        Ok(SummaryTableRow {
            label: label_of(&row.category),
            cells,
        })
    }
}

fn label_of(category: &CategoryKey) -> String {
    if category.is_empty() {
        String::new()
    } else {
        category.label()
    }
}

fn descending(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
