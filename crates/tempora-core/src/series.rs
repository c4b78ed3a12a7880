//! Long-form chart series.

use serde::Serialize;

use crate::aggregate::GroupedAggregates;
use crate::error::TemporaResult;
use crate::format::format_value;
use crate::ratio::RatioPoint;
use crate::types::{Metric, PeriodKey};

/// One point of a chart series.
///
/// A "no data" point has `value == None` and an empty label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    /// Bucket.
    pub period: PeriodKey,
    /// Series the point belongs to.
    pub series: String,
    /// Unrounded value.
    pub value: Option<f64>,
    /// Display label.
    pub label: String,
}

/// Builds series ordered by period instant then series key.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeriesBuilder;

impl SeriesBuilder {
    /// One series per category (or a single series named after the metric for
    /// period-only aggregates).
    ///
    /// # Errors
    ///
    /// Returns `TemporaError::UnknownMeasure` if the metric's measure was not
    /// aggregated.
    pub fn from_aggregates(
        aggregates: &GroupedAggregates,
        metric: &Metric,
    ) -> TemporaResult<Vec<SeriesPoint>> {
        Self::from_metrics(aggregates, std::slice::from_ref(metric))
    }

    /// Series for several metrics at once.
    ///
    /// For period-only aggregates the series key is the metric name. Otherwise
    /// it is the category label, suffixed with the metric name when more than
    /// one metric is requested.
    ///
    /// # Errors
    ///
    /// Returns `TemporaError::UnknownMeasure` if a metric's measure was not
    /// aggregated.
    pub fn from_metrics(
        aggregates: &GroupedAggregates,
        metrics: &[Metric],
    ) -> TemporaResult<Vec<SeriesPoint>> {
        for metric in metrics {
            aggregates.check_metric(metric)?;
        }

        let mut points = Vec::with_capacity(aggregates.rows.len() * metrics.len());
        for row in &aggregates.rows {
            for metric in metrics {
                let series = if row.category.is_empty() {
                    metric.name()
                } else if metrics.len() == 1 {
                    row.category.label()
                } else {
                    format!("{} {}", row.category.label(), metric.name())
                };
                let value = row.metric_value(metric)?;
                points.push(SeriesPoint {
                    period: row.period.clone(),
                    series,
                    value,
                    label: value
                        .map(|v| format_value(v, metric.is_count()))
                        .unwrap_or_default(),
                });
            }
        }
        sort(&mut points);
        Ok(points)
    }

    /// Series from ratio or share-of-period points. Period-only points are
    /// keyed by `name`.
    #[must_use]
    pub fn from_ratios(points: &[RatioPoint], name: &str) -> Vec<SeriesPoint> {
        let mut out: Vec<SeriesPoint> = points
            .iter()
            .map(|p| SeriesPoint {
                period: p.period.clone(),
                series: if p.category.is_empty() {
                    name.to_string()
                } else {
                    p.category.label()
                },
                value: p.value,
                label: p.label(),
            })
            .collect();
        sort(&mut out);
        out
    }
}

fn sort(points: &mut [SeriesPoint]) {
    points.sort_by(|a, b| a.period.cmp(&b.period).then_with(|| a.series.cmp(&b.series)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{AggregateRequest, AggregateSet, Aggregator, Grouping};
    use crate::bucketing::PeriodBucketer;
    use crate::ratio::RatioComputer;
    use crate::types::{Granularity, Record, RecordSchema};

    fn aggregate(rows: &[(&str, &str, Option<f64>)]) -> AggregateSet {
        let schema = RecordSchema::new("DATE_DAY")
            .with_dimension("CEFR")
            .with_measure("FLU");
        let records: Vec<Record> = rows
            .iter()
            .map(|(d, c, v)| Record::new(*d, vec![Some(c.to_string())], vec![*v]))
            .collect();
        let request = AggregateRequest::new()
            .with_measure("FLU")
            .with_grouping(Grouping::period_only())
            .group_by("CEFR");
        let agg = Aggregator::new(&schema, &request, Granularity::Week).unwrap();
        let bucketer = PeriodBucketer::new();
        agg.aggregate(records.iter().map(|r| {
            (
                bucketer.bucket_raw(r.timestamp(), Granularity::Week).unwrap(),
                r,
            )
        }))
    }

    #[test]
    fn test_series_ordered_by_period_then_key() {
        let set = aggregate(&[
            ("2024-03-12", "C1", Some(7.0)),
            ("2024-03-05", "B2", Some(5.0)),
            ("2024-03-06", "A2", Some(3.0)),
        ]);
        let points =
            SeriesBuilder::from_aggregates(set.by_dimension("CEFR").unwrap(), &Metric::mean("FLU"))
                .unwrap();

        let keys: Vec<_> = points
            .iter()
            .map(|p| (p.period.label(), p.series.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("Mar-10-2024", "A2"),
                ("Mar-10-2024", "B2"),
                ("Mar-17-2024", "C1"),
            ]
        );
        assert_eq!(points[0].label, "3.00");
    }

    #[test]
    fn test_period_only_series_named_after_metric() {
        let set = aggregate(&[("2024-03-05", "B2", None), ("2024-03-06", "A2", None)]);
        let points = SeriesBuilder::from_metrics(
            set.period_totals().unwrap(),
            &[Metric::RecordCount, Metric::mean("FLU")],
        )
        .unwrap();

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].series, "mean(FLU)");
        assert_eq!(points[0].value, None);
        assert_eq!(points[0].label, "");
        assert_eq!(points[1].series, "records");
        assert_eq!(points[1].label, "2");
    }

    #[test]
    fn test_share_series() {
        let set = aggregate(&[
            ("2024-03-05", "B2", None),
            ("2024-03-06", "A2", None),
            ("2024-03-07", "A2", None),
            ("2024-03-08", "A2", None),
        ]);
        let shares =
            RatioComputer::share_of_period(set.by_dimension("CEFR").unwrap(), &Metric::RecordCount)
                .unwrap();
        let points = SeriesBuilder::from_ratios(&shares, "share");
        assert_eq!(points[0].series, "A2");
        assert_eq!(points[0].label, "75.00%");
        assert_eq!(points[1].label, "25.00%");
    }
}
