//! Evaluation of a view against a loaded record set.
//!
//! The window and the view filter are applied once. Outputs with their own
//! filter are aggregated from a subset of that selection.

use serde::Serialize;
use std::borrow::Cow;

use tempora_core::aggregate::{AggregateSet, Grouping};
use tempora_core::correlation::{correlate, CorrelationMatrix};
use tempora_core::filter::RecordFilter;
use tempora_core::pipeline::{Pipeline, PipelineConfig, PipelineOutput, Selection};
use tempora_core::pivot::{PivotReshaper, PivotTable};
use tempora_core::ranking::{top_categories, CategoryCount};
use tempora_core::ratio::{DenominatorScope, RatioComputer};
use tempora_core::series::{SeriesBuilder, SeriesPoint};
use tempora_core::summary::SummaryTable;
use tempora_core::transform::apply_rewrites;
use tempora_core::types::{Metric, RecordSet};
use tempora_core::window::StampedRecord;

use crate::error::{ConfigResult, Validate};
use crate::view::{grouping_of, ViewConfig};

/// A named pivot table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedPivot {
    /// Output name.
    pub name: String,
    /// The table.
    pub table: PivotTable,
}

/// A named long-form series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedSeries {
    /// Output name.
    pub name: String,
    /// Points ordered by period then series key.
    pub points: Vec<SeriesPoint>,
}

/// A named frequency ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamedRanking {
    /// Output name.
    pub name: String,
    /// Most frequent values first.
    pub entries: Vec<CategoryCount>,
}

/// A named whole-window table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedSummary {
    /// Output name.
    pub name: String,
    /// The table.
    pub table: SummaryTable,
}

/// A named correlation matrix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedCorrelation {
    /// Output name.
    pub name: String,
    /// Number of records the matrix was computed over.
    pub records: usize,
    /// The matrix.
    pub matrix: CorrelationMatrix,
}

/// Everything a view renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewOutput {
    /// View name.
    pub view: String,
    /// Aggregates of the unfiltered outputs and record accounting.
    pub pipeline: PipelineOutput,
    /// Pivot tables, in declaration order.
    pub pivots: Vec<NamedPivot>,
    /// Ratio series, in declaration order.
    pub ratios: Vec<NamedSeries>,
    /// Ratio pivots for ratios that request one.
    pub ratio_pivots: Vec<NamedPivot>,
    /// Chart series, in declaration order.
    pub series: Vec<NamedSeries>,
    /// Rankings over the selected records.
    pub rankings: Vec<NamedRanking>,
    /// Whole-window tables and scorecards.
    pub summaries: Vec<NamedSummary>,
    /// Correlation matrices.
    pub correlations: Vec<NamedCorrelation>,
}

fn parse_metrics(names: &[String]) -> ConfigResult<Vec<Metric>> {
    Ok(names
        .iter()
        .map(|n| Metric::parse(n))
        .collect::<Result<Vec<_>, _>>()?)
}

/// One selection shared by every output of a view.
struct Evaluation<'v, 'a> {
    view: &'v ViewConfig,
    set: &'a RecordSet,
    config: PipelineConfig,
    selection: Selection<'a>,
    base: AggregateSet,
}

impl<'v, 'a> Evaluation<'v, 'a> {
    fn records(
        &self,
        filter: Option<&RecordFilter>,
    ) -> ConfigResult<Cow<'_, [StampedRecord<'a>]>> {
        Ok(match filter {
            Some(filter) => Cow::Owned(self.selection.subset(filter, self.set.schema())?),
            None => Cow::Borrowed(self.selection.records.as_slice()),
        })
    }

    fn aggregates(
        &self,
        filter: Option<&RecordFilter>,
        groupings: Vec<Grouping>,
    ) -> ConfigResult<Cow<'_, AggregateSet>> {
        let Some(filter) = filter else {
            return Ok(Cow::Borrowed(&self.base));
        };
        let records = self.records(Some(filter))?;
        Ok(Cow::Owned(Pipeline::aggregate(
            self.set.schema(),
            &records,
            &self.config,
            &self.view.output_request(groupings),
        )?))
    }
}

impl ViewConfig {
    /// Runs the view's pipeline over `set` and builds every declared output.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the view is invalid, or the engine's
    /// contract error if `set` does not carry the columns the view names.
    pub fn evaluate(&self, set: &RecordSet) -> ConfigResult<ViewOutput> {
        self.validate_or_error()?;

        let rewritten = apply_rewrites(set, &self.rewrites)?;
        let set: &RecordSet = &rewritten;
        let config = self.pipeline_config();
        let request = self.aggregate_request();
        let selection = Pipeline::select(set, &config)?;
        let base = Pipeline::aggregate(set.schema(), &selection.records, &config, &request)?;
        let eval = Evaluation {
            view: self,
            set,
            config,
            selection,
            base,
        };

        let mut pivots = Vec::with_capacity(self.pivots.len());
        for spec in &self.pivots {
            let metrics = parse_metrics(&spec.metrics)?;
            let aggregates =
                eval.aggregates(spec.filter.as_ref(), vec![Grouping::by(spec.dimension.clone())])?;
            let table = spec
                .reshaper()
                .reshape(aggregates.by_dimension(&spec.dimension)?, &metrics)?;
            pivots.push(NamedPivot {
                name: spec.name.clone(),
                table,
            });
        }

        let mut ratios = Vec::with_capacity(self.ratios.len());
        let mut ratio_pivots = Vec::new();
        for spec in &self.ratios {
            let numerator = Metric::parse(&spec.numerator)?;
            let denominator = Metric::parse(&spec.denominator)?;
            let aggregates = eval.aggregates(spec.filter.as_ref(), spec.groupings())?;
            let numerators = aggregates.get(&grouping_of(spec.dimension.as_deref()))?;
            let denominators = match spec.scope {
                DenominatorScope::SameKey => numerators,
                DenominatorScope::PeriodTotal => aggregates.period_totals()?,
            };
            let points = RatioComputer::compute(
                numerators,
                &numerator,
                denominators,
                &denominator,
                spec.scope,
            )?;

            if spec.pivot {
                ratio_pivots.push(NamedPivot {
                    name: spec.name.clone(),
                    table: PivotReshaper::new().reshape_ratios(
                        &numerators.grouping,
                        &spec.name,
                        &points,
                    )?,
                });
            }
            ratios.push(NamedSeries {
                name: spec.name.clone(),
                points: SeriesBuilder::from_ratios(&points, &spec.name),
            });
        }

        let mut series = Vec::with_capacity(self.series.len());
        for spec in &self.series {
            let metrics = parse_metrics(&spec.metrics)?;
            let grouping = grouping_of(spec.dimension.as_deref());
            let aggregates = eval.aggregates(spec.filter.as_ref(), vec![grouping.clone()])?;
            let group = aggregates.get(&grouping)?;
            let points = match (spec.share, metrics.as_slice()) {
                (true, [metric]) => SeriesBuilder::from_ratios(
                    &RatioComputer::share_of_period(group, metric)?,
                    &spec.name,
                ),
                _ => SeriesBuilder::from_metrics(group, &metrics)?,
            };
            series.push(NamedSeries {
                name: spec.name.clone(),
                points,
            });
        }

        let mut rankings = Vec::with_capacity(self.rankings.len());
        for spec in &self.rankings {
            let records = eval.records(spec.filter.as_ref())?;
            rankings.push(NamedRanking {
                name: spec.name.clone(),
                entries: top_categories(
                    records.iter().map(|s| s.record),
                    set.schema(),
                    &spec.dimension,
                    spec.limit,
                )?,
            });
        }

        let mut summaries = Vec::with_capacity(self.summaries.len());
        for spec in &self.summaries {
            let records = eval.records(spec.filter.as_ref())?;
            let request = self.output_request([grouping_of(spec.dimension.as_deref())]);
            let grouped = Pipeline::summarize(set.schema(), &records, &request)?;
            let table = match grouped.first() {
                Some(group) => spec.builder()?.build(group)?,
                None => SummaryTable::default(),
            };
            summaries.push(NamedSummary {
                name: spec.name.clone(),
                table,
            });
        }

        let mut correlations = Vec::with_capacity(self.correlations.len());
        for spec in &self.correlations {
            let records = eval.records(spec.filter.as_ref())?;
            correlations.push(NamedCorrelation {
                name: spec.name.clone(),
                records: records.len(),
                matrix: correlate(records.iter().map(|s| s.record), set.schema(), &spec.measures)?,
            });
        }

        tracing::debug!(
            view = %self.name,
            pivots = pivots.len(),
            ratios = ratios.len(),
            series = series.len(),
            rankings = rankings.len(),
            summaries = summaries.len(),
            correlations = correlations.len(),
            "Evaluated view"
        );

        let Evaluation {
            config,
            selection,
            base,
            ..
        } = eval;
        Ok(ViewOutput {
            view: self.name.clone(),
            pipeline: PipelineOutput {
                reference: selection.reference,
                window: config.window,
                granularity: config.granularity,
                aggregates: base,
                report: selection.report,
            },
            pivots,
            ratios,
            ratio_pivots,
            series,
            rankings,
            summaries,
            correlations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::view::{PivotSpec, RankingSpec, RatioSpec, SeriesSpec};
    use approx::assert_relative_eq;
    use tempora_core::types::{Record, RecordSchema};
    use tempora_core::window::TimeWindow;

    fn folder_logs() -> RecordSet {
        let schema = ViewConfig::hm_actions().schema;
        let rows = [
            ("2024-01-03", "Manager", "Rejected", "a@x.com", 1.0, 1.0),
            ("2024-01-09", "Manager", "Shortlisted", "a+hm@x.com", 0.0, 1.0),
            ("2024-01-15", "Manager", "Shortlisted", "b@x.com", 0.0, 1.0),
            ("2024-01-20", "Recruiter", "Shortlisted", "c@x.com", 0.0, 0.0),
            ("2024-02-02", "Manager", "Rejected", "a@x.com", 1.0, 1.0),
        ];
        let records = rows
            .iter()
            .map(|(d, by, to, email, rej, moved)| {
                Record::new(
                    *d,
                    vec![Some(by.to_string()), Some(to.to_string()), Some(email.to_string())],
                    vec![Some(*rej), Some(*moved)],
                )
            })
            .collect();
        RecordSet::new(schema, records).unwrap()
    }

    #[test]
    fn test_hm_actions_view() {
        let output = ViewConfig::hm_actions().evaluate(&folder_logs()).unwrap();
        assert!(output.pipeline.report.is_complete());

        let reject = &output.ratios[0];
        assert_eq!(reject.name, "reject_pct");
        let labels: Vec<_> = reject.points.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["33.33%", "100.00%"]);

        // only moves made by managers count towards the action mix
        let mix = &output.series[0];
        let jan: Vec<_> = mix
            .points
            .iter()
            .filter(|p| p.period.label() == "Jan-2024")
            .map(|p| (p.series.as_str(), p.label.as_str()))
            .collect();
        assert_eq!(jan, vec![("Rejected", "33.33%"), ("Shortlisted", "66.67%")]);
        let jan_rejected = mix.points.iter().find(|p| p.series == "Rejected").unwrap();
        assert_relative_eq!(jan_rejected.value.unwrap(), 100.0 / 3.0);

        let table = &output.summaries[0].table;
        assert_eq!(output.summaries[0].name, "rejection_by_manager");
        assert_eq!(table.row_labels(), vec!["a@x.com", "b@x.com", "c@x.com"]);
        assert_eq!(table.cell("a@x.com", "sum(REJECTED_BY_MANAGER)").unwrap().text(), "2.00");
        assert_eq!(table.cell("a@x.com", "reject_pct").unwrap().text(), "66.67%");
        assert_eq!(table.cell("b@x.com", "reject_pct").unwrap().text(), "0.00%");
        assert!(table.cell("c@x.com", "reject_pct").unwrap().is_no_data());
    }

    #[test]
    fn test_outputs_share_one_selection() {
        let view = ViewConfig::new("moves", "Folder_Logs.csv", ViewConfig::hm_actions().schema)
            .with_window(TimeWindow::AllTime)
            .with_ranking(RankingSpec::new("movers", "MOVER_EMAIL", 10))
            .with_ranking(
                RankingSpec::new("manager_moves", "FOLDER_TO_TITLE", 10)
                    .filtered(RecordFilter::dimension_equals("MOVED_BY", "Manager")),
            );
        let output = view.evaluate(&folder_logs()).unwrap();

        assert_eq!(output.pipeline.report.bucketed, 5);
        assert!(output.pipeline.report.is_complete());
        let counts: Vec<_> = output.rankings[1]
            .entries
            .iter()
            .map(|c| (c.value.as_str(), c.count))
            .collect();
        assert_eq!(counts, vec![("Rejected", 2), ("Shortlisted", 2)]);
        // no rewrite declared, so the tagged address stays distinct
        assert_eq!(output.rankings[0].entries.len(), 4);
    }

    #[test]
    fn test_ratio_pivot_and_series() {
        let view = ViewConfig::new("moves", "Folder_Logs.csv", ViewConfig::hm_actions().schema)
            .with_window(TimeWindow::AllTime)
            .with_measures(["REJECTED_BY_MANAGER", "MOVED_BY_MANAGER"])
            .with_ratio(RatioSpec {
                dimension: Some("MOVED_BY".into()),
                pivot: true,
                ..RatioSpec::new(
                    "reject_by_role",
                    "sum(REJECTED_BY_MANAGER)",
                    "sum(MOVED_BY_MANAGER)",
                )
            })
            .with_pivot(PivotSpec::new("moves", "MOVED_BY", ["sum(MOVED_BY_MANAGER)"]));
        let output = view.evaluate(&folder_logs()).unwrap();

        let table = &output.ratio_pivots[0].table;
        assert_eq!(table.row_labels(), vec!["Manager", "Recruiter"]);
        assert_eq!(table.rows[0].cells[0].text(), "33.33%");
        assert!(table.rows[1].cells[0].is_no_data());
        assert_eq!(output.pivots[0].table.rows[0].cells[0].text(), "3.00");
    }

    #[test]
    fn test_invalid_view_is_rejected() {
        let view = ViewConfig::new("bad", "x.csv", RecordSchema::new("DATE_DAY"))
            .with_series(SeriesSpec::new("s", ["mean(VOC)"]))
            .with_ranking(RankingSpec::new("r", "SOURCE", 5));
        assert!(matches!(
            view.evaluate(&folder_logs()),
            Err(ConfigError::MultipleValidationErrors(_))
        ));
    }

    #[test]
    fn test_schema_mismatch_is_core_error() {
        let schema = RecordSchema::new("DATE_DAY").with_dimension("SOURCE");
        let set = RecordSet::new(schema.clone(), Vec::new()).unwrap();
        let view = ViewConfig::new("v", "x.csv", schema.with_dimension("FOLDER"))
            .with_series(SeriesSpec::new("s", ["records"]).by("FOLDER"));
        assert!(matches!(view.evaluate(&set), Err(ConfigError::Core(_))));
    }
}
