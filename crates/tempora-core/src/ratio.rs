//! Percentage series with safe-divide semantics.
//!
//! A ratio is `numerator / denominator * 100`. A zero, absent or non-finite
//! denominator, or an absent numerator, yields a "no data" point
//! (`value == None`), never NaN or infinity.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::aggregate::{CategoryKey, GroupedAggregates};
use crate::error::{TemporaError, TemporaResult};
use crate::format::{format_percent, round_to, DISPLAY_DECIMALS};
use crate::types::{Metric, PeriodKey};

/// Which denominator row a numerator row is divided by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenominatorScope {
    /// The denominator row with the same (period, category).
    #[default]
    SameKey,
    /// The period-only denominator row of the same period.
    PeriodTotal,
}

/// One point of a ratio series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatioPoint {
    /// Bucket.
    pub period: PeriodKey,
    /// Category of the numerator row.
    pub category: CategoryKey,
    /// Numerator value, if present.
    pub numerator: Option<f64>,
    /// Denominator value, if present.
    pub denominator: Option<f64>,
    /// Unrounded percentage, `None` when undefined.
    pub value: Option<f64>,
}

impl RatioPoint {
    fn new(
        period: PeriodKey,
        category: CategoryKey,
        numerator: Option<f64>,
        denominator: Option<f64>,
    ) -> Self {
        Self {
            period,
            category,
            numerator,
            denominator,
            value: safe_percentage(numerator, denominator),
        }
    }

    /// Returns true when the ratio is defined.
    #[must_use]
    pub fn is_defined(&self) -> bool {
        self.value.is_some()
    }

    /// Percentage rounded to two decimals.
    #[must_use]
    pub fn rounded(&self) -> Option<f64> {
        self.value.and_then(|v| round_to(v, DISPLAY_DECIMALS))
    }

    /// Display label, e.g. `12.35%`, or empty when undefined.
    #[must_use]
    pub fn label(&self) -> String {
        self.value.map(format_percent).unwrap_or_default()
    }
}

/// `numerator / denominator * 100`, or `None` when undefined.
#[must_use]
pub fn safe_percentage(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    let (n, d) = (numerator?, denominator?);
    if d == 0.0 || !d.is_finite() || !n.is_finite() {
        return None;
    }
    let ratio = n / d * 100.0;
    ratio.is_finite().then_some(ratio)
}

/// Derives percentage series from paired aggregates.
#[derive(Debug, Clone, Copy, Default)]
pub struct RatioComputer;

impl RatioComputer {
    /// Divides a numerator metric by a denominator metric per key.
    ///
    /// With `SameKey`, both series must come from the same grouping and the
    /// output covers the union of their keys. With `PeriodTotal`, the
    /// denominators must be period-only and the output covers the numerator
    /// keys.
    ///
    /// # Errors
    ///
    /// Returns a contract error if a metric's measure was not aggregated or
    /// the groupings do not fit the scope.
    pub fn compute(
        numerators: &GroupedAggregates,
        numerator: &Metric,
        denominators: &GroupedAggregates,
        denominator: &Metric,
        scope: DenominatorScope,
    ) -> TemporaResult<Vec<RatioPoint>> {
        numerators.check_metric(numerator)?;
        denominators.check_metric(denominator)?;

        match scope {
            DenominatorScope::SameKey => {
                if numerators.grouping != denominators.grouping {
                    return Err(TemporaError::invalid_request(format!(
                        "same-key ratio needs one grouping, got '{}' and '{}'",
                        numerators.grouping, denominators.grouping
                    )));
                }

                let mut joined: BTreeMap<(PeriodKey, CategoryKey), (Option<f64>, Option<f64>)> =
                    BTreeMap::new();
                for row in &numerators.rows {
                    let value = row.metric_value(numerator)?;
                    joined
                        .entry((row.period.clone(), row.category.clone()))
                        .or_default()
                        .0 = value;
                }
                for row in &denominators.rows {
                    let value = row.metric_value(denominator)?;
                    joined
                        .entry((row.period.clone(), row.category.clone()))
                        .or_default()
                        .1 = value;
                }

                Ok(joined
                    .into_iter()
                    .map(|((period, category), (n, d))| RatioPoint::new(period, category, n, d))
                    .collect())
            }
            DenominatorScope::PeriodTotal => {
                if !denominators.grouping.is_period_only() {
                    return Err(TemporaError::invalid_request(format!(
                        "period-total ratio needs period-only denominators, got '{}'",
                        denominators.grouping
                    )));
                }

                let mut totals: BTreeMap<&PeriodKey, Option<f64>> = BTreeMap::new();
                for row in &denominators.rows {
                    totals.insert(&row.period, row.metric_value(denominator)?);
                }

                numerators
                    .rows
                    .iter()
                    .map(|row| {
                        let n = row.metric_value(numerator)?;
                        let d = totals.get(&row.period).copied().flatten();
                        Ok(RatioPoint::new(
                            row.period.clone(),
                            row.category.clone(),
                            n,
                            d,
                        ))
                    })
                    .collect()
            }
        }
    }

    /// Each row's metric as a percentage of its period's total over all rows.
    ///
    /// # Errors
    ///
    /// Returns `TemporaError::UnknownMeasure` if the metric's measure was not
    /// aggregated.
    pub fn share_of_period(
        rows: &GroupedAggregates,
        metric: &Metric,
    ) -> TemporaResult<Vec<RatioPoint>> {
        rows.check_metric(metric)?;

        let mut totals: BTreeMap<&PeriodKey, f64> = BTreeMap::new();
        for row in &rows.rows {
            if let Some(v) = row.metric_value(metric)? {
                *totals.entry(&row.period).or_default() += v;
            }
        }

        rows.rows
            .iter()
            .map(|row| {
                let n = row.metric_value(metric)?;
                let d = totals.get(&row.period).copied();
                Ok(RatioPoint::new(
                    row.period.clone(),
                    row.category.clone(),
                    n,
                    d,
                ))
            })
            .collect()
    }
}
