//! Pairwise Pearson correlation between measures.

use serde::Serialize;
use statrs::statistics::Statistics;

use crate::error::{TemporaError, TemporaResult};
use crate::format::round_to;
use crate::types::{Record, RecordSchema};

/// Decimal places of [`CorrelationMatrix::rounded`].
pub const CORRELATION_DECIMALS: u32 = 2;

/// Square correlation matrix over a list of measures.
///
/// Each coefficient uses the records where both measures are present. A pair
/// with fewer than two such records, or with a constant side, has no value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    /// Row and column order.
    pub measures: Vec<String>,
    /// `values[i][j]` correlates `measures[i]` with `measures[j]`.
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    /// Coefficient of a pair, by measure name.
    #[must_use]
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.measures.iter().position(|m| m == a)?;
        let j = self.measures.iter().position(|m| m == b)?;
        self.values[i][j]
    }

    /// Coefficients rounded for display.
    #[must_use]
    pub fn rounded(&self) -> Vec<Vec<Option<f64>>> {
        self.values
            .iter()
            .map(|row| {
                row.iter()
                    .map(|v| v.and_then(|v| round_to(v, CORRELATION_DECIMALS)))
                    .collect()
            })
            .collect()
    }
}

/// Correlates every pair of `measures` over `records`.
///
/// # Errors
///
/// Returns `TemporaError::UnknownMeasure` for a measure not in the schema, or
/// `InvalidRequest` for an empty measure list.
pub fn correlate<'a, I>(
    records: I,
    schema: &RecordSchema,
    measures: &[String],
) -> TemporaResult<CorrelationMatrix>
where
    I: IntoIterator<Item = &'a Record>,
{
    if measures.is_empty() {
        return Err(TemporaError::invalid_request(
            "correlation needs at least one measure",
        ));
    }
    let indices = measures
        .iter()
        .map(|m| schema.measure_index(m))
        .collect::<TemporaResult<Vec<_>>>()?;

    let columns: Vec<Vec<Option<f64>>> = {
        let mut columns = vec![Vec::new(); indices.len()];
        for record in records {
            for (column, &index) in columns.iter_mut().zip(&indices) {
                column.push(record.measure(index));
            }
        }
        columns
    };

    let n = columns.len();
    let mut values = vec![vec![None; n]; n];
    for i in 0..n {
        for j in i..n {
            let r = pearson(&columns[i], &columns[j]);
            values[i][j] = if i == j { r.map(|_| 1.0) } else { r };
            values[j][i] = values[i][j];
        }
    }

    Ok(CorrelationMatrix {
        measures: measures.to_vec(),
        values,
    })
}

fn pearson(a: &[Option<f64>], b: &[Option<f64>]) -> Option<f64> {
    let (xs, ys): (Vec<f64>, Vec<f64>) = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .unzip();
    if xs.len() < 2 {
        return None;
    }
    let (sx, sy) = (xs.iter().std_dev(), ys.iter().std_dev());
    if sx == 0.0 || sy == 0.0 || !sx.is_finite() || !sy.is_finite() {
        return None;
    }
    let r = xs.iter().covariance(ys.iter()) / (sx * sy);
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}
