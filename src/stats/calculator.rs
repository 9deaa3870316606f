//! Statistics Calculator Module
//! Descriptive statistics for numeric movie columns.

use crate::stats::AggregateError;
use polars::prelude::*;
use serde::Serialize;
use statrs::statistics::Statistics;

/// Count, moments and quartiles of one column, as pandas' `describe`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub column: String,
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub p25: f64,
    pub median: f64,
    pub p75: f64,
    pub max: f64,
}

impl Default for ColumnSummary {
    fn default() -> Self {
        Self {
            column: String::new(),
            count: 0,
            mean: f64::NAN,
            std: f64::NAN,
            min: f64::NAN,
            p25: f64::NAN,
            median: f64::NAN,
            p75: f64::NAN,
            max: f64::NAN,
        }
    }
}

pub struct StatsCalculator;

impl StatsCalculator {
    /// Summarise a slice of values. Empty input gives count 0 and NaN elsewhere;
    /// a single value has NaN sample deviation.
    pub fn compute_descriptive_stats(values: &[f64]) -> ColumnSummary {
        let n = values.len();
        if n == 0 {
            return ColumnSummary::default();
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        ColumnSummary {
            column: String::new(),
            count: n,
            mean: values.iter().mean(),
            std: values.iter().std_dev(),
            min: sorted[0],
            p25: Self::percentile(&sorted, 25.0),
            median: Self::percentile(&sorted, 50.0),
            p75: Self::percentile(&sorted, 75.0),
            max: sorted[n - 1],
        }
    }

    /// Summarise the present values of a numeric column.
    pub fn describe(df: &DataFrame, column: &str) -> Result<ColumnSummary, AggregateError> {
        let values = Self::column_values(df, column)?;
        let mut summary = Self::compute_descriptive_stats(&values);
        summary.column = column.to_string();
        Ok(summary)
    }

    /// Non-missing values of a numeric column as f64.
    pub fn column_values(df: &DataFrame, column: &str) -> Result<Vec<f64>, AggregateError> {
        let col = df
            .column(column)
            .map_err(|_| AggregateError::MissingColumn(column.to_string()))?;
        let as_f64 = col.cast(&DataType::Float64)?;
        let values = as_f64.f64()?.into_iter().flatten().collect();
        Ok(values)
    }

    /// Calculate percentile using linear interpolation (NumPy compatible).
    pub fn percentile(sorted_values: &[f64], p: f64) -> f64 {
        let n = sorted_values.len();
        if n == 0 {
            return f64::NAN;
        }
        if n == 1 {
            return sorted_values[0];
        }

        let rank = (p / 100.0) * (n - 1) as f64;
        let lower = rank.floor() as usize;
        let upper = (rank.ceil() as usize).min(n - 1);
        let frac = rank - lower as f64;

        if lower == upper {
            sorted_values[lower]
        } else {
            sorted_values[lower] * (1.0 - frac) + sorted_values[upper] * frac
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describes_like_pandas() {
        let summary = StatsCalculator::compute_descriptive_stats(&[4.0, 1.0, 3.0, 2.0]);
        assert_eq!(summary.count, 4);
        assert_eq!(summary.mean, 2.5);
        assert!((summary.std - 1.290_994_448_7).abs() < 1e-9);
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.p25, 1.75);
        assert_eq!(summary.median, 2.5);
        assert_eq!(summary.p75, 3.25);
        assert_eq!(summary.max, 4.0);
    }

    #[test]
    fn empty_and_single_inputs() {
        let empty = StatsCalculator::compute_descriptive_stats(&[]);
        assert_eq!(empty.count, 0);
        assert!(empty.mean.is_nan());

        let single = StatsCalculator::compute_descriptive_stats(&[7.0]);
        assert_eq!(single.mean, 7.0);
        assert_eq!(single.median, 7.0);
        assert!(single.std.is_nan());
    }

    #[test]
    fn describe_skips_missing_values() {
        let df = df!("vote_count" => [Some(10i64), None, Some(30)]).unwrap();
        let summary = StatsCalculator::describe(&df, "vote_count").unwrap();
        assert_eq!(summary.column, "vote_count");
        assert_eq!(summary.count, 2);
        assert_eq!(summary.mean, 20.0);

        let err = StatsCalculator::describe(&df, "budget").unwrap_err();
        assert!(matches!(err, AggregateError::MissingColumn(_)));
    }
}
