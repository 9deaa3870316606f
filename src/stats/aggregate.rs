//! Aggregation Module
//! Profit ranking, per-year rollups and label rankings over the clean table.

use crate::labels::{LabelCount, LabelError, LabelExpander};
use crate::stats::StatsCalculator;
use polars::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use thiserror::Error;

pub const TITLE: &str = "original_title";
pub const BUDGET: &str = "budget";
pub const REVENUE: &str = "revenue";
pub const RUNTIME: &str = "runtime";
pub const DIRECTOR: &str = "director";
pub const GENRES: &str = "genres";
pub const PRODUCTION_COMPANIES: &str = "production_companies";
pub const VOTE_COUNT: &str = "vote_count";
pub const RELEASE_YEAR: &str = "release_year";

#[derive(Error, Debug)]
pub enum AggregateError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Column '{0}' does not exist")]
    MissingColumn(String),
    #[error(transparent)]
    Label(#[from] LabelError),
}

/// A movie as it appears in a profit ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfitRow {
    pub title: Option<String>,
    pub profit: f64,
    pub budget: f64,
    pub revenue: f64,
    /// False when the budget is the zero "not recorded" sentinel.
    pub budget_recorded: bool,
    pub revenue_recorded: bool,
    pub runtime: Option<f64>,
    pub release_year: Option<i64>,
    pub director: Option<String>,
    pub genres: Option<String>,
    pub production_companies: Option<String>,
}

/// A bottom-ranked movie with its loss (negated profit).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LossRow {
    #[serde(flatten)]
    pub movie: ProfitRow,
    pub loss: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YearValue {
    pub year: i64,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct YearCount {
    pub year: i64,
    pub count: usize,
}

/// The label with the highest count in one year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearLabel {
    pub year: i64,
    /// None when no movie of that year carries any label.
    pub label: Option<String>,
    pub count: u64,
}

/// What the most profitable movies have in common.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfitProfile {
    pub movies: usize,
    pub mean_runtime: f64,
    pub genres: Vec<LabelCount>,
    pub production_companies: Vec<LabelCount>,
    pub directors: Vec<LabelCount>,
    pub release_years: Vec<YearCount>,
}

/// How many rows use zero for an unrecorded budget or revenue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SentinelCounts {
    pub rows: usize,
    pub zero_budget: usize,
    pub zero_revenue: usize,
    pub zero_both: usize,
}

fn numeric(df: &DataFrame, name: &str) -> Result<Float64Chunked, AggregateError> {
    let col = df
        .column(name)
        .map_err(|_| AggregateError::MissingColumn(name.to_string()))?;
    let as_f64 = col.cast(&DataType::Float64)?;
    Ok(as_f64.f64()?.clone())
}

fn years(df: &DataFrame, name: &str) -> Result<Vec<Option<i64>>, AggregateError> {
    let col = df
        .column(name)
        .map_err(|_| AggregateError::MissingColumn(name.to_string()))?;
    let as_i64 = col.cast(&DataType::Int64)?;
    Ok(as_i64.i64()?.into_iter().collect())
}

fn text(df: &DataFrame, name: &str, row: usize) -> Option<String> {
    let col = df.column(name).ok()?;
    col.str().ok()?.get(row).map(str::to_string)
}

/// `revenue - budget` for every row. Zero sentinels are not special-cased.
pub fn profit(df: &DataFrame) -> Result<Vec<Option<f64>>, AggregateError> {
    let revenue = numeric(df, REVENUE)?;
    let budget = numeric(df, BUDGET)?;
    Ok(revenue
        .into_iter()
        .zip(budget.into_iter())
        .map(|(r, b)| Some(r? - b?))
        .collect())
}

/// `df` with an added Float64 `profit` column.
pub fn with_profit(df: &DataFrame) -> Result<DataFrame, AggregateError> {
    let mut out = df.clone();
    out.with_column(Column::new("profit".into(), profit(df)?))?;
    Ok(out)
}

/// Row indices by profit descending. The sort is stable and missing
/// profits go last.
fn profit_order(profits: &[Option<f64>]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..profits.len()).collect();
    order.sort_by(|&a, &b| match (profits[a], profits[b]) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    order
}

fn profit_row(df: &DataFrame, row: usize, profit: f64) -> Result<ProfitRow, AggregateError> {
    let budget = numeric(df, BUDGET)?.get(row).unwrap_or(f64::NAN);
    let revenue = numeric(df, REVENUE)?.get(row).unwrap_or(f64::NAN);
    let runtime = numeric(df, RUNTIME).ok().and_then(|ca| ca.get(row));
    let release_year = years(df, RELEASE_YEAR)
        .ok()
        .and_then(|ys| ys.get(row).copied().flatten());

    Ok(ProfitRow {
        title: text(df, TITLE, row),
        profit,
        budget,
        revenue,
        budget_recorded: budget != 0.0,
        revenue_recorded: revenue != 0.0,
        runtime,
        release_year,
        director: text(df, DIRECTOR, row),
        genres: text(df, GENRES, row),
        production_companies: text(df, PRODUCTION_COMPANIES, row),
    })
}

/// The `n` most profitable movies, best first.
pub fn top_by_profit(df: &DataFrame, n: usize) -> Result<Vec<ProfitRow>, AggregateError> {
    let profits = profit(df)?;
    profit_order(&profits)
        .into_iter()
        .filter_map(|row| profits[row].map(|p| (row, p)))
        .take(n)
        .map(|(row, p)| profit_row(df, row, p))
        .collect()
}

/// The `n` least profitable movies, in the tail order of the descending
/// ranking (largest loss last).
pub fn bottom_by_profit(df: &DataFrame, n: usize) -> Result<Vec<LossRow>, AggregateError> {
    let profits = profit(df)?;
    let ranked: Vec<(usize, f64)> = profit_order(&profits)
        .into_iter()
        .filter_map(|row| profits[row].map(|p| (row, p)))
        .collect();
    let start = ranked.len().saturating_sub(n);

    ranked[start..]
        .iter()
        .map(|&(row, p)| {
            Ok(LossRow {
                movie: profit_row(df, row, p)?,
                loss: -p,
            })
        })
        .collect()
}

fn fold_by_year<F>(
    df: &DataFrame,
    year_column: &str,
    value_column: &str,
    keep: F,
) -> Result<BTreeMap<i64, (f64, usize)>, AggregateError>
where
    F: Fn(f64) -> bool,
{
    let years = years(df, year_column)?;
    let values = numeric(df, value_column)?;

    let mut buckets: BTreeMap<i64, (f64, usize)> = BTreeMap::new();
    for (year, value) in years.into_iter().zip(values.into_iter()) {
        if let (Some(year), Some(value)) = (year, value) {
            if keep(value) {
                let slot = buckets.entry(year).or_insert((0.0, 0));
                slot.0 += value;
                slot.1 += 1;
            }
        }
    }
    Ok(buckets)
}

/// Sum of `column` per year, ascending by year.
pub fn sum_by_year(
    df: &DataFrame,
    year_column: &str,
    column: &str,
) -> Result<Vec<YearValue>, AggregateError> {
    Ok(fold_by_year(df, year_column, column, |_| true)?
        .into_iter()
        .map(|(year, (sum, _))| YearValue { year, value: sum })
        .collect())
}

/// Mean of `column` per year, ascending by year.
pub fn mean_by_year(
    df: &DataFrame,
    year_column: &str,
    column: &str,
) -> Result<Vec<YearValue>, AggregateError> {
    Ok(fold_by_year(df, year_column, column, |_| true)?
        .into_iter()
        .map(|(year, (sum, n))| YearValue {
            year,
            value: sum / n as f64,
        })
        .collect())
}

/// Mean runtime per year over runtimes above `min_runtime` minutes.
/// Years with no plausible runtime are absent.
pub fn mean_runtime_by_year(
    df: &DataFrame,
    year_column: &str,
    min_runtime: f64,
) -> Result<Vec<YearValue>, AggregateError> {
    Ok(fold_by_year(df, year_column, RUNTIME, |v| v > min_runtime)?
        .into_iter()
        .map(|(year, (sum, n))| YearValue {
            year,
            value: sum / n as f64,
        })
        .collect())
}

/// Movies released per year.
pub fn count_by_year(df: &DataFrame, year_column: &str) -> Result<Vec<YearCount>, AggregateError> {
    let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
    for year in years(df, year_column)?.into_iter().flatten() {
        *counts.entry(year).or_insert(0) += 1;
    }
    Ok(counts
        .into_iter()
        .map(|(year, count)| YearCount { year, count })
        .collect())
}

/// Most common label per year. Ties go to the label seen first in the table.
pub fn dominant_label_by_year(
    df: &DataFrame,
    year_column: &str,
    label_column: &str,
    expander: &LabelExpander,
) -> Result<Vec<YearLabel>, AggregateError> {
    let matrix = expander.column_indicators(df, label_column)?;
    let keys = years(df, year_column)?;

    Ok(matrix
        .sum_by(&keys)?
        .into_iter()
        .map(|(year, sums)| {
            let mut best: Option<(usize, u64)> = None;
            for (slot, &sum) in sums.iter().enumerate() {
                if sum > 0 && best.map_or(true, |(_, top)| sum > top) {
                    best = Some((slot, sum));
                }
            }
            YearLabel {
                year,
                label: best.map(|(slot, _)| matrix.labels()[slot].clone()),
                count: best.map(|(_, sum)| sum).unwrap_or(0),
            }
        })
        .collect())
}

/// The `k` labels found in the most rows, first-seen order on ties.
pub fn top_k_labels(
    df: &DataFrame,
    label_column: &str,
    k: usize,
    expander: &LabelExpander,
) -> Result<Vec<LabelCount>, AggregateError> {
    Ok(expander.column_frequencies(df, label_column)?.top_k(k))
}

/// Runtime, genre, company, director and year make-up of ranked movies.
pub fn profit_profile(rows: &[ProfitRow], expander: &LabelExpander) -> ProfitProfile {
    let runtimes: Vec<f64> = rows.iter().filter_map(|r| r.runtime).collect();

    let mut year_counts: Vec<YearCount> = Vec::new();
    for year in rows.iter().filter_map(|r| r.release_year) {
        match year_counts.iter_mut().find(|yc| yc.year == year) {
            Some(yc) => yc.count += 1,
            None => year_counts.push(YearCount { year, count: 1 }),
        }
    }
    year_counts.sort_by(|a, b| b.count.cmp(&a.count));

    ProfitProfile {
        movies: rows.len(),
        mean_runtime: StatsCalculator::compute_descriptive_stats(&runtimes).mean,
        genres: expander
            .frequencies(rows.iter().map(|r| r.genres.as_deref()))
            .ranked(),
        production_companies: expander
            .frequencies(rows.iter().map(|r| r.production_companies.as_deref()))
            .ranked(),
        directors: expander
            .frequencies(rows.iter().map(|r| r.director.as_deref()))
            .ranked(),
        release_years: year_counts,
    }
}

/// Count zero budgets and revenues.
pub fn sentinel_counts(df: &DataFrame) -> Result<SentinelCounts, AggregateError> {
    let budget = numeric(df, BUDGET)?;
    let revenue = numeric(df, REVENUE)?;

    let mut counts = SentinelCounts {
        rows: df.height(),
        ..SentinelCounts::default()
    };
    for (b, r) in budget.into_iter().zip(revenue.into_iter()) {
        let zero_b = b == Some(0.0);
        let zero_r = r == Some(0.0);
        counts.zero_budget += usize::from(zero_b);
        counts.zero_revenue += usize::from(zero_r);
        counts.zero_both += usize::from(zero_b && zero_r);
    }
    Ok(counts)
}
