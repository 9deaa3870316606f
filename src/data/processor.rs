//! Data Processor Module
//! The cleaning sequence as typed stages.
//!
//! Each stage consumes the previous stage's table and returns the next one,
//! so the order below is the only order that compiles:
//!
//! ```text
//! RawMovies -> TrimmedMovies -> FilledMovies -> UniqueMovies -> CleanMovies
//!                                                                   |
//!                                                                   v
//!                                                            CategoricalView
//! ```

use crate::config::{DatePolicy, PipelineConfig};
use crate::data::dates::{days_since_epoch, parse_date};
use crate::data::loader::is_numeric;
use polars::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum CleanError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Column '{0}' named in the configuration does not exist")]
    MissingColumn(String),
    #[error("Numeric column '{0}' has no values to compute a mean from")]
    EmptyNumericColumn(String),
    #[error("Row {row}, column '{column}': cannot parse '{value}' as a date")]
    InvalidDate {
        row: usize,
        column: String,
        value: String,
    },
    #[error("Column '{column}' has type {dtype}, expected dates as text")]
    UnsupportedDateType { column: String, dtype: String },
}

/// Mean used to fill one numeric column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnFill {
    pub column: String,
    pub mean: f64,
    pub filled: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FillReport {
    pub columns: Vec<ColumnFill>,
}

impl FillReport {
    pub fn total_filled(&self) -> usize {
        self.columns.iter().map(|c| c.filled).sum()
    }

    pub fn mean_for(&self, column: &str) -> Option<f64> {
        self.columns
            .iter()
            .find(|c| c.column == column)
            .map(|c| c.mean)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DateReport {
    pub parsed: usize,
    pub dropped: usize,
    pub nulled: usize,
}

/// Date parsing settings taken from [`PipelineConfig`].
#[derive(Debug, Clone)]
pub struct DateOptions {
    pub column: String,
    pub formats: Vec<String>,
    pub policy: DatePolicy,
    /// Column used to pick the century of two-digit years.
    pub year_column: Option<String>,
}

impl DateOptions {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            column: config.date_column.clone(),
            formats: config.date_formats.clone(),
            policy: config.date_policy,
            year_column: Some(config.year_column.clone()),
        }
    }
}

/// Table as loaded, numeric columns typed.
///
/// Until the date stage every table also carries the 1-based input row of
/// each of its rows, so errors can point at the line of the file.
#[derive(Debug, Clone)]
pub struct RawMovies {
    df: DataFrame,
    source_rows: Vec<usize>,
}

/// Unused columns removed.
#[derive(Debug, Clone)]
pub struct TrimmedMovies {
    df: DataFrame,
    source_rows: Vec<usize>,
}

/// No missing numeric values.
#[derive(Debug, Clone)]
pub struct FilledMovies {
    df: DataFrame,
    source_rows: Vec<usize>,
}

/// No repeated rows.
#[derive(Debug, Clone)]
pub struct UniqueMovies {
    df: DataFrame,
    source_rows: Vec<usize>,
}

/// Fully cleaned table, read-only from here on.
#[derive(Debug, Clone)]
pub struct CleanMovies {
    df: DataFrame,
}

/// Identifier and categorical columns with incomplete rows removed.
#[derive(Debug, Clone)]
pub struct CategoricalView {
    df: DataFrame,
}

impl RawMovies {
    pub fn new(df: DataFrame) -> Self {
        let source_rows = (1..=df.height()).collect();
        Self { df, source_rows }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.df
    }

    /// Stage 1: drop the named columns. All names are checked first.
    pub fn drop_columns(self, names: &[String]) -> Result<TrimmedMovies, CleanError> {
        let mut df = self.df;
        require_columns(&df, names)?;

        for name in names {
            df.drop_in_place(name)?;
        }

        debug!(dropped = names.len(), remaining = df.width(), "dropped columns");
        Ok(TrimmedMovies {
            df,
            source_rows: self.source_rows,
        })
    }
}

impl TrimmedMovies {
    pub fn frame(&self) -> &DataFrame {
        &self.df
    }

    /// Stage 2: replace missing numeric values with their column mean.
    ///
    /// Means are taken over present values and all of them are computed
    /// before the first cell is written. Integer columns that need filling
    /// become Float64. Text columns are untouched.
    pub fn fill_numeric_means(self) -> Result<(FilledMovies, FillReport), CleanError> {
        let mut df = self.df;

        let mut plan: Vec<ColumnFill> = Vec::new();
        for column in df.get_columns() {
            if !is_numeric(column.dtype()) {
                continue;
            }
            let missing = column.null_count();
            if missing == 0 {
                continue;
            }

            let as_f64 = column.cast(&DataType::Float64)?;
            let values = as_f64.f64()?;
            let present = values.len() - missing;
            if present == 0 {
                return Err(CleanError::EmptyNumericColumn(column.name().to_string()));
            }
            let sum: f64 = values.into_iter().flatten().sum();

            plan.push(ColumnFill {
                column: column.name().to_string(),
                mean: sum / present as f64,
                filled: missing,
            });
        }

        for fill in &plan {
            let as_f64 = df.column(&fill.column)?.cast(&DataType::Float64)?;
            let filled: Vec<f64> = as_f64
                .f64()?
                .into_iter()
                .map(|v| v.unwrap_or(fill.mean))
                .collect();
            debug!(column = %fill.column, mean = fill.mean, filled = fill.filled, "mean-filled");
            df.with_column(Column::new(fill.column.as_str().into(), filled))?;
        }

        let report = FillReport { columns: plan };
        let filled = FilledMovies {
            df,
            source_rows: self.source_rows,
        };
        Ok((filled, report))
    }
}

impl FilledMovies {
    pub fn frame(&self) -> &DataFrame {
        &self.df
    }

    /// Stage 3: remove rows equal in every column to an earlier row.
    ///
    /// Returns the number of rows removed.
    pub fn drop_duplicates(self) -> Result<(UniqueMovies, usize), CleanError> {
        let df = self.df;
        let height = df.height();

        let mut seen: HashSet<String> = HashSet::with_capacity(height);
        let mut keep: Vec<bool> = Vec::with_capacity(height);
        for i in 0..height {
            keep.push(seen.insert(row_key(&df, i)?));
        }

        let removed = keep.iter().filter(|k| !**k).count();
        if removed == 0 {
            let unique = UniqueMovies {
                df,
                source_rows: self.source_rows,
            };
            return Ok((unique, removed));
        }

        let source_rows = retain_rows(self.source_rows, &keep);
        let mask: BooleanChunked = keep.into_iter().collect();
        let unique = UniqueMovies {
            df: df.filter(&mask)?,
            source_rows,
        };
        Ok((unique, removed))
    }
}

fn retain_rows(rows: Vec<usize>, keep: &[bool]) -> Vec<usize> {
    rows.into_iter()
        .zip(keep)
        .filter_map(|(row, keep)| keep.then_some(row))
        .collect()
}

/// Identity of a row across all columns. Debug output keeps the value type,
/// so `1` (integer) and `"1"` (text) never collide. Negative zero is folded
/// into zero, since the two compare equal.
fn row_key(df: &DataFrame, row: usize) -> Result<String, CleanError> {
    let mut key = String::new();
    for column in df.get_columns() {
        let value = match column.get(row)? {
            AnyValue::Float64(v) if v == 0.0 => AnyValue::Float64(0.0),
            AnyValue::Float32(v) if v == 0.0 => AnyValue::Float32(0.0),
            value => value,
        };
        key.push_str(&format!("{value:?}\u{1f}"));
    }
    Ok(key)
}

impl UniqueMovies {
    pub fn frame(&self) -> &DataFrame {
        &self.df
    }

    /// 1-based input row of each remaining row.
    pub fn source_rows(&self) -> &[usize] {
        &self.source_rows
    }

    /// Stage 4: parse the date column into a Polars `Date`.
    ///
    /// An unreadable date is reported with its row in the input, not its
    /// position after duplicate removal.
    pub fn parse_release_dates(
        self,
        options: &DateOptions,
    ) -> Result<(CleanMovies, DateReport), CleanError> {
        let mut df = self.df;
        let source_rows = self.source_rows;
        let name = options.column.as_str();
        require_columns(&df, std::slice::from_ref(&options.column))?;

        let (dtype, present) = {
            let column = df.column(name)?;
            (column.dtype().clone(), column.len() - column.null_count())
        };
        match dtype {
            DataType::Date => {
                let report = DateReport {
                    parsed: present,
                    ..DateReport::default()
                };
                return Ok((CleanMovies { df }, report));
            }
            DataType::String => {}
            dtype => {
                return Err(CleanError::UnsupportedDateType {
                    column: name.to_string(),
                    dtype: dtype.to_string(),
                })
            }
        }

        let years = year_hints(&df, options.year_column.as_deref())?;
        let texts = df.column(name)?.str()?;

        let mut report = DateReport::default();
        let mut days: Vec<Option<i32>> = Vec::with_capacity(texts.len());
        let mut keep: Vec<bool> = Vec::with_capacity(texts.len());

        for (i, text) in texts.into_iter().enumerate() {
            let Some(text) = text else {
                // Missing dates stay missing; only unreadable text is an error.
                days.push(None);
                keep.push(true);
                continue;
            };

            let hint = years.get(i).copied().flatten();
            let row = source_rows.get(i).copied().unwrap_or(i + 1);
            match parse_date(text, &options.formats, hint) {
                Some(date) => {
                    report.parsed += 1;
                    days.push(Some(days_since_epoch(date)));
                    keep.push(true);
                }
                None => match options.policy {
                    DatePolicy::Fail => {
                        return Err(CleanError::InvalidDate {
                            row,
                            column: name.to_string(),
                            value: text.to_string(),
                        })
                    }
                    DatePolicy::DropRow => {
                        warn!(row, value = text, "dropping row with unreadable date");
                        report.dropped += 1;
                        days.push(None);
                        keep.push(false);
                    }
                    DatePolicy::Null => {
                        warn!(row, value = text, "unreadable date left empty");
                        report.nulled += 1;
                        days.push(None);
                        keep.push(true);
                    }
                },
            }
        }

        let dates = Int32Chunked::from_iter_options(name.into(), days.into_iter()).into_date();
        df.with_column(dates.into_series())?;

        if report.dropped > 0 {
            let mask: BooleanChunked = keep.into_iter().collect();
            df = df.filter(&mask)?;
        }

        Ok((CleanMovies { df }, report))
    }
}

fn year_hints(df: &DataFrame, year_column: Option<&str>) -> Result<Vec<Option<i64>>, CleanError> {
    let Some(name) = year_column else {
        return Ok(Vec::new());
    };
    let Ok(column) = df.column(name) else {
        return Ok(Vec::new());
    };
    if !is_numeric(column.dtype()) {
        return Ok(Vec::new());
    }
    let years = column.cast(&DataType::Int64)?;
    Ok(years.i64()?.into_iter().collect())
}

impl CleanMovies {
    /// Wrap a table that is already clean, e.g. one read back from a previous run.
    pub fn from_frame(df: DataFrame) -> Self {
        Self { df }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.df
    }

    pub fn into_frame(self) -> DataFrame {
        self.df
    }

    /// Stage 5: keep only `columns`, dropping rows with any missing value
    /// among them. Independent of how many rows earlier stages touched.
    pub fn categorical_view(&self, columns: &[String]) -> Result<CategoricalView, CleanError> {
        require_columns(&self.df, columns)?;
        let view = self.df.select(columns.iter().cloned())?;

        let mut keep = vec![true; view.height()];
        for column in view.get_columns() {
            if column.null_count() == 0 {
                continue;
            }
            for (i, is_null) in column.is_null().into_iter().enumerate() {
                if is_null == Some(true) {
                    keep[i] = false;
                }
            }
        }

        let dropped = keep.iter().filter(|k| !**k).count();
        let df = if dropped == 0 {
            view
        } else {
            let mask: BooleanChunked = keep.into_iter().collect();
            view.filter(&mask)?
        };

        info!(rows = df.height(), dropped, "built categorical view");
        Ok(CategoricalView { df })
    }
}

impl CategoricalView {
    pub fn frame(&self) -> &DataFrame {
        &self.df
    }
}

fn require_columns(df: &DataFrame, names: &[String]) -> Result<(), CleanError> {
    match names.iter().find(|name| df.get_column_index(name).is_none()) {
        Some(missing) => Err(CleanError::MissingColumn(missing.clone())),
        None => Ok(()),
    }
}

/// What the cleaning run did, stage by stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleaningSummary {
    pub rows_in: usize,
    pub columns_dropped: Vec<String>,
    pub fill: FillReport,
    pub duplicates_removed: usize,
    pub dates: DateReport,
    pub rows_out: usize,
}

/// Result of [`CleaningPipeline::run`].
#[derive(Debug, Clone)]
pub struct CleanOutcome {
    pub movies: CleanMovies,
    pub summary: CleaningSummary,
}

/// Runs stages 1 to 4 in order.
pub struct CleaningPipeline;

impl CleaningPipeline {
    pub fn run(raw: RawMovies, config: &PipelineConfig) -> Result<CleanOutcome, CleanError> {
        let rows_in = raw.frame().height();

        let trimmed = raw.drop_columns(&config.drop_columns)?;
        let (filled, fill) = trimmed.fill_numeric_means()?;
        let (unique, duplicates_removed) = filled.drop_duplicates()?;
        let (movies, dates) = unique.parse_release_dates(&DateOptions::from_config(config))?;

        let summary = CleaningSummary {
            rows_in,
            columns_dropped: config.drop_columns.clone(),
            fill,
            duplicates_removed,
            dates,
            rows_out: movies.frame().height(),
        };

        info!(
            rows_in,
            rows_out = summary.rows_out,
            filled = summary.fill.total_filled(),
            duplicates = duplicates_removed,
            "cleaned movie table"
        );
        Ok(CleanOutcome { movies, summary })
    }
}

/// Missing values per column, in column order.
pub fn null_counts(df: &DataFrame) -> Vec<(String, usize)> {
    df.get_columns()
        .iter()
        .map(|c| (c.name().to_string(), c.null_count()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date_options(policy: DatePolicy) -> DateOptions {
        DateOptions {
            column: "release_date".into(),
            formats: vec!["%m/%d/%y".into(), "%Y-%m-%d".into()],
            policy,
            year_column: Some("release_year".into()),
        }
    }

    fn trimmed(df: DataFrame) -> TrimmedMovies {
        RawMovies::new(df).drop_columns(&[]).unwrap()
    }

    #[test]
    fn drop_columns_checks_every_name_first() {
        let df = df!(
            "a" => [1i64, 2],
            "b" => ["x", "y"],
        )
        .unwrap();
        let err = RawMovies::new(df)
            .drop_columns(&["a".to_string(), "nope".to_string()])
            .unwrap_err();
        assert!(matches!(err, CleanError::MissingColumn(ref c) if c == "nope"));
    }

    #[test]
    fn drop_columns_removes_named() {
        let df = df!(
            "a" => [1i64, 2],
            "homepage" => ["x", "y"],
        )
        .unwrap();
        let trimmed = RawMovies::new(df)
            .drop_columns(&["homepage".to_string()])
            .unwrap();
        assert_eq!(trimmed.frame().width(), 1);
    }

    #[test]
    fn mean_fill_uses_present_values_including_zeros() {
        let df = df!(
            "budget" => [Some(0i64), Some(0), Some(100), None],
        )
        .unwrap();
        let (filled, report) = trimmed(df).fill_numeric_means().unwrap();

        let mean = report.mean_for("budget").unwrap();
        assert!((mean - 100.0 / 3.0).abs() < 1e-9);

        let budget = filled.frame().column("budget").unwrap().f64().unwrap();
        assert_eq!(budget.null_count(), 0);
        assert!((budget.get(3).unwrap() - 33.333_333_333).abs() < 1e-6);
        assert_eq!(budget.get(0), Some(0.0));
    }

    #[test]
    fn means_are_computed_before_filling() {
        let df = df!(
            "runtime" => [Some(90.0), None, Some(110.0)],
            "vote_count" => [None, Some(10i64), Some(20)],
            "title" => [Some("A"), None, Some("C")],
        )
        .unwrap();
        let (filled, report) = trimmed(df).fill_numeric_means().unwrap();

        assert_eq!(report.mean_for("runtime"), Some(100.0));
        assert_eq!(report.mean_for("vote_count"), Some(15.0));
        assert_eq!(report.total_filled(), 2);
        // Text is never filled.
        assert_eq!(filled.frame().column("title").unwrap().null_count(), 1);
    }

    #[test]
    fn untouched_integer_columns_stay_integer() {
        let df = df!("release_year" => [2001i64, 2002]).unwrap();
        let (filled, report) = trimmed(df).fill_numeric_means().unwrap();
        assert!(report.columns.is_empty());
        assert_eq!(
            filled.frame().column("release_year").unwrap().dtype(),
            &DataType::Int64
        );
    }

    #[test]
    fn all_missing_numeric_column_is_an_error() {
        let df = df!("budget" => [None::<f64>, None]).unwrap();
        let err = trimmed(df).fill_numeric_means().unwrap_err();
        assert!(matches!(err, CleanError::EmptyNumericColumn(ref c) if c == "budget"));
    }

    #[test]
    fn duplicates_keep_first_occurrence() {
        let df = df!(
            "title" => ["A", "B", "A", "A"],
            "year" => [2000i64, 2001, 2000, 2002],
        )
        .unwrap();
        let (filled, _) = trimmed(df).fill_numeric_means().unwrap();
        let (unique, removed) = filled.drop_duplicates().unwrap();

        assert_eq!(removed, 1);
        let years: Vec<Option<i64>> = unique
            .frame()
            .column("year")
            .unwrap()
            .i64()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(years, vec![Some(2000), Some(2001), Some(2002)]);
    }

    fn unique(df: DataFrame) -> UniqueMovies {
        let (filled, _) = trimmed(df).fill_numeric_means().unwrap();
        filled.drop_duplicates().unwrap().0
    }

    #[test]
    fn signed_zeros_are_one_row() {
        let df = df!(
            "title" => ["A", "A", "B"],
            "revenue" => [0.0f64, -0.0, 0.0],
        )
        .unwrap();
        let (filled, _) = trimmed(df).fill_numeric_means().unwrap();
        let (unique, removed) = filled.drop_duplicates().unwrap();
        assert_eq!(removed, 1);
        assert_eq!(unique.frame().height(), 2);
    }

    #[test]
    fn source_rows_follow_duplicate_removal() {
        let df = df!(
            "title" => ["A", "A", "B", "A"],
        )
        .unwrap();
        let movies = unique(df);
        assert_eq!(movies.source_rows(), &[1, 3]);
    }

    #[test]
    fn bad_date_after_duplicate_reports_input_row() {
        let df = df!(
            "release_date" => ["6/9/15", "6/9/15", "someday"],
            "release_year" => [2015i64, 2015, 2016],
        )
        .unwrap();
        let err = unique(df)
            .parse_release_dates(&date_options(DatePolicy::Fail))
            .unwrap_err();
        match err {
            CleanError::InvalidDate { row, value, .. } => {
                assert_eq!(row, 3);
                assert_eq!(value, "someday");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn dates_parse_with_century_from_release_year() {
        let df = df!(
            "release_date" => ["9/2/66", "6/9/15"],
            "release_year" => [1966i64, 2015],
        )
        .unwrap();
        let (clean, report) = unique(df)
            .parse_release_dates(&date_options(DatePolicy::Fail))
            .unwrap();

        assert_eq!(report.parsed, 2);
        let dates = clean.frame().column("release_date").unwrap();
        assert_eq!(dates.dtype(), &DataType::Date);
        let expected = days_since_epoch(chrono::NaiveDate::from_ymd_opt(1966, 9, 2).unwrap());
        assert!(matches!(dates.get(0).unwrap(), AnyValue::Date(days) if days == expected));
    }

    #[test]
    fn bad_date_fails_by_default() {
        let df = df!(
            "release_date" => ["6/9/15", "soon"],
            "release_year" => [2015i64, 2016],
        )
        .unwrap();
        let err = unique(df)
            .parse_release_dates(&date_options(DatePolicy::Fail))
            .unwrap_err();
        match err {
            CleanError::InvalidDate { row, value, .. } => {
                assert_eq!(row, 2);
                assert_eq!(value, "soon");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn bad_date_policies() {
        let df = df!(
            "release_date" => ["6/9/15", "soon", "2001-01-01"],
            "release_year" => [2015i64, 2016, 2001],
        )
        .unwrap();

        let (dropped, report) = unique(df.clone())
            .parse_release_dates(&date_options(DatePolicy::DropRow))
            .unwrap();
        assert_eq!(report.dropped, 1);
        assert_eq!(dropped.frame().height(), 2);

        let (nulled, report) = unique(df)
            .parse_release_dates(&date_options(DatePolicy::Null))
            .unwrap();
        assert_eq!(report.nulled, 1);
        assert_eq!(nulled.frame().height(), 3);
        assert_eq!(nulled.frame().column("release_date").unwrap().null_count(), 1);
    }

    #[test]
    fn categorical_view_drops_incomplete_rows_only_in_view() {
        let df = df!(
            "original_title" => [Some("A"), Some("B"), Some("C")],
            "genres" => [Some("Drama"), None, Some("Action")],
            "homepage" => [None::<&str>, None, None],
        )
        .unwrap();
        let clean = CleanMovies::from_frame(df);
        let view = clean
            .categorical_view(&["original_title".to_string(), "genres".to_string()])
            .unwrap();

        assert_eq!(view.frame().height(), 2);
        assert_eq!(view.frame().width(), 2);
        assert_eq!(clean.frame().height(), 3);
    }

    #[test]
    fn categorical_view_requires_columns() {
        let clean = CleanMovies::from_frame(df!("a" => ["x"]).unwrap());
        let err = clean.categorical_view(&["genres".to_string()]).unwrap_err();
        assert!(matches!(err, CleanError::MissingColumn(_)));
    }

    #[test]
    fn null_counts_per_column() {
        let df = df!(
            "a" => [Some(1i64), None],
            "b" => [Some("x"), Some("y")],
        )
        .unwrap();
        assert_eq!(
            null_counts(&df),
            vec![("a".to_string(), 1), ("b".to_string(), 0)]
        );
    }
}
