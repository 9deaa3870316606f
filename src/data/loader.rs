//! CSV Data Loader Module
//! Reads the movie export with Polars and types its numeric columns.

use crate::config::PipelineConfig;
use crate::data::RawMovies;
use polars::prelude::*;
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("Failed to load CSV: {0}")]
    CsvError(#[from] PolarsError),
    #[error("Required column '{0}' is missing from the input")]
    MissingColumn(String),
    #[error("Row {row}, column '{column}': '{value}' is not a valid {expected}")]
    InvalidNumber {
        row: usize,
        column: String,
        value: String,
        expected: &'static str,
    },
    #[error("Column '{column}' has type {dtype}, expected text or numbers")]
    UnsupportedType { column: String, dtype: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumericKind {
    Integer,
    Float,
}

impl NumericKind {
    fn dtype(self) -> DataType {
        match self {
            NumericKind::Integer => DataType::Int64,
            NumericKind::Float => DataType::Float64,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            NumericKind::Integer => "integer",
            NumericKind::Float => "number",
        }
    }
}

/// Loads the movie table. Every field is read as text, then the configured
/// numeric columns are coerced so a bad cell is reported with its position.
pub struct MovieLoader<'a> {
    config: &'a PipelineConfig,
}

impl<'a> MovieLoader<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    /// Load a CSV file from disk.
    pub fn load_csv(&self, file_path: impl AsRef<Path>) -> Result<RawMovies, LoaderError> {
        let file_path = file_path.as_ref();

        // Schema inference off: every column arrives as String.
        let df = LazyCsvReader::new(file_path)
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .finish()?
            .collect()?;

        info!(
            path = %file_path.display(),
            rows = df.height(),
            columns = df.width(),
            "loaded csv"
        );
        self.prepare(df)
    }

    /// Load CSV content already held in memory.
    pub fn load_bytes(&self, bytes: Vec<u8>) -> Result<RawMovies, LoaderError> {
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .into_reader_with_file_handle(Cursor::new(bytes))
            .finish()?;

        info!(rows = df.height(), columns = df.width(), "loaded csv from memory");
        self.prepare(df)
    }

    /// Accept a frame built elsewhere, applying the same checks as a file load.
    pub fn from_frame(&self, df: DataFrame) -> Result<RawMovies, LoaderError> {
        self.prepare(df)
    }

    fn prepare(&self, df: DataFrame) -> Result<RawMovies, LoaderError> {
        check_required(&df, &self.config.required_columns)?;
        let df = coerce_numeric_columns(df, self.config)?;
        Ok(RawMovies::new(df))
    }
}

/// Fail on the first named column the frame lacks.
pub fn check_required(df: &DataFrame, names: &[String]) -> Result<(), LoaderError> {
    match names.iter().find(|name| df.get_column_index(name).is_none()) {
        Some(missing) => Err(LoaderError::MissingColumn(missing.clone())),
        None => Ok(()),
    }
}

/// Convert the configured integer and float columns to Int64 / Float64.
///
/// Empty fields become missing values. Columns that are already numeric are
/// cast; text that does not parse, or a fractional value in an integer
/// column, fails with the 1-based data row. A configured column the frame
/// lacks is skipped unless it is also required.
pub fn coerce_numeric_columns(
    mut df: DataFrame,
    config: &PipelineConfig,
) -> Result<DataFrame, LoaderError> {
    let targets = config
        .integer_columns
        .iter()
        .map(|name| (name, NumericKind::Integer))
        .chain(
            config
                .float_columns
                .iter()
                .map(|name| (name, NumericKind::Float)),
        );

    for (name, kind) in targets {
        let Ok(column) = df.column(name) else {
            if config.required_columns.contains(name) {
                return Err(LoaderError::MissingColumn(name.clone()));
            }
            debug!(column = %name, "optional numeric column absent");
            continue;
        };

        let coerced = match column.dtype() {
            DataType::String => match kind {
                NumericKind::Integer => {
                    Column::new(name.as_str().into(), parse_integers(column.str()?, name)?)
                }
                NumericKind::Float => {
                    Column::new(name.as_str().into(), parse_floats(column.str()?, name)?)
                }
            },
            DataType::Float32 | DataType::Float64 if kind == NumericKind::Integer => {
                check_whole(column, name)?;
                column.cast(&DataType::Int64)?
            }
            dtype if is_numeric(dtype) => column.cast(&kind.dtype())?,
            dtype => {
                return Err(LoaderError::UnsupportedType {
                    column: name.clone(),
                    dtype: dtype.to_string(),
                })
            }
        };

        debug!(column = %name, kind = kind.describe(), nulls = coerced.null_count(), "typed column");
        df.with_column(coerced)?;
    }

    Ok(df)
}

fn parse_integers(ca: &StringChunked, name: &str) -> Result<Vec<Option<i64>>, LoaderError> {
    ca.into_iter()
        .enumerate()
        .map(|(i, cell)| match cell.map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => parse_integer(text).map(Some).ok_or_else(|| LoaderError::InvalidNumber {
                row: i + 1,
                column: name.to_string(),
                value: text.to_string(),
                expected: NumericKind::Integer.describe(),
            }),
        })
        .collect()
}

fn parse_floats(ca: &StringChunked, name: &str) -> Result<Vec<Option<f64>>, LoaderError> {
    ca.into_iter()
        .enumerate()
        .map(|(i, cell)| match cell.map(str::trim) {
            None | Some("") => Ok(None),
            Some(text) => text
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(Some)
                .ok_or_else(|| LoaderError::InvalidNumber {
                    row: i + 1,
                    column: name.to_string(),
                    value: text.to_string(),
                    expected: NumericKind::Float.describe(),
                }),
        })
        .collect()
}

/// A float column may become an integer column only if nothing is lost.
fn check_whole(column: &Column, name: &str) -> Result<(), LoaderError> {
    let as_f64 = column.cast(&DataType::Float64)?;
    let bad = as_f64
        .f64()?
        .into_iter()
        .enumerate()
        .find_map(|(i, v)| v.filter(|v| !is_whole(*v)).map(|v| (i, v)));

    match bad {
        Some((i, v)) => Err(LoaderError::InvalidNumber {
            row: i + 1,
            column: name.to_string(),
            value: v.to_string(),
            expected: NumericKind::Integer.describe(),
        }),
        None => Ok(()),
    }
}

fn is_whole(v: f64) -> bool {
    v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64
}

/// Integers may be exported with a trailing ".0".
fn parse_integer(text: &str) -> Option<i64> {
    if let Ok(v) = text.parse::<i64>() {
        return Some(v);
    }
    let v = text.parse::<f64>().ok()?;
    is_whole(v).then_some(v as i64)
}

pub(crate) fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Float32
            | DataType::Float64
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> PipelineConfig {
        PipelineConfig {
            integer_columns: vec!["budget".into()],
            float_columns: vec!["runtime".into()],
            required_columns: vec!["original_title".into(), "budget".into(), "runtime".into()],
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn parses_numbers_and_treats_empty_as_missing() {
        let config = small_config();
        let csv = "original_title,budget,runtime\nA,100,90.5\nB,,\nC,2.0,120\n";
        let raw = MovieLoader::new(&config)
            .load_bytes(csv.as_bytes().to_vec())
            .unwrap();
        let df = raw.frame();

        let budget = df.column("budget").unwrap().i64().unwrap();
        assert_eq!(budget.get(0), Some(100));
        assert_eq!(budget.get(1), None);
        assert_eq!(budget.get(2), Some(2));

        let runtime = df.column("runtime").unwrap().f64().unwrap();
        assert_eq!(runtime.get(0), Some(90.5));
        assert_eq!(runtime.get(1), None);
    }

    #[test]
    fn reports_row_and_column_of_bad_number() {
        let config = small_config();
        let csv = "original_title,budget,runtime\nA,100,90\nB,lots,80\n";
        let err = MovieLoader::new(&config)
            .load_bytes(csv.as_bytes().to_vec())
            .unwrap_err();
        match err {
            LoaderError::InvalidNumber { row, column, value, .. } => {
                assert_eq!(row, 2);
                assert_eq!(column, "budget");
                assert_eq!(value, "lots");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_required_column_fails() {
        let config = small_config();
        let csv = "original_title,budget\nA,1\n";
        let err = MovieLoader::new(&config)
            .load_bytes(csv.as_bytes().to_vec())
            .unwrap_err();
        assert!(matches!(err, LoaderError::MissingColumn(ref c) if c == "runtime"));
    }

    #[test]
    fn absent_optional_numeric_column_is_skipped() {
        let config = PipelineConfig {
            integer_columns: vec!["id".into(), "budget".into()],
            ..small_config()
        };
        let csv = "original_title,budget,runtime\nA,100,90\n";
        let raw = MovieLoader::new(&config)
            .load_bytes(csv.as_bytes().to_vec())
            .unwrap();
        assert!(raw.frame().column("id").is_err());
        assert_eq!(raw.frame().column("budget").unwrap().dtype(), &DataType::Int64);
    }

    #[test]
    fn absent_required_numeric_column_fails() {
        let config = PipelineConfig {
            required_columns: vec!["budget".into()],
            ..small_config()
        };
        let df = df!("runtime" => [90.0]).unwrap();
        let err = coerce_numeric_columns(df, &config).unwrap_err();
        assert!(matches!(err, LoaderError::MissingColumn(ref c) if c == "budget"));
    }

    #[test]
    fn fractional_float_in_integer_column_is_rejected() {
        let config = small_config();
        let df = df!(
            "original_title" => ["A", "B"],
            "budget" => [1.5f64, 2.0],
            "runtime" => [90.0, 80.0],
        )
        .unwrap();
        let err = MovieLoader::new(&config).from_frame(df).unwrap_err();
        match err {
            LoaderError::InvalidNumber { row, column, value, .. } => {
                assert_eq!(row, 1);
                assert_eq!(column, "budget");
                assert_eq!(value, "1.5");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn whole_float_in_integer_column_is_cast() {
        let config = small_config();
        let df = df!(
            "original_title" => ["A", "B"],
            "budget" => [Some(3.0f64), None],
            "runtime" => [90.0, 80.0],
        )
        .unwrap();
        let raw = MovieLoader::new(&config).from_frame(df).unwrap();
        let budget = raw.frame().column("budget").unwrap().i64().unwrap();
        assert_eq!(budget.get(0), Some(3));
        assert_eq!(budget.get(1), None);
    }

    #[test]
    fn integer_parsing_accepts_whole_floats_only() {
        assert_eq!(parse_integer("42"), Some(42));
        assert_eq!(parse_integer("42.0"), Some(42));
        assert_eq!(parse_integer("42.5"), None);
        assert_eq!(parse_integer("n/a"), None);
    }
}
