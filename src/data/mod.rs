//! Data module - CSV loading and cleaning

pub mod dates;
mod loader;
mod processor;

pub use loader::{check_required, coerce_numeric_columns, LoaderError, MovieLoader};
pub use processor::{
    null_counts, CategoricalView, CleanError, CleanMovies, CleanOutcome, CleaningPipeline,
    CleaningSummary, ColumnFill, DateOptions, DateReport, FillReport, FilledMovies, RawMovies,
    TrimmedMovies, UniqueMovies,
};
