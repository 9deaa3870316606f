//! Movie EDA - cleaning and categorical aggregation of movie metadata
//!
//! Loads a TMDB-style CSV export, cleans it through a fixed sequence of typed
//! stages and returns genre, director, profit and per-year results as plain
//! serialisable values.

pub mod config;
pub mod data;
pub mod labels;
pub mod report;
pub mod stats;

pub use config::{ConfigError, DatePolicy, PipelineConfig};
pub use report::{analyze, analyze_csv, build_report, MovieReport, ReportError};
