//! Pipeline Configuration Module
//! Column names, parsing rules and report sizes, loadable from JSON.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// What to do with a date cell that cannot be parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatePolicy {
    /// Abort the run with an error naming the row.
    #[default]
    Fail,
    /// Remove the row from the table.
    DropRow,
    /// Keep the row with a missing date.
    Null,
}

/// Settings for loading, cleaning and reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub drop_columns: Vec<String>,
    pub integer_columns: Vec<String>,
    pub float_columns: Vec<String>,
    /// Columns the input header must contain.
    pub required_columns: Vec<String>,
    pub date_column: String,
    /// chrono format strings, tried in order.
    pub date_formats: Vec<String>,
    pub date_policy: DatePolicy,
    pub year_column: String,
    pub categorical_columns: Vec<String>,
    pub label_delimiter: char,
    /// Runtimes at or below this many minutes are ignored by the runtime trend.
    pub min_plausible_runtime: f64,
    pub top_n: usize,
    pub top_directors: usize,
}

fn strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            drop_columns: strings(&[
                "homepage",
                "imdb_id",
                "tagline",
                "budget_adj",
                "revenue_adj",
                "overview",
            ]),
            integer_columns: strings(&["id", "budget", "revenue", "vote_count", "release_year"]),
            float_columns: strings(&["popularity", "runtime", "vote_average"]),
            required_columns: strings(&[
                "original_title",
                "budget",
                "revenue",
                "runtime",
                "release_year",
                "release_date",
                "vote_count",
                "cast",
                "director",
                "keywords",
                "genres",
                "production_companies",
            ]),
            date_column: "release_date".to_string(),
            date_formats: strings(&["%m/%d/%y", "%m/%d/%Y", "%Y-%m-%d"]),
            date_policy: DatePolicy::Fail,
            year_column: "release_year".to_string(),
            categorical_columns: strings(&[
                "original_title",
                "cast",
                "director",
                "keywords",
                "genres",
                "production_companies",
                "release_year",
            ]),
            label_delimiter: '|',
            min_plausible_runtime: 40.0,
            top_n: 5,
            top_directors: 10,
        }
    }
}

impl PipelineConfig {
    /// Load a config from a JSON file; omitted fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.date_formats.is_empty() {
            return Err(ConfigError::Invalid("date_formats must not be empty".into()));
        }
        if self.top_n == 0 {
            return Err(ConfigError::Invalid("top_n must be at least 1".into()));
        }
        if self.top_directors == 0 {
            return Err(ConfigError::Invalid("top_directors must be at least 1".into()));
        }
        if let Some(name) = self
            .integer_columns
            .iter()
            .find(|name| self.float_columns.contains(name))
        {
            return Err(ConfigError::Invalid(format!(
                "column '{name}' is listed as both integer and float"
            )));
        }
        Ok(())
    }
}
