//! Report Module
//! Runs the cleaning pipeline and answers the analysis questions.

use crate::config::PipelineConfig;
use crate::data::{
    CleanError, CleanMovies, CleaningPipeline, CleaningSummary, LoaderError, MovieLoader,
    RawMovies,
};
use crate::labels::{LabelCount, LabelError, LabelExpander};
use crate::stats::aggregate::{self, DIRECTOR, GENRES, VOTE_COUNT};
use crate::stats::{
    AggregateError, ColumnSummary, LossRow, ProfitProfile, ProfitRow, SentinelCounts,
    StatsCalculator, YearCount, YearLabel, YearValue,
};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ReportError {
    #[error(transparent)]
    Loader(#[from] LoaderError),
    #[error(transparent)]
    Clean(#[from] CleanError),
    #[error(transparent)]
    Label(#[from] LabelError),
    #[error(transparent)]
    Aggregate(#[from] AggregateError),
}

/// Every result of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovieReport {
    pub cleaning: CleaningSummary,
    /// Rows left in the categorical view.
    pub categorical_rows: usize,
    /// All genres by number of movies.
    pub genre_frequencies: Vec<LabelCount>,
    pub dominant_genre_by_year: Vec<YearLabel>,
    pub top_directors: Vec<LabelCount>,
    pub top_profits: Vec<ProfitRow>,
    pub top_profit_profile: ProfitProfile,
    pub bottom_profits: Vec<LossRow>,
    pub runtime_by_year: Vec<YearValue>,
    pub vote_count_by_year: Vec<YearValue>,
    pub vote_count_summary: ColumnSummary,
    pub releases_by_year: Vec<YearCount>,
    pub sentinels: SentinelCounts,
}

/// Load `path`, clean it and build the report.
pub fn analyze_csv(
    path: impl AsRef<Path>,
    config: &PipelineConfig,
) -> Result<MovieReport, ReportError> {
    let raw = MovieLoader::new(config).load_csv(path)?;
    build_report(raw, config)
}

/// Clean `raw` and build the report.
pub fn build_report(raw: RawMovies, config: &PipelineConfig) -> Result<MovieReport, ReportError> {
    let outcome = CleaningPipeline::run(raw, config)?;
    analyze(&outcome.movies, outcome.summary, config)
}

/// Answer the questions over an already clean table.
pub fn analyze(
    movies: &CleanMovies,
    cleaning: CleaningSummary,
    config: &PipelineConfig,
) -> Result<MovieReport, ReportError> {
    let expander = LabelExpander::new(config.label_delimiter);
    let df = movies.frame();
    let year = config.year_column.as_str();

    // Genre questions run on the categorical view, like the rest of the
    // per-genre analysis; everything else uses the full table.
    let view = movies.categorical_view(&config.categorical_columns)?;
    let genre_frequencies = expander.column_frequencies(view.frame(), GENRES)?.ranked();
    let dominant_genre_by_year =
        aggregate::dominant_label_by_year(view.frame(), year, GENRES, &expander)?;

    let top_directors = aggregate::top_k_labels(df, DIRECTOR, config.top_directors, &expander)?;

    let top_profits = aggregate::top_by_profit(df, config.top_n)?;
    let top_profit_profile = aggregate::profit_profile(&top_profits, &expander);
    let bottom_profits = aggregate::bottom_by_profit(df, config.top_n)?;

    let runtime_by_year = aggregate::mean_runtime_by_year(df, year, config.min_plausible_runtime)?;
    let vote_count_by_year = aggregate::sum_by_year(df, year, VOTE_COUNT)?;
    let vote_count_summary = StatsCalculator::describe(df, VOTE_COUNT)?;
    let releases_by_year = aggregate::count_by_year(df, year)?;

    let sentinels = aggregate::sentinel_counts(df)?;
    if sentinels.zero_budget > 0 || sentinels.zero_revenue > 0 {
        warn!(
            zero_budget = sentinels.zero_budget,
            zero_revenue = sentinels.zero_revenue,
            "zero budgets/revenues are kept as values; profits include them"
        );
    }

    info!(
        genres = genre_frequencies.len(),
        years = releases_by_year.len(),
        "analysis complete"
    );

    Ok(MovieReport {
        cleaning,
        categorical_rows: view.frame().height(),
        genre_frequencies,
        dominant_genre_by_year,
        top_directors,
        top_profits,
        top_profit_profile,
        bottom_profits,
        runtime_by_year,
        vote_count_by_year,
        vote_count_summary,
        releases_by_year,
        sentinels,
    })
}
