//! Movie EDA - command line wrapper
//!
//! Cleans a TMDB movie export and prints the analysis report as JSON.

use anyhow::{Context, Result};
use clap::Parser;
use movie_eda::{analyze_csv, DatePolicy, PipelineConfig};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "movie-eda")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Movie metadata CSV file
    input: PathBuf,

    /// JSON file overriding the default pipeline settings
    #[arg(short, long, env = "MOVIE_EDA_CONFIG")]
    config: Option<PathBuf>,

    /// Write the report here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of movies in the top/bottom profit lists
    #[arg(long)]
    top: Option<usize>,

    /// Number of directors in the ranking
    #[arg(long)]
    directors: Option<usize>,

    /// Drop rows whose release date cannot be parsed instead of failing
    #[arg(long)]
    drop_bad_dates: bool,

    /// Pretty-print the JSON report
    #[arg(long)]
    pretty: bool,

    /// Log level when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &Args) -> Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    if let Some(top) = args.top {
        config.top_n = top;
    }
    if let Some(directors) = args.directors {
        config.top_directors = directors;
    }
    if args.drop_bad_dates {
        config.date_policy = DatePolicy::DropRow;
    }
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let config = load_config(&args)?;
    let report = analyze_csv(&args.input, &config)
        .with_context(|| format!("analysing {}", args.input.display()))?;

    let json = if args.pretty {
        serde_json::to_string_pretty(&report)?
    } else {
        serde_json::to_string(&report)?
    };

    match &args.output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("writing report to {}", path.display()))?;
            info!(path = %path.display(), "report written");
        }
        None => println!("{json}"),
    }

    Ok(())
}
