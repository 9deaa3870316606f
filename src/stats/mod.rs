//! Stats module - descriptive statistics and aggregations

pub mod aggregate;
mod calculator;

pub use aggregate::{
    AggregateError, LossRow, ProfitProfile, ProfitRow, SentinelCounts, YearCount, YearLabel,
    YearValue,
};
pub use calculator::{ColumnSummary, StatsCalculator};
