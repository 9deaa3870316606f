//! Labels module - multi-label column expansion

mod expander;

pub use expander::{FrequencyTable, IndicatorMatrix, LabelCount, LabelError, LabelExpander};
