//! Multi-label Expander Module
//! Turns `|`-joined label lists into frequency tables and indicator columns.

use polars::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LabelError {
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("Label column '{0}' does not exist")]
    MissingColumn(String),
    #[error("Expected {expected} bucket keys, one per row, got {found}")]
    KeyCountMismatch { expected: usize, found: usize },
}

/// One label and the number of rows that carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelCount {
    pub label: String,
    pub count: usize,
}

/// Label counts in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrequencyTable {
    entries: Vec<LabelCount>,
    index: HashMap<String, usize>,
}

impl FrequencyTable {
    fn bump(&mut self, label: &str) {
        match self.index.get(label) {
            Some(&slot) => self.entries[slot].count += 1,
            None => {
                self.index.insert(label.to_string(), self.entries.len());
                self.entries.push(LabelCount {
                    label: label.to_string(),
                    count: 1,
                });
            }
        }
    }

    pub fn get(&self, label: &str) -> Option<usize> {
        self.index.get(label).map(|&slot| self.entries[slot].count)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LabelCount> {
        self.entries.iter()
    }

    /// All labels by count descending; equal counts keep first-seen order.
    pub fn ranked(&self) -> Vec<LabelCount> {
        let mut ranked = self.entries.clone();
        ranked.sort_by(|a, b| b.count.cmp(&a.count));
        ranked
    }

    /// The `k` most frequent labels.
    pub fn top_k(&self, k: usize) -> Vec<LabelCount> {
        let mut ranked = self.ranked();
        ranked.truncate(k);
        ranked
    }
}

/// One 0/1 column per distinct label, aligned with the input rows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndicatorMatrix {
    labels: Vec<String>,
    columns: Vec<Vec<u8>>,
    rows: usize,
}

impl IndicatorMatrix {
    /// Labels in column order (first seen first).
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn column(&self, label: &str) -> Option<&[u8]> {
        self.labels
            .iter()
            .position(|l| l == label)
            .map(|i| self.columns[i].as_slice())
    }

    /// Indicator values of one row, in column order. `None` past the last row.
    pub fn row(&self, row: usize) -> Option<Vec<u8>> {
        (row < self.rows).then(|| self.columns.iter().map(|col| col[row]).collect())
    }

    pub fn row_sum(&self, row: usize) -> Option<usize> {
        (row < self.rows).then(|| self.columns.iter().map(|col| col[row] as usize).sum())
    }

    /// Sum every indicator column per bucket key.
    ///
    /// `keys` holds one entry per matrix row; rows without a key are skipped.
    /// Buckets come back in ascending key order.
    pub fn sum_by<K: Ord + Copy>(
        &self,
        keys: &[Option<K>],
    ) -> Result<Vec<(K, Vec<u64>)>, LabelError> {
        if keys.len() != self.rows {
            return Err(LabelError::KeyCountMismatch {
                expected: self.rows,
                found: keys.len(),
            });
        }

        let mut buckets: std::collections::BTreeMap<K, Vec<u64>> = Default::default();
        for (row, key) in keys.iter().enumerate() {
            let Some(key) = key else {
                continue;
            };
            let sums = buckets
                .entry(*key)
                .or_insert_with(|| vec![0; self.labels.len()]);
            for (sum, col) in sums.iter_mut().zip(&self.columns) {
                *sum += u64::from(col[row]);
            }
        }
        Ok(buckets.into_iter().collect())
    }

    /// The matrix as a Polars frame of Int32 columns named after the labels.
    /// Without labels the frame has no columns but keeps the row count.
    pub fn to_dataframe(&self) -> Result<DataFrame, LabelError> {
        if self.labels.is_empty() {
            return Ok(DataFrame::full_null(&Schema::default(), self.rows));
        }

        let columns: Vec<Column> = self
            .labels
            .iter()
            .zip(&self.columns)
            .map(|(label, values)| {
                let values: Vec<i32> = values.iter().map(|&v| i32::from(v)).collect();
                Column::new(label.as_str().into(), values)
            })
            .collect();
        Ok(DataFrame::new(columns)?)
    }
}

/// Splits label lists on a single delimiter character.
///
/// Empty segments are not labels, and a label repeated within one row
/// counts once for that row.
#[derive(Debug, Clone, Copy)]
pub struct LabelExpander {
    delimiter: char,
}

impl Default for LabelExpander {
    fn default() -> Self {
        Self::new('|')
    }
}

impl LabelExpander {
    pub fn new(delimiter: char) -> Self {
        Self { delimiter }
    }

    /// Distinct non-empty labels of one cell, in order of appearance.
    pub fn split<'a>(&self, cell: &'a str) -> Vec<&'a str> {
        let mut labels: Vec<&str> = Vec::new();
        for label in cell.split(self.delimiter) {
            if !label.is_empty() && !labels.contains(&label) {
                labels.push(label);
            }
        }
        labels
    }

    /// Number of rows each label appears in.
    pub fn frequencies<'a, I>(&self, cells: I) -> FrequencyTable
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let mut table = FrequencyTable::default();
        for cell in cells.into_iter().flatten() {
            for label in self.split(cell) {
                table.bump(label);
            }
        }
        table
    }

    /// Indicator expansion of the cells.
    pub fn indicators<'a, I>(&self, cells: I) -> IndicatorMatrix
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        let mut matrix = IndicatorMatrix::default();
        let mut slots: HashMap<String, usize> = HashMap::new();

        for (row, cell) in cells.into_iter().enumerate() {
            matrix.rows = row + 1;
            for column in matrix.columns.iter_mut() {
                column.push(0);
            }
            let Some(cell) = cell else {
                continue;
            };
            for label in self.split(cell) {
                let slot = match slots.get(label) {
                    Some(&slot) => slot,
                    None => {
                        let slot = matrix.labels.len();
                        slots.insert(label.to_string(), slot);
                        matrix.labels.push(label.to_string());
                        matrix.columns.push(vec![0; row + 1]);
                        slot
                    }
                };
                matrix.columns[slot][row] = 1;
            }
        }

        matrix
    }

    /// [`frequencies`](Self::frequencies) over a text column of `df`.
    pub fn column_frequencies(
        &self,
        df: &DataFrame,
        column: &str,
    ) -> Result<FrequencyTable, LabelError> {
        let cells = text_column(df, column)?;
        Ok(self.frequencies(cells))
    }

    /// [`indicators`](Self::indicators) over a text column of `df`.
    pub fn column_indicators(
        &self,
        df: &DataFrame,
        column: &str,
    ) -> Result<IndicatorMatrix, LabelError> {
        let cells = text_column(df, column)?;
        Ok(self.indicators(cells))
    }
}

fn text_column<'a>(df: &'a DataFrame, column: &str) -> Result<&'a StringChunked, LabelError> {
    let col = df
        .column(column)
        .map_err(|_| LabelError::MissingColumn(column.to_string()))?;
    Ok(col.str()?)
}
