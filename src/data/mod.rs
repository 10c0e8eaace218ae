//! Tabular input: loading a CSV dataset, selecting numeric columns and
//! partitioning a series by a categorical column.
//!
//! Missing cells are dropped on selection, so nothing downstream ever sees a
//! missing or non-finite value.

use crate::error::{DataLoadError, Result, StatsError};
use log::{debug, info};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

mod series;

pub use series::{GroupedSeries, Observations, Series};

const MISSING_TOKENS: [&str; 7] = ["", "na", "nan", "n/a", "null", "none", "-"];

/// A fully materialised table of string cells with a header row.
#[derive(Debug, Clone)]
pub struct Dataset {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Dataset {
    /// Load a CSV file, failing if it cannot be read or lacks any of `required_columns`.
    pub fn load(path: &Path, required_columns: &[&str]) -> Result<Self> {
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .map_err(|source| DataLoadError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let dataset = Self::from_csv_reader(reader, required_columns)?;
        info!(
            "loaded {} rows x {} columns from {}",
            dataset.row_count(),
            dataset.headers.len(),
            path.display()
        );
        Ok(dataset)
    }

    pub fn from_reader<R: Read>(input: R, required_columns: &[&str]) -> Result<Self> {
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(input);
        Self::from_csv_reader(reader, required_columns)
    }

    fn from_csv_reader<R: Read>(
        mut reader: csv::Reader<R>,
        required_columns: &[&str],
    ) -> Result<Self> {
        let headers: Vec<String> = reader
            .headers()
            .map_err(DataLoadError::from)?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(DataLoadError::from)?;
            let mut row: Vec<String> = record.iter().map(|cell| cell.trim().to_string()).collect();
            // short rows are padded so every column lookup is in bounds
            row.resize(headers.len(), String::new());
            rows.push(row);
        }

        let dataset = Dataset { headers, rows };
        dataset.require_columns(required_columns)?;
        Ok(dataset)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Fail with `MissingColumns` unless every one of `columns` is present.
    pub fn require_columns(&self, columns: &[&str]) -> Result<()> {
        let missing: Vec<String> = columns
            .iter()
            .filter(|column| !self.headers.iter().any(|h| h == *column))
            .map(|column| column.to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(DataLoadError::MissingColumns(missing).into())
        }
    }

    fn column_index(&self, column: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| DataLoadError::MissingColumns(vec![column.to_string()]).into())
    }

    /// Numeric values of `column` in row order, with missing cells dropped.
    pub fn select(&self, column: &str) -> Result<Series> {
        let idx = self.column_index(column)?;
        let values: Vec<f64> = self
            .rows
            .iter()
            .filter_map(|row| parse_numeric(&row[idx]))
            .collect();
        debug!(
            "selected {} of {} values from '{}'",
            values.len(),
            self.rows.len(),
            column
        );
        Series::new(column, values)
    }

    /// Split `value_column` by the distinct labels of `key_column`.
    ///
    /// Rows missing either the value or the label are dropped.
    pub fn partition(&self, value_column: &str, key_column: &str) -> Result<GroupedSeries> {
        let value_idx = self.column_index(value_column)?;
        let key_idx = self.column_index(key_column)?;

        let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for row in &self.rows {
            let (Some(value), Some(label)) =
                (parse_numeric(&row[value_idx]), parse_label(&row[key_idx]))
            else {
                continue;
            };
            groups.entry(label.to_string()).or_default().push(value);
        }

        // no complete rows means zero groups, reported like any other shortfall
        debug!(
            "partitioned '{}' by '{}' into {} groups",
            value_column,
            key_column,
            groups.len()
        );
        GroupedSeries::new(value_column, key_column, groups)
    }

    /// Two numeric columns with list-wise deletion of incomplete rows.
    pub fn select_paired(&self, x_column: &str, y_column: &str) -> Result<(Series, Series)> {
        let x_idx = self.column_index(x_column)?;
        let y_idx = self.column_index(y_column)?;

        let (xs, ys): (Vec<f64>, Vec<f64>) = self
            .rows
            .iter()
            .filter_map(|row| Some((parse_numeric(&row[x_idx])?, parse_numeric(&row[y_idx])?)))
            .unzip();

        Ok((Series::new(x_column, xs)?, Series::new(y_column, ys)?))
    }

    /// Predictor, response and factor columns with list-wise deletion.
    pub fn select_with_groups(
        &self,
        x_column: &str,
        y_column: &str,
        key_column: &str,
    ) -> Result<Observations> {
        let x_idx = self.column_index(x_column)?;
        let y_idx = self.column_index(y_column)?;
        let key_idx = self.column_index(key_column)?;

        let mut observations = Observations::empty(x_column, y_column, key_column);
        for row in &self.rows {
            let (Some(x), Some(y), Some(label)) = (
                parse_numeric(&row[x_idx]),
                parse_numeric(&row[y_idx]),
                parse_label(&row[key_idx]),
            ) else {
                continue;
            };
            observations.push(x, y, label);
        }

        if observations.is_empty() {
            return Err(StatsError::EmptySeries {
                column: y_column.to_string(),
            });
        }
        Ok(observations)
    }
}

fn is_missing(cell: &str) -> bool {
    let lowered = cell.trim().to_ascii_lowercase();
    MISSING_TOKENS.contains(&lowered.as_str())
}

fn parse_numeric(cell: &str) -> Option<f64> {
    if is_missing(cell) {
        return None;
    }
    cell.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_label(cell: &str) -> Option<&str> {
    if is_missing(cell) { None } else { Some(cell.trim()) }
}
