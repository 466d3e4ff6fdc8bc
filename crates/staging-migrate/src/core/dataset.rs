//! In-memory tabular dataset passed between pipeline stages.

use super::value::SqlValue;
use std::collections::BTreeMap;

/// One row of cells, ordered like the dataset's columns.
pub type Row = Vec<SqlValue>;

/// Named output datasets produced by a transformation.
///
/// Keys are output table names. A target binding whose table is absent from
/// this map is skipped rather than treated as an error.
pub type TransformationOutput = BTreeMap<String, Dataset>;

/// Ordered columns plus rows. The row count is authoritative.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Dataset {
    /// Create an empty dataset with the given columns.
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Create a dataset from columns and rows.
    pub fn with_rows(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// Convenience constructor from string column names.
    pub fn from_parts<S: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        rows: Vec<Row>,
    ) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn push_row(&mut self, row: Row) {
        self.rows.push(row);
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Values of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &SqlValue> + '_> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().filter_map(move |r| r.get(idx)))
    }

    /// True when every row has exactly one cell per column.
    pub fn is_well_formed(&self) -> bool {
        let width = self.columns.len();
        self.rows.iter().all(|r| r.len() == width)
    }

    /// Append `other`'s rows below this dataset's rows.
    ///
    /// Column compatibility is not checked: the first dataset with columns
    /// supplies the column list, and rows are appended as they are.
    #[must_use]
    pub fn vstack(mut self, other: Dataset) -> Dataset {
        if self.columns.is_empty() {
            self.columns = other.columns;
        }
        self.rows.extend(other.rows);
        self
    }

    /// Concatenate datasets row-wise in order.
    pub fn concat(datasets: impl IntoIterator<Item = Dataset>) -> Dataset {
        datasets
            .into_iter()
            .fold(Dataset::default(), |acc, next| acc.vstack(next))
    }
}
