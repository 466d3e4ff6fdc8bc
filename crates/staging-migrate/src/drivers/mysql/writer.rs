//! Appends [`Dataset`]s with batched multi-row INSERTs.

use sqlx::mysql::{MySql, MySqlArguments, MySqlPool};
use sqlx::query::Query;
use tracing::debug;

use super::{quote_ident, quote_table};
use crate::core::{Dataset, SqlValue};
use crate::error::{MigrateError, Result};

/// MySQL max placeholders per prepared statement.
const MYSQL_MAX_PLACEHOLDERS: usize = 65_535;

/// Append every row of `dataset` to `table` inside one transaction.
///
/// Existing rows are never touched. Returns the number of rows inserted.
pub(super) async fn append_rows(
    pool: &MySqlPool,
    service: &str,
    table: &str,
    dataset: &Dataset,
) -> Result<u64> {
    let target = format!("{}.{}", service, table);

    let num_cols = dataset.columns().len();
    if num_cols == 0 {
        return Err(MigrateError::data_access(&target, "dataset has no columns"));
    }
    if !dataset.is_well_formed() {
        return Err(MigrateError::data_access(
            &target,
            format!("rows do not match the {} dataset columns", num_cols),
        ));
    }

    let insert = InsertStatement::new(table, dataset.columns());

    let mut tx = pool
        .begin()
        .await
        .map_err(|e| MigrateError::data_access(&target, e))?;

    for chunk in dataset.rows().chunks(insert.rows_per_batch) {
        let sql = insert.sql(chunk.len());
        let mut query = sqlx::query(&sql);
        for value in chunk.iter().flatten() {
            query = bind_value(query, value);
        }

        query
            .execute(&mut *tx)
            .await
            .map_err(|e| MigrateError::data_access(&target, format!("INSERT batch: {}", e)))?;
    }

    tx.commit()
        .await
        .map_err(|e| MigrateError::data_access(&target, e))?;

    debug!("MySQL: wrote {} rows to {}", dataset.len(), target);
    Ok(dataset.len() as u64)
}

/// Multi-row INSERT text for one table, sized to the placeholder limit.
struct InsertStatement {
    prefix: String,
    row_placeholders: String,
    rows_per_batch: usize,
}

impl InsertStatement {
    fn new(table: &str, columns: &[String]) -> Self {
        let col_list = columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let num_cols = columns.len().max(1);

        Self {
            prefix: format!("INSERT INTO {} ({}) VALUES ", quote_table(table), col_list),
            row_placeholders: format!("({})", vec!["?"; num_cols].join(", ")),
            rows_per_batch: (MYSQL_MAX_PLACEHOLDERS / num_cols).max(1),
        }
    }

    fn sql(&self, rows: usize) -> String {
        let mut sql = self.prefix.clone();
        sql.push_str(&vec![self.row_placeholders.as_str(); rows].join(", "));
        sql
    }
}

fn bind_value<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    value: &'q SqlValue,
) -> Query<'q, MySql, MySqlArguments> {
    match value {
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Bool(v) => query.bind(*v),
        SqlValue::I64(v) => query.bind(*v),
        SqlValue::U64(v) => query.bind(*v),
        SqlValue::F64(v) => query.bind(*v),
        SqlValue::Decimal(v) => query.bind(*v),
        SqlValue::Text(v) => query.bind(v.as_str()),
        SqlValue::Bytes(v) => query.bind(v.as_slice()),
        SqlValue::Date(v) => query.bind(*v),
        SqlValue::Time(v) => query.bind(*v),
        SqlValue::DateTime(v) => query.bind(*v),
    }
}
