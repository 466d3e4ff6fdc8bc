//! Full-table reads into [`Dataset`]s.

use sqlx::mysql::{MySqlPool, MySqlRow};
use sqlx::{Column, Executor, Row, Statement, TypeInfo, ValueRef};
use tracing::info;

use super::quote_table;
use crate::core::{Dataset, SqlValue};
use crate::error::{MigrateError, Result};

/// Read every row of `table`.
pub(super) async fn load_table(pool: &MySqlPool, service: &str, table: &str) -> Result<Dataset> {
    let target = format!("{}.{}", service, table);
    let sql = format!("SELECT * FROM {}", quote_table(table));

    let rows: Vec<MySqlRow> = sqlx::query(&sql)
        .fetch_all(pool)
        .await
        .map_err(|e| MigrateError::data_access(&target, e))?;

    let (columns, type_names) = match rows.first() {
        Some(first) => describe_row(first),
        None => {
            // No rows to read column metadata from; ask the server instead.
            let statement = pool
                .prepare(sql.as_str())
                .await
                .map_err(|e| MigrateError::data_access(&target, e))?;
            statement
                .columns()
                .iter()
                .map(|c| (c.name().to_string(), c.type_info().name().to_string()))
                .unzip()
        }
    };

    let mut dataset = Dataset::new(columns);
    for row in &rows {
        let values = type_names
            .iter()
            .enumerate()
            .map(|(idx, ty)| decode_cell(row, idx, ty))
            .collect::<std::result::Result<Vec<_>, sqlx::Error>>()
            .map_err(|e| MigrateError::data_access(&target, e))?;
        dataset.push_row(values);
    }

    info!("Loaded {} rows from {}", dataset.len(), target);
    Ok(dataset)
}

fn describe_row(row: &MySqlRow) -> (Vec<String>, Vec<String>) {
    row.columns()
        .iter()
        .map(|c| (c.name().to_string(), c.type_info().name().to_string()))
        .unzip()
}

/// How a column's cells are decoded, from the type name the server reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Bool,
    Signed,
    Unsigned,
    Year,
    Float,
    Double,
    Decimal,
    Date,
    Time,
    DateTime,
    Binary,
    Text,
}

impl CellKind {
    fn from_type_name(type_name: &str) -> Self {
        match type_name.to_uppercase().as_str() {
            "BOOLEAN" => CellKind::Bool,
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => CellKind::Signed,
            "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
            | "BIGINT UNSIGNED" => CellKind::Unsigned,
            // Sent as a 2-byte integer in the binary protocol, never as text.
            "YEAR" => CellKind::Year,
            "FLOAT" => CellKind::Float,
            "DOUBLE" => CellKind::Double,
            "DECIMAL" => CellKind::Decimal,
            "DATE" => CellKind::Date,
            "TIME" => CellKind::Time,
            "DATETIME" | "TIMESTAMP" => CellKind::DateTime,
            "BINARY" | "VARBINARY" | "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" => {
                CellKind::Binary
            }
            // CHAR, VARCHAR, TEXT, ENUM, SET, JSON, BIT and anything newer.
            _ => CellKind::Text,
        }
    }
}

/// Convert one MySQL cell by its reported column type.
fn decode_cell(
    row: &MySqlRow,
    idx: usize,
    type_name: &str,
) -> std::result::Result<SqlValue, sqlx::Error> {
    if row.try_get_raw(idx)?.is_null() {
        return Ok(SqlValue::Null);
    }

    let value = match CellKind::from_type_name(type_name) {
        CellKind::Bool => SqlValue::Bool(row.try_get::<bool, _>(idx)?),
        CellKind::Signed => SqlValue::I64(row.try_get::<i64, _>(idx)?),
        CellKind::Unsigned => SqlValue::U64(row.try_get::<u64, _>(idx)?),
        CellKind::Year => SqlValue::U64(u64::from(row.try_get::<u16, _>(idx)?)),
        CellKind::Float => SqlValue::F64(f64::from(row.try_get::<f32, _>(idx)?)),
        CellKind::Double => SqlValue::F64(row.try_get::<f64, _>(idx)?),
        CellKind::Decimal => SqlValue::Decimal(row.try_get::<rust_decimal::Decimal, _>(idx)?),
        CellKind::Date => SqlValue::Date(row.try_get::<chrono::NaiveDate, _>(idx)?),
        CellKind::Time => SqlValue::Time(row.try_get::<chrono::NaiveTime, _>(idx)?),
        CellKind::DateTime => SqlValue::DateTime(row.try_get::<chrono::NaiveDateTime, _>(idx)?),
        CellKind::Binary => SqlValue::Bytes(row.try_get::<Vec<u8>, _>(idx)?),
        CellKind::Text => match row.try_get::<String, _>(idx) {
            Ok(s) => SqlValue::Text(s),
            Err(_) => {
                let bytes = row.try_get_unchecked::<Vec<u8>, _>(idx)?;
                match String::from_utf8(bytes) {
                    Ok(s) => SqlValue::Text(s),
                    Err(e) => SqlValue::Bytes(e.into_bytes()),
                }
            }
        },
    };

    Ok(value)
}
