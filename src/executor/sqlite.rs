// SQLite executor
//
// SQLite values are dynamically typed, so columns are decoded by the storage
// class of each value rather than the declared column type.

use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqlitePool, SqliteRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use tracing::debug;

use super::{decode_error, SqlExecutor};
use crate::error::Result;
use crate::query::Statement;
use crate::value::{RawRow, SqlValue};

#[async_trait]
impl SqlExecutor for SqlitePool {
    async fn fetch_all(&self, statement: &Statement) -> Result<Option<Vec<RawRow>>> {
        debug!(sql = %statement.sql, parameters = statement.parameters.len(), "executing statement");

        let mut query = sqlx::query(&statement.sql);
        for value in &statement.parameters {
            query = bind_value(query, value);
        }

        let rows = query.fetch_all(self).await?;
        rows.iter()
            .map(decode_row)
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }
}

fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &SqlValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Bool(b) => query.bind(*b),
        SqlValue::Int(i) => query.bind(*i),
        SqlValue::Float(f) => query.bind(*f),
        SqlValue::Decimal(s) => match s.parse::<f64>() {
            Ok(f) => query.bind(f),
            Err(_) => query.bind(s.clone()),
        },
        SqlValue::Text(s) => query.bind(s.clone()),
        SqlValue::Json(v) => query.bind(v.to_string()),
    }
}

fn decode_row(row: &SqliteRow) -> Result<RawRow> {
    let mut out = RawRow::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let name = column.name();
        let raw = row.try_get_raw(idx).map_err(|e| decode_error(name, e))?;
        if raw.is_null() {
            out.push(name, SqlValue::Null);
            continue;
        }

        let storage = raw.type_info().name().to_string();
        let value = match storage.as_str() {
            "INTEGER" | "BOOLEAN" => SqlValue::Int(row.try_get::<i64, _>(idx).map_err(|e| decode_error(name, e))?),
            "REAL" | "NUMERIC" => SqlValue::Float(row.try_get::<f64, _>(idx).map_err(|e| decode_error(name, e))?),
            _ => SqlValue::Text(
                row.try_get_unchecked::<String, _>(idx)
                    .map_err(|e| decode_error(name, e))?,
            ),
        };
        out.push(name, value);
    }
    Ok(out)
}
