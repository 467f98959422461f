// PostgreSQL executor
//
// Binds parameters on a `PgPool` query and decodes columns by their declared
// Postgres type name.

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPool, PgRow, Postgres};
use sqlx::query::Query;
use sqlx::{Column, Decode, Row, Type, TypeInfo, ValueRef};
use tracing::debug;

use super::{decode_error, SqlExecutor};
use crate::error::Result;
use crate::query::Statement;
use crate::value::{RawRow, SqlValue};

#[async_trait]
impl SqlExecutor for PgPool {
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
    query: Query<'q, Postgres, PgArguments>,
    value: &SqlValue,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Bool(b) => query.bind(*b),
        SqlValue::Int(i) => query.bind(*i),
        SqlValue::Float(f) => query.bind(*f),
        SqlValue::Decimal(s) => bind_decimal(query, s),
        SqlValue::Text(s) => query.bind(s.clone()),
        SqlValue::Json(v) => query.bind(sqlx::types::Json(v.clone())),
    }
}

// NUMERIC parameters must arrive typed, a TEXT parameter does not compare
// against a NUMERIC column
#[cfg(feature = "decimal")]
fn bind_decimal<'q>(
    query: Query<'q, Postgres, PgArguments>,
    s: &str,
) -> Query<'q, Postgres, PgArguments> {
    match s.parse::<rust_decimal::Decimal>() {
        Ok(d) => query.bind(d),
        Err(_) => query.bind(s.to_string()),
    }
}

#[cfg(not(feature = "decimal"))]
fn bind_decimal<'q>(
    query: Query<'q, Postgres, PgArguments>,
    s: &str,
) -> Query<'q, Postgres, PgArguments> {
    match s.parse::<f64>() {
        Ok(f) => query.bind(f),
        Err(_) => query.bind(s.to_string()),
    }
}

fn get<'r, T>(row: &'r PgRow, idx: usize, column: &str) -> Result<Option<T>>
where
    T: Decode<'r, Postgres> + Type<Postgres>,
{
    row.try_get::<Option<T>, _>(idx)
        .map_err(|e| decode_error(column, e))
}

fn decode_row(row: &PgRow) -> Result<RawRow> {
    let mut out = RawRow::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let name = column.name();
        let raw = row.try_get_raw(idx).map_err(|e| decode_error(name, e))?;
        if raw.is_null() {
            out.push(name, SqlValue::Null);
            continue;
        }

        let value = match column.type_info().name() {
            "BOOL" => SqlValue::from(get::<bool>(row, idx, name)?),
            "INT2" => SqlValue::from(get::<i16>(row, idx, name)?.map(i64::from)),
            "INT4" => SqlValue::from(get::<i32>(row, idx, name)?),
            "INT8" => SqlValue::from(get::<i64>(row, idx, name)?),
            "FLOAT4" => SqlValue::from(get::<f32>(row, idx, name)?.map(f64::from)),
            "FLOAT8" => SqlValue::from(get::<f64>(row, idx, name)?),
            "NUMERIC" => decode_numeric(row, idx, name)?,
            "JSON" | "JSONB" => get::<serde_json::Value>(row, idx, name)?
                .map(SqlValue::Json)
                .unwrap_or(SqlValue::Null),
            "TIMESTAMPTZ" | "TIMESTAMP" | "DATE" | "TIME" => decode_temporal(row, idx, name)?,
            _ => SqlValue::from(get::<String>(row, idx, name)?),
        };
        out.push(name, value);
    }
    Ok(out)
}

#[cfg(feature = "decimal")]
fn decode_numeric(row: &PgRow, idx: usize, name: &str) -> Result<SqlValue> {
    Ok(get::<rust_decimal::Decimal>(row, idx, name)?
        .map(|d| SqlValue::Decimal(d.normalize().to_string()))
        .unwrap_or(SqlValue::Null))
}

#[cfg(not(feature = "decimal"))]
fn decode_numeric(_row: &PgRow, _idx: usize, name: &str) -> Result<SqlValue> {
    Err(decode_error(name, "NUMERIC columns require the `decimal` feature"))
}

#[cfg(feature = "chrono")]
fn decode_temporal(row: &PgRow, idx: usize, name: &str) -> Result<SqlValue> {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

    let text = match row.column(idx).type_info().name() {
        "TIMESTAMPTZ" => get::<DateTime<Utc>>(row, idx, name)?.map(|v| v.to_rfc3339()),
        "TIMESTAMP" => get::<NaiveDateTime>(row, idx, name)?.map(|v| v.to_string()),
        "DATE" => get::<NaiveDate>(row, idx, name)?.map(|v| v.to_string()),
        _ => get::<NaiveTime>(row, idx, name)?.map(|v| v.to_string()),
    };
    Ok(SqlValue::from(text))
}

#[cfg(not(feature = "chrono"))]
fn decode_temporal(_row: &PgRow, _idx: usize, name: &str) -> Result<SqlValue> {
    Err(decode_error(name, "date/time columns require the `chrono` feature"))
}
