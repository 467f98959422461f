// MySQL executor
//
// Same contract as the Postgres executor. MySQL reports unsigned integer
// columns separately, and COUNT/SUM results come back as BIGINT or DECIMAL.

use async_trait::async_trait;
use sqlx::mysql::{MySql, MySqlArguments, MySqlPool, MySqlRow};
use sqlx::query::Query;
use sqlx::{Column, Decode, Row, Type, TypeInfo, ValueRef};
use tracing::debug;

use super::{decode_error, SqlExecutor};
use crate::error::Result;
use crate::query::Statement;
use crate::value::{RawRow, SqlValue};

#[async_trait]
impl SqlExecutor for MySqlPool {
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
    query: Query<'q, MySql, MySqlArguments>,
    value: &SqlValue,
) -> Query<'q, MySql, MySqlArguments> {
    match value {
        SqlValue::Null => query.bind(None::<String>),
        SqlValue::Bool(b) => query.bind(*b),
        SqlValue::Int(i) => query.bind(*i),
        SqlValue::Float(f) => query.bind(*f),
        // MySQL coerces string parameters against DECIMAL columns
        SqlValue::Decimal(s) | SqlValue::Text(s) => query.bind(s.clone()),
        SqlValue::Json(v) => query.bind(sqlx::types::Json(v.clone())),
    }
}

fn get<'r, T>(row: &'r MySqlRow, idx: usize, column: &str) -> Result<Option<T>>
where
    T: Decode<'r, MySql> + Type<MySql>,
{
    row.try_get::<Option<T>, _>(idx)
        .map_err(|e| decode_error(column, e))
}

fn decode_row(row: &MySqlRow) -> Result<RawRow> {
    let mut out = RawRow::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let name = column.name();
        let raw = row.try_get_raw(idx).map_err(|e| decode_error(name, e))?;
        if raw.is_null() {
            out.push(name, SqlValue::Null);
            continue;
        }

        let type_name = column.type_info().name();
        let value = match type_name {
            "BOOLEAN" => SqlValue::from(get::<bool>(row, idx, name)?),
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
                SqlValue::from(get::<i64>(row, idx, name)?)
            }
            t if t.ends_with("UNSIGNED") => match get::<u64>(row, idx, name)? {
                Some(u) => match i64::try_from(u) {
                    Ok(i) => SqlValue::Int(i),
                    Err(_) => SqlValue::Decimal(u.to_string()),
                },
                None => SqlValue::Null,
            },
            "FLOAT" => SqlValue::from(get::<f32>(row, idx, name)?.map(f64::from)),
            "DOUBLE" => SqlValue::from(get::<f64>(row, idx, name)?),
            "DECIMAL" => decode_decimal(row, idx, name)?,
            "JSON" => get::<serde_json::Value>(row, idx, name)?
                .map(SqlValue::Json)
                .unwrap_or(SqlValue::Null),
            "DATETIME" | "TIMESTAMP" | "DATE" | "TIME" => decode_temporal(row, idx, name, type_name)?,
            _ => SqlValue::from(get::<String>(row, idx, name)?),
        };
        out.push(name, value);
    }
    Ok(out)
}

#[cfg(feature = "decimal")]
fn decode_decimal(row: &MySqlRow, idx: usize, name: &str) -> Result<SqlValue> {
    Ok(get::<rust_decimal::Decimal>(row, idx, name)?
        .map(|d| SqlValue::Decimal(d.normalize().to_string()))
        .unwrap_or(SqlValue::Null))
}

#[cfg(not(feature = "decimal"))]
fn decode_decimal(_row: &MySqlRow, _idx: usize, name: &str) -> Result<SqlValue> {
    Err(decode_error(name, "DECIMAL columns require the `decimal` feature"))
}

#[cfg(feature = "chrono")]
fn decode_temporal(row: &MySqlRow, idx: usize, name: &str, type_name: &str) -> Result<SqlValue> {
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

    let text = match type_name {
        "TIMESTAMP" => get::<DateTime<Utc>>(row, idx, name)?.map(|v| v.to_rfc3339()),
        "DATETIME" => get::<NaiveDateTime>(row, idx, name)?.map(|v| v.to_string()),
        "DATE" => get::<NaiveDate>(row, idx, name)?.map(|v| v.to_string()),
        _ => get::<NaiveTime>(row, idx, name)?.map(|v| v.to_string()),
    };
    Ok(SqlValue::from(text))
}

#[cfg(not(feature = "chrono"))]
fn decode_temporal(_row: &MySqlRow, _idx: usize, name: &str, _type_name: &str) -> Result<SqlValue> {
    Err(decode_error(name, "date/time columns require the `chrono` feature"))
}
