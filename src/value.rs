// Parameter and result values
//
// A single dynamically typed value crosses the boundary in both directions:
// filter parameters are bound as `SqlValue`, and every column of every raw
// result row is decoded into one.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::{Number, Value};

/// A value bound to, or decoded from, a SQL statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// NUMERIC/DECIMAL kept as its exact textual form
    Decimal(String),
    Text(String),
    Json(Value),
}

impl SqlValue {
    /// Numeric view of the value. Text and decimal strings are parsed;
    /// null, booleans and JSON are not numbers.
    pub fn as_f64(&self) -> Option<f64> {
        let v = match self {
            SqlValue::Int(i) => *i as f64,
            SqlValue::Float(f) => *f,
            SqlValue::Decimal(s) | SqlValue::Text(s) => s.trim().parse::<f64>().ok()?,
            SqlValue::Null | SqlValue::Bool(_) | SqlValue::Json(_) => return None,
        };
        v.is_finite().then_some(v)
    }

    /// Integer view, used for COUNT columns which some drivers return as
    /// DECIMAL or text.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(i) => Some(*i),
            SqlValue::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            SqlValue::Decimal(s) | SqlValue::Text(s) => {
                let s = s.trim();
                s.parse::<i64>().ok().or_else(|| {
                    let f = s.parse::<f64>().ok()?;
                    (f.fract() == 0.0 && f.is_finite()).then_some(f as i64)
                })
            }
            _ => None,
        }
    }

    /// JSON number preserving integers where possible.
    pub fn as_number(&self) -> Option<Number> {
        match self {
            SqlValue::Int(i) => Some(Number::from(*i)),
            SqlValue::Float(f) => Number::from_f64(*f),
            SqlValue::Decimal(s) | SqlValue::Text(s) => {
                let s = s.trim();
                match s.parse::<i64>() {
                    Ok(i) => Some(Number::from(i)),
                    Err(_) => Number::from_f64(self.as_f64()?),
                }
            }
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            SqlValue::Null => Value::Null,
            SqlValue::Bool(b) => Value::Bool(*b),
            SqlValue::Int(i) => Value::from(*i),
            SqlValue::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
            SqlValue::Decimal(s) | SqlValue::Text(s) => Value::String(s.clone()),
            SqlValue::Json(v) => v.clone(),
        }
    }

    /// Plain text form used for labelling. Null renders as the empty string.
    pub fn to_label_source(&self) -> String {
        match self {
            SqlValue::Null => String::new(),
            SqlValue::Bool(b) => b.to_string(),
            SqlValue::Int(i) => i.to_string(),
            SqlValue::Float(f) => f.to_string(),
            SqlValue::Decimal(s) | SqlValue::Text(s) => s.clone(),
            SqlValue::Json(v) => match v {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            },
        }
    }

    /// Whether a grouped raw value equals a configured JSON value.
    ///
    /// Booleans also match 0/1, since several backends store them as integers.
    pub fn matches_json(&self, expected: &Value) -> bool {
        match (self, expected) {
            (SqlValue::Null, Value::Null) => true,
            (SqlValue::Bool(b), Value::Bool(e)) => b == e,
            (SqlValue::Bool(b), Value::Number(n)) => n.as_i64() == Some(*b as i64),
            (SqlValue::Int(i), Value::Bool(e)) => *i == *e as i64,
            (SqlValue::Int(_) | SqlValue::Float(_) | SqlValue::Decimal(_), Value::Number(n)) => {
                match (self.as_f64(), n.as_f64()) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                }
            }
            (SqlValue::Decimal(s) | SqlValue::Text(s), Value::String(e)) => s == e,
            (SqlValue::Json(v), e) => v == e,
            _ => false,
        }
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Int(v as i64)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<u32> for SqlValue {
    fn from(v: u32) -> Self {
        SqlValue::Int(v as i64)
    }
}

impl From<usize> for SqlValue {
    fn from(v: usize) -> Self {
        SqlValue::Int(v as i64)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl<'a> From<&'a str> for SqlValue {
    fn from(v: &'a str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

#[cfg(feature = "decimal")]
impl From<rust_decimal::Decimal> for SqlValue {
    fn from(v: rust_decimal::Decimal) -> Self {
        SqlValue::Decimal(v.to_string())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

impl From<&Value> for SqlValue {
    fn from(v: &Value) -> Self {
        match v {
            Value::Null => SqlValue::Null,
            Value::Bool(b) => SqlValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => SqlValue::Int(i),
                None => n.as_f64().map(SqlValue::Float).unwrap_or(SqlValue::Null),
            },
            Value::String(s) => SqlValue::Text(s.clone()),
            other => SqlValue::Json(other.clone()),
        }
    }
}

/// One result row as ordered `(column, value)` pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    pairs: Vec<(String, SqlValue)>,
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, column: impl Into<String>, value: impl Into<SqlValue>) {
        self.pairs.push((column.into(), value.into()));
    }

    /// Chainable variant of [`RawRow::push`].
    pub fn with(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.push(column, value);
        self
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.pairs.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.pairs.iter().map(|(c, _)| c.as_str())
    }

    pub fn into_pairs(self) -> Vec<(String, SqlValue)> {
        self.pairs
    }
}

impl Serialize for RawRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.pairs.len()))?;
        for (column, value) in &self.pairs {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

impl FromIterator<(String, SqlValue)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (String, SqlValue)>>(iter: I) -> Self {
        Self {
            pairs: iter.into_iter().collect(),
        }
    }
}
