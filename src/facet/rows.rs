//! Typed aggregate rows, parsed from raw backend rows at the executor
//! boundary.

use std::collections::HashMap;

use serde_json::Number;

use crate::error::{Error, Result};
use crate::value::{RawRow, SqlValue};

/// One group of a list facet query.
#[derive(Debug, Clone, PartialEq)]
pub struct ListAggregateRow {
    pub value: SqlValue,
    pub count: i64,
}

impl TryFrom<RawRow> for ListAggregateRow {
    type Error = Error;

    fn try_from(row: RawRow) -> Result<Self> {
        let count = match row.get("count") {
            Some(v) => v.as_i64().ok_or_else(|| Error::Decode {
                column: "count".to_string(),
                reason: format!("not an integer: {:?}", v),
            })?,
            None => return Err(Error::MissingAggregate("count".to_string())),
        };
        let value = row.get("value").cloned().unwrap_or(SqlValue::Null);
        Ok(Self { value, count })
    }
}

/// Per-facet columns of the combined ranges row. Unparsable values are
/// `None` so the normalizer can drop the facet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeAggregate {
    pub count: Option<i64>,
    pub min: Option<Number>,
    pub max: Option<Number>,
}

/// The single row of the combined ranges query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeAggregateRow {
    pub total: i64,
    pub facets: HashMap<String, RangeAggregate>,
}

impl RangeAggregateRow {
    /// Parses `total` plus `count_<key>`, `min_<key>`, `max_<key>` for each
    /// range facet key.
    pub fn parse<S: AsRef<str>>(row: &RawRow, range_keys: &[S]) -> Result<Self> {
        let total = row
            .get("total")
            .ok_or_else(|| Error::MissingAggregate("total".to_string()))?;
        let total = total.as_i64().ok_or_else(|| Error::Decode {
            column: "total".to_string(),
            reason: format!("not an integer: {:?}", total),
        })?;

        let facets = range_keys
            .iter()
            .map(|key| {
                let key = key.as_ref();
                let column = |prefix: &str| row.get(&format!("{}_{}", prefix, key));
                let aggregate = RangeAggregate {
                    count: column("count").and_then(SqlValue::as_i64),
                    min: column("min").and_then(SqlValue::as_number),
                    max: column("max").and_then(SqlValue::as_number),
                };
                (key.to_string(), aggregate)
            })
            .collect();

        Ok(Self { total, facets })
    }

    pub fn facet(&self, key: &str) -> Option<&RangeAggregate> {
        self.facets.get(key)
    }
}

/// Everything a facet request fetched, keyed by facet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FacetRows {
    pub ranges: RangeAggregateRow,
    /// Absent keys mean the backend returned no result for that facet.
    pub lists: HashMap<String, Vec<ListAggregateRow>>,
}
