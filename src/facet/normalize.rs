//! Raw aggregate rows to the public facet shape.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use tracing::debug;

use super::config::{FacetConfig, FacetKind, RangeHints};
use super::label::title_label;
use super::rows::{FacetRows, ListAggregateRow, RangeAggregateRow};
use crate::value::SqlValue;

/// A range bound, bare or wrapped in its configured hint object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RangeBound {
    Value(Number),
    Hinted(Map<String, Value>),
}

impl RangeBound {
    fn new(value: Number, hint: Option<&Map<String, Value>>) -> Self {
        match hint {
            Some(hint) => {
                let mut wrapped = hint.clone();
                wrapped.insert("value".to_string(), Value::Number(value));
                RangeBound::Hinted(wrapped)
            }
            None => RangeBound::Value(value),
        }
    }

    /// The numeric bound regardless of wrapping.
    pub fn value(&self) -> Option<&Number> {
        match self {
            RangeBound::Value(n) => Some(n),
            RangeBound::Hinted(map) => map.get("value").and_then(Value::as_number),
        }
    }
}

/// One value of a list facet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetItem {
    pub value: Value,
    pub label: String,
    pub count: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FacetData {
    Range {
        min: RangeBound,
        max: RangeBound,
        count: i64,
    },
    List {
        items: Vec<FacetItem>,
    },
}

/// One facet as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FacetResultFields")]
pub struct FacetResult {
    pub key: String,
    #[serde(rename = "type")]
    pub kind: FacetKind,
    pub title: String,
    /// Every record of the filtered set has a value for this attribute, so
    /// filtering on it cannot narrow the set.
    pub full_set: bool,
    #[serde(flatten)]
    pub data: FacetData,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Wire shape of a [`FacetResult`]: data and extra keys share one level,
/// so they are split apart after parsing.
#[derive(Deserialize)]
struct FacetResultFields {
    key: String,
    #[serde(rename = "type")]
    kind: FacetKind,
    title: String,
    full_set: bool,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

impl TryFrom<FacetResultFields> for FacetResult {
    type Error = serde_json::Error;

    fn try_from(fields: FacetResultFields) -> Result<Self, Self::Error> {
        let mut extra = fields.rest;
        let data_keys: &[&str] = if extra.contains_key("items") {
            &["items"]
        } else {
            &["min", "max", "count"]
        };
        let data: Map<String, Value> = data_keys
            .iter()
            .filter_map(|k| extra.remove(*k).map(|v| (k.to_string(), v)))
            .collect();

        Ok(Self {
            key: fields.key,
            kind: fields.kind,
            title: fields.title,
            full_set: fields.full_set,
            data: serde_json::from_value(Value::Object(data))?,
            extra,
        })
    }
}

impl FacetResult {
    pub fn items(&self) -> Option<&[FacetItem]> {
        match &self.data {
            FacetData::List { items } => Some(items),
            FacetData::Range { .. } => None,
        }
    }
}

/// Builds facet results in config order, dropping facets that carry no
/// usable information.
pub fn normalize(rows: &FacetRows, configs: &[FacetConfig], max_values: usize) -> Vec<FacetResult> {
    let total = rows.ranges.total;
    let mut results = Vec::with_capacity(configs.len());

    for config in configs {
        let Some(kind) = config.kind.clone() else {
            continue;
        };

        let normalized = match &kind {
            FacetKind::Range => normalize_range(config, &rows.ranges),
            FacetKind::List => normalize_list(config, rows.lists.get(&config.key), max_values),
            FacetKind::Other(_) => None,
        };
        let Some((data, contributing)) = normalized else {
            debug!(key = %config.key, kind = %kind, "facet dropped");
            continue;
        };

        results.push(FacetResult {
            key: config.key.clone(),
            kind,
            title: config
                .title
                .clone()
                .unwrap_or_else(|| title_label(&config.key)),
            full_set: contributing == total,
            data,
            extra: config.extra.clone(),
        });
    }

    results
}

fn normalize_range(config: &FacetConfig, ranges: &RangeAggregateRow) -> Option<(FacetData, i64)> {
    let aggregate = ranges.facet(&config.key)?;
    let count = aggregate.count.filter(|c| *c != 0)?;
    let min = aggregate.min.clone()?;
    let max = aggregate.max.clone()?;

    let hints = config.range_hints().cloned().unwrap_or_else(RangeHints::default);
    let data = FacetData::Range {
        min: RangeBound::new(min, hints.min.as_ref()),
        max: RangeBound::new(max, hints.max.as_ref()),
        count,
    };
    Some((data, count))
}

fn normalize_list(
    config: &FacetConfig,
    rows: Option<&Vec<ListAggregateRow>>,
    max_values: usize,
) -> Option<(FacetData, i64)> {
    let rows = rows?;
    if rows.is_empty() || rows.len() > max_values {
        return None;
    }

    let mut sum = 0;
    let items = match config.value_options() {
        Some(options) => options
            .iter()
            .filter_map(|option| {
                let row = rows.iter().find(|r| r.value.matches_json(&option.value))?;
                sum += row.count;
                Some(FacetItem {
                    value: option.value.clone(),
                    label: option
                        .label
                        .clone()
                        .unwrap_or_else(|| title_label(&SqlValue::from(&option.value).to_label_source())),
                    count: row.count,
                    extra: option.extra.clone(),
                })
            })
            .collect(),
        None => rows
            .iter()
            .map(|row| {
                sum += row.count;
                FacetItem {
                    value: row.value.to_json(),
                    label: title_label(&row.value.to_label_source()),
                    count: row.count,
                    extra: Map::new(),
                }
            })
            .collect(),
    };

    Some((FacetData::List { items }, sum))
}
