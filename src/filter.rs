//! Filter specs and the publication-state normalizer.
//!
//! A [`Filters`] value is an ordered conjunction of predicates over logical
//! attribute names. It compiles into a WHERE fragment against an
//! [`EntityMeta`], resolving attributes to physical columns on the way.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::query::Fragment;
use crate::schema::{EntityMeta, PUBLISHED_AT};
use crate::value::SqlValue;

/// Which records participate in a query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublicationState {
    /// Only published records.
    #[default]
    Live,
    /// Every record regardless of publication status.
    #[serde(alias = "preview")]
    All,
}

/// Comparison applied to one attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOp {
    Eq(SqlValue),
    Ne(SqlValue),
    Lt(SqlValue),
    Lte(SqlValue),
    Gt(SqlValue),
    Gte(SqlValue),
    In(Vec<SqlValue>),
    NotIn(Vec<SqlValue>),
    Contains(String),
    StartsWith(String),
    EndsWith(String),
    Null,
    NotNull,
    /// `column IN (<subquery>)`; the fragment's parameters are bound in place.
    InSubquery(Fragment),
}

/// A predicate tree node.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Field { attribute: String, op: FilterOp },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn field(attribute: &str, op: FilterOp) -> Self {
        Filter::Field {
            attribute: attribute.to_string(),
            op,
        }
    }

    /// Appends this predicate to `out`, qualifying columns with `alias`.
    pub(crate) fn write_sql(&self, meta: &EntityMeta, alias: &str, out: &mut Fragment) -> Result<()> {
        match self {
            Filter::Field { attribute, op } => {
                let column = crate::query::qualify(alias, meta.require_column(attribute)?);
                write_op(&column, op, out);
            }
            Filter::And(children) => write_group(children, " AND ", "1 = 1", meta, alias, out)?,
            Filter::Or(children) => write_group(children, " OR ", "1 = 0", meta, alias, out)?,
            Filter::Not(child) => {
                out.push_sql("NOT (");
                child.write_sql(meta, alias, out)?;
                out.push_sql(")");
            }
        }
        Ok(())
    }
}

fn write_group(
    children: &[Filter],
    joiner: &str,
    empty: &str,
    meta: &EntityMeta,
    alias: &str,
    out: &mut Fragment,
) -> Result<()> {
    if children.is_empty() {
        out.push_sql(empty);
        return Ok(());
    }
    out.push_sql("(");
    for (idx, child) in children.iter().enumerate() {
        if idx > 0 {
            out.push_sql(joiner);
        }
        child.write_sql(meta, alias, out)?;
    }
    out.push_sql(")");
    Ok(())
}

fn write_op(column: &str, op: &FilterOp, out: &mut Fragment) {
    let binary = |out: &mut Fragment, sym: &str, value: &SqlValue| {
        out.push_sql(&format!("{} {} ", column, sym));
        out.push_param(value.clone());
    };

    match op {
        FilterOp::Eq(SqlValue::Null) | FilterOp::Null => out.push_sql(&format!("{} IS NULL", column)),
        FilterOp::Ne(SqlValue::Null) | FilterOp::NotNull => {
            out.push_sql(&format!("{} IS NOT NULL", column))
        }
        FilterOp::Eq(v) => binary(out, "=", v),
        FilterOp::Ne(v) => binary(out, "<>", v),
        FilterOp::Lt(v) => binary(out, "<", v),
        FilterOp::Lte(v) => binary(out, "<=", v),
        FilterOp::Gt(v) => binary(out, ">", v),
        FilterOp::Gte(v) => binary(out, ">=", v),
        FilterOp::In(values) | FilterOp::NotIn(values) if values.is_empty() => {
            let always = if matches!(op, FilterOp::In(_)) { "1 = 0" } else { "1 = 1" };
            out.push_sql(always);
        }
        FilterOp::In(values) | FilterOp::NotIn(values) => {
            let keyword = if matches!(op, FilterOp::In(_)) { "IN" } else { "NOT IN" };
            out.push_sql(&format!("{} {} (", column, keyword));
            for (idx, value) in values.iter().enumerate() {
                if idx > 0 {
                    out.push_sql(", ");
                }
                out.push_param(value.clone());
            }
            out.push_sql(")");
        }
        FilterOp::Contains(s) => binary(out, "LIKE", &SqlValue::Text(format!("%{}%", s))),
        FilterOp::StartsWith(s) => binary(out, "LIKE", &SqlValue::Text(format!("{}%", s))),
        FilterOp::EndsWith(s) => binary(out, "LIKE", &SqlValue::Text(format!("%{}", s))),
        FilterOp::InSubquery(fragment) => {
            out.push_sql(&format!("{} IN (", column));
            out.append(fragment.clone());
            out.push_sql(")");
        }
    }
}

/// Ordered conjunction of predicates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters {
    conditions: Vec<Filter>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> &[Filter] {
        &self.conditions
    }

    pub fn push(&mut self, filter: Filter) {
        self.conditions.push(filter);
    }

    /// Chainable field predicate.
    pub fn with(mut self, attribute: &str, op: FilterOp) -> Self {
        self.push(Filter::field(attribute, op));
        self
    }

    /// Sets the predicate on `attribute`, replacing any top-level one.
    pub fn set(&mut self, attribute: &str, op: FilterOp) {
        let existing = self.conditions.iter_mut().find(
            |f| matches!(f, Filter::Field { attribute: a, .. } if a == attribute),
        );
        match existing {
            Some(Filter::Field { op: slot, .. }) => *slot = op,
            _ => self.push(Filter::field(attribute, op)),
        }
    }

    /// Top-level predicate on `attribute`, if any.
    pub fn get(&self, attribute: &str) -> Option<&FilterOp> {
        self.conditions.iter().find_map(|f| match f {
            Filter::Field { attribute: a, op } if a == attribute => Some(op),
            _ => None,
        })
    }

    /// Compiles to a WHERE body (without the keyword). Empty filters compile
    /// to an empty fragment.
    pub fn to_fragment(&self, meta: &EntityMeta, alias: &str) -> Result<Fragment> {
        let mut out = Fragment::default();
        for (idx, filter) in self.conditions.iter().enumerate() {
            if idx > 0 {
                out.push_sql(" AND ");
            }
            filter.write_sql(meta, alias, &mut out)?;
        }
        Ok(out)
    }

    /// Parses the JSON filter shape used by content APIs:
    ///
    /// ```json
    /// { "price": { "$gte": 10 }, "name": "A", "$or": [{ "color": "red" }, { "color": "blue" }] }
    /// ```
    pub fn from_json(value: &Value) -> Result<Self> {
        Ok(Self {
            conditions: parse_object(value)?,
        })
    }
}

fn parse_object(value: &Value) -> Result<Vec<Filter>> {
    let object = match value {
        Value::Object(object) => object,
        Value::Null => return Ok(Vec::new()),
        other => return Err(Error::InvalidFilter(format!("expected an object, got {}", other))),
    };

    let mut filters = Vec::new();
    for (key, body) in object {
        match key.as_str() {
            "$and" => filters.push(Filter::And(parse_list(key, body)?)),
            "$or" => filters.push(Filter::Or(parse_list(key, body)?)),
            "$not" => filters.push(Filter::Not(Box::new(Filter::And(parse_object(body)?)))),
            op if op.starts_with('$') => {
                return Err(Error::InvalidFilter(format!("unexpected operator {}", op)))
            }
            attribute => filters.extend(parse_field(attribute, body)?),
        }
    }
    Ok(filters)
}

fn parse_list(key: &str, body: &Value) -> Result<Vec<Filter>> {
    let items = body
        .as_array()
        .ok_or_else(|| Error::InvalidFilter(format!("{} expects an array", key)))?;
    items
        .iter()
        .map(|item| parse_object(item).map(Filter::And))
        .collect()
}

fn parse_field(attribute: &str, body: &Value) -> Result<Vec<Filter>> {
    let object = match body {
        Value::Object(object) if object.keys().all(|k| k.starts_with('$')) => object,
        Value::Object(_) => {
            return Err(Error::InvalidFilter(format!(
                "nested filters on {} are not supported",
                attribute
            )))
        }
        scalar => return Ok(vec![Filter::field(attribute, FilterOp::Eq(SqlValue::from(scalar)))]),
    };

    let mut filters = Vec::new();
    for (op, operand) in object {
        let op = match op.as_str() {
            "$eq" => FilterOp::Eq(SqlValue::from(operand)),
            "$ne" => FilterOp::Ne(SqlValue::from(operand)),
            "$lt" => FilterOp::Lt(SqlValue::from(operand)),
            "$lte" => FilterOp::Lte(SqlValue::from(operand)),
            "$gt" => FilterOp::Gt(SqlValue::from(operand)),
            "$gte" => FilterOp::Gte(SqlValue::from(operand)),
            "$in" => FilterOp::In(parse_values(op, operand)?),
            "$notIn" => FilterOp::NotIn(parse_values(op, operand)?),
            "$contains" => FilterOp::Contains(parse_text(op, operand)?),
            "$startsWith" => FilterOp::StartsWith(parse_text(op, operand)?),
            "$endsWith" => FilterOp::EndsWith(parse_text(op, operand)?),
            "$null" => null_op(operand, true),
            "$notNull" => null_op(operand, false),
            "$not" => {
                let inner = parse_field(attribute, operand)?;
                filters.push(Filter::Not(Box::new(Filter::And(inner))));
                continue;
            }
            other => return Err(Error::InvalidFilter(format!("unknown operator {}", other))),
        };
        filters.push(Filter::field(attribute, op));
    }
    Ok(filters)
}

fn parse_values(op: &str, operand: &Value) -> Result<Vec<SqlValue>> {
    match operand {
        Value::Array(items) => Ok(items.iter().map(SqlValue::from).collect()),
        Value::Object(_) => Err(Error::InvalidFilter(format!("{} expects a list", op))),
        scalar => Ok(vec![SqlValue::from(scalar)]),
    }
}

fn parse_text(op: &str, operand: &Value) -> Result<String> {
    match operand {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(Error::InvalidFilter(format!("{} expects a string", op))),
    }
}

fn null_op(operand: &Value, null_when_true: bool) -> FilterOp {
    let truthy = !matches!(operand, Value::Bool(false) | Value::Null)
        && operand.as_str() != Some("false");
    if truthy == null_when_true {
        FilterOp::Null
    } else {
        FilterOp::NotNull
    }
}

/// Injects the live-records predicate unless the caller asked for all records.
///
/// Only entities that declare a publication timestamp are affected.
pub fn normalize_filters(
    meta: &EntityMeta,
    filters: Option<Filters>,
    state: Option<PublicationState>,
) -> Filters {
    let mut filters = filters.unwrap_or_default();

    if state.unwrap_or_default() == PublicationState::Live && meta.has_attribute(PUBLISHED_AT) {
        filters.set(PUBLISHED_AT, FilterOp::NotNull);
    }

    filters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::AttributeType;
    use serde_json::json;

    fn article() -> EntityMeta {
        EntityMeta::new("api::article.article", "articles")
            .attribute_with("id", "id", AttributeType::Integer)
            .attribute_with("title", "title", AttributeType::String)
            .attribute_with("views", "view_count", AttributeType::Integer)
            .attribute_with("publishedAt", "published_at", AttributeType::DateTime)
    }

    #[test]
    fn test_normalize_injects_not_null_when_unset() {
        let filters = normalize_filters(&article(), None, None);
        assert_eq!(filters.get("publishedAt"), Some(&FilterOp::NotNull));
    }

    #[test]
    fn test_normalize_live_overrides_caller_predicate() {
        let caller = Filters::new().with("publishedAt", FilterOp::Null);
        let filters = normalize_filters(&article(), Some(caller), Some(PublicationState::Live));
        assert_eq!(filters.get("publishedAt"), Some(&FilterOp::NotNull));
        assert_eq!(filters.conditions().len(), 1);
    }

    #[test]
    fn test_normalize_all_leaves_filters_alone() {
        let filters = normalize_filters(&article(), None, Some(PublicationState::All));
        assert!(filters.is_empty());
    }

    #[test]
    fn test_normalize_without_publication_attribute() {
        let meta = EntityMeta::new("api::tag.tag", "tags")
            .attribute_with("name", "name", AttributeType::String);
        assert!(normalize_filters(&meta, None, None).is_empty());
    }

    #[test]
    fn test_publication_state_serde() {
        let state: PublicationState = serde_json::from_value(json!("preview")).unwrap();
        assert_eq!(state, PublicationState::All);
        let state: PublicationState = serde_json::from_value(json!("live")).unwrap();
        assert_eq!(state, PublicationState::Live);
    }

    #[test]
    fn test_from_json_operators() {
        let filters = Filters::from_json(&json!({
            "title": "Hello",
            "views": { "$gte": 10, "$lt": 100 },
            "publishedAt": { "$notNull": true }
        }))
        .unwrap();

        assert_eq!(filters.conditions().len(), 4);
        assert!(filters.conditions().contains(&Filter::field("title", FilterOp::Eq("Hello".into()))));
        assert!(filters.conditions().contains(&Filter::field("views", FilterOp::Gte(SqlValue::Int(10)))));
        assert_eq!(filters.get("publishedAt"), Some(&FilterOp::NotNull));
    }

    #[test]
    fn test_from_json_rejects_unknown_operator() {
        let err = Filters::from_json(&json!({ "views": { "$between": [1, 2] } })).unwrap_err();
        assert!(matches!(err, Error::InvalidFilter(_)));
    }

    #[test]
    fn test_to_fragment_resolves_columns() {
        let filters = Filters::new()
            .with("views", FilterOp::Gt(SqlValue::Int(5)))
            .with("publishedAt", FilterOp::NotNull);
        let fragment = filters.to_fragment(&article(), "t0").unwrap();

        #[cfg(feature = "postgres")]
        assert_eq!(
            fragment.sql,
            "t0.\"view_count\" > {} AND t0.\"published_at\" IS NOT NULL"
        );
        assert_eq!(fragment.parameters, vec![SqlValue::Int(5)]);
    }

    #[test]
    fn test_to_fragment_or_and_in() {
        let filters = Filters::new().with("title", FilterOp::In(vec!["a".into(), "b".into()]));
        let mut filters = filters;
        filters.push(Filter::Or(vec![
            Filter::field("views", FilterOp::Lt(SqlValue::Int(1))),
            Filter::field("views", FilterOp::Gt(SqlValue::Int(9))),
        ]));
        let fragment = filters.to_fragment(&article(), "t0").unwrap();

        #[cfg(feature = "postgres")]
        assert_eq!(
            fragment.sql,
            "t0.\"title\" IN ({}, {}) AND (t0.\"view_count\" < {} OR t0.\"view_count\" > {})"
        );
        assert_eq!(fragment.parameters.len(), 4);
    }

    #[test]
    fn test_to_fragment_unknown_attribute() {
        let filters = Filters::new().with("color", FilterOp::Eq("red".into()));
        assert!(matches!(
            filters.to_fragment(&article(), "t0"),
            Err(Error::UnknownAttribute { .. })
        ));
    }

    #[test]
    fn test_empty_in_list_matches_nothing() {
        let filters = Filters::new().with("title", FilterOp::In(vec![]));
        let fragment = filters.to_fragment(&article(), "t0").unwrap();
        assert_eq!(fragment.sql, "1 = 0");
    }
}
