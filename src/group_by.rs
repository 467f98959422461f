//! Group-by paths: distinct group counts and one representative row per
//! group.
//!
//! The representative of a group is its row with the smallest id. The grouped
//! ids come from a `MIN(id) ... GROUP BY` subquery, which is spliced into an
//! ordinary paginated select through an `id IN (...)` predicate:
//!
//! ```text
//! SELECT t1.cols FROM table AS t1
//! WHERE t1.id IN (SELECT MIN(t0.id) AS id FROM table AS t0 WHERE <filters> GROUP BY <keys>)
//! ORDER BY ... LIMIT ... OFFSET ...
//! ```

use std::collections::HashMap;

use tracing::debug;

use crate::error::Result;
use crate::executor::SqlExecutor;
use crate::filter::{normalize_filters, FilterOp, Filters, PublicationState};
use crate::query::{qualify, EntityQuery, Fragment, OrderBy, QuerySpec, Statement, BASE_ALIAS};
use crate::quote_ident;
use crate::schema::EntityMeta;
use crate::value::RawRow;

/// Alias of the outer query, distinct from the subquery's `t0`.
const OUTER_ALIAS: &str = "t1";

#[derive(Debug, Clone, Default)]
pub struct GroupByCountParams {
    pub filters: Option<Filters>,
    pub publication_state: Option<PublicationState>,
}

#[derive(Debug, Clone, Default)]
pub struct GroupByParams {
    pub filters: Option<Filters>,
    /// Attributes to return; `None` returns every scalar attribute.
    pub fields: Option<Vec<String>>,
    pub populate: Vec<String>,
    pub publication_state: Option<PublicationState>,
    pub limit: Option<u64>,
    pub sort: Vec<OrderBy>,
    pub start: Option<u64>,
}

/// `SELECT COUNT(*) AS count ... GROUP BY <keys>`: one row per group.
pub fn build_group_count<S: AsRef<str>>(meta: &EntityMeta, keys: &[S], filters: Filters) -> Result<Statement> {
    EntityQuery::new(meta)
        .init(QuerySpec {
            filters,
            group_by: keys.iter().map(|k| k.as_ref().to_string()).collect(),
            count: true,
            ..QuerySpec::default()
        })
        .compile()
}

/// Unnumbered `SELECT MIN(id) AS id ... GROUP BY <keys>` fragment.
pub fn build_grouped_ids<S: AsRef<str>>(meta: &EntityMeta, keys: &[S], filters: Filters) -> Result<Fragment> {
    let mut parts = EntityQuery::new(meta)
        .init(QuerySpec {
            select: vec![meta.id_attribute.clone()],
            filters,
            group_by: keys.iter().map(|k| k.as_ref().to_string()).collect(),
            ..QuerySpec::default()
        })
        .compile_parts()?;

    let id_column = meta.id_column();
    parts.select = Fragment::raw(format!(
        "MIN({}) AS {}",
        qualify(BASE_ALIAS, id_column),
        quote_ident(id_column)
    ));
    Ok(parts.into_fragment())
}

/// The complete paginated representative-row statement. Subquery parameters
/// are bound before the outer LIMIT/OFFSET, matching their textual position.
pub fn build_group_by_query<S: AsRef<str>>(
    meta: &EntityMeta,
    keys: &[S],
    filters: Filters,
    params: &GroupByParams,
) -> Result<Statement> {
    let grouped_ids = build_grouped_ids(meta, keys, filters)?;

    EntityQuery::new(meta)
        .alias(OUTER_ALIAS)
        .init(QuerySpec {
            select: params.fields.clone().unwrap_or_default(),
            filters: Filters::new().with(&meta.id_attribute, FilterOp::InSubquery(grouped_ids)),
            populate: params.populate.clone(),
            order_by: params.sort.clone(),
            offset: params.start,
            limit: params.limit,
            ..QuerySpec::default()
        })
        .compile()
}

/// Renames physical columns to logical attribute names using the map from
/// [`EntityMeta::column_to_attribute`]. Columns without an attribute keep
/// their name.
pub fn remap_row(reverse: &HashMap<&str, &str>, row: RawRow) -> RawRow {
    row.into_pairs()
        .into_iter()
        .map(|(column, value)| match reverse.get(column.as_str()) {
            Some(name) => (name.to_string(), value),
            None => (column, value),
        })
        .collect()
}

pub async fn run_group_by_count<S: AsRef<str>>(
    executor: &dyn SqlExecutor,
    meta: &EntityMeta,
    keys: &[S],
    params: GroupByCountParams,
) -> Result<Option<u64>> {
    let filters = normalize_filters(meta, params.filters, params.publication_state);
    let statement = build_group_count(meta, keys, filters)?;

    let groups = executor
        .fetch_all(&statement)
        .await?
        .map(|rows| rows.len() as u64);
    debug!(uid = %meta.uid, groups = ?groups, "group count");
    Ok(groups)
}

pub async fn run_group_by<S: AsRef<str>>(
    executor: &dyn SqlExecutor,
    meta: &EntityMeta,
    keys: &[S],
    params: GroupByParams,
) -> Result<Vec<RawRow>> {
    let filters = normalize_filters(meta, params.filters.clone(), params.publication_state);
    let statement = build_group_by_query(meta, keys, filters, &params)?;

    let rows = executor.fetch_all(&statement).await?.unwrap_or_default();
    let reverse = meta.column_to_attribute();
    Ok(rows.into_iter().map(|row| remap_row(&reverse, row)).collect())
}
