//! Facet query batch: one statement per list facet plus one combined
//! statement for every range facet and the overall total.

use std::collections::HashMap;

use futures::future::try_join_all;
use tracing::{debug, warn};

use super::config::{FacetConfig, FacetKind};
use super::rows::{FacetRows, ListAggregateRow, RangeAggregateRow};
use crate::error::{Error, Result};
use crate::executor::SqlExecutor;
use crate::filter::{normalize_filters, Filters, PublicationState};
use crate::query::{qualify, SqlTemplate, Statement, BASE_ALIAS};
use crate::quote_ident;
use crate::schema::EntityMeta;

/// Batch key of the combined ranges statement.
pub const RANGES_KEY: &str = "ranges";

/// One independent statement of the batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchEntry {
    pub key: String,
    pub statement: Statement,
}

/// Normalizes the filters, builds the template and instantiates it per facet.
pub fn build_queries(
    meta: &EntityMeta,
    configs: &[FacetConfig],
    filters: Option<Filters>,
    state: Option<PublicationState>,
) -> Result<Vec<BatchEntry>> {
    let filters = normalize_filters(meta, filters, state);
    let template = SqlTemplate::build(meta, filters)?;
    Ok(build_batch(meta, configs, &template))
}

/// Instantiates `template` once per list facet and once for all ranges.
///
/// The ranges entry is always last and always present, since it carries the
/// `total` every `full_set` flag is computed against.
pub fn build_batch(meta: &EntityMeta, configs: &[FacetConfig], template: &SqlTemplate) -> Vec<BatchEntry> {
    let mut batch = Vec::new();
    let mut ranges_select = format!("count(*) AS {}", quote_ident("total"));

    for config in configs {
        let column = match meta.column_for(&config.key) {
            Some(column) => qualify(BASE_ALIAS, column),
            None => continue,
        };

        match &config.kind {
            Some(FacetKind::List) => {
                let select = format!(
                    "{} AS {}, count({}) AS {}",
                    column,
                    quote_ident("value"),
                    column,
                    quote_ident("count")
                );
                batch.push(BatchEntry {
                    key: config.key.clone(),
                    statement: template.render(&select, &column),
                });
            }
            Some(FacetKind::Range) => {
                ranges_select.push_str(&format!(
                    ", max({}) AS {}, min({}) AS {}, count({}) AS {}",
                    column,
                    quote_ident(&format!("max_{}", config.key)),
                    column,
                    quote_ident(&format!("min_{}", config.key)),
                    column,
                    quote_ident(&format!("count_{}", config.key)),
                ));
            }
            kind => {
                warn!(key = %config.key, kind = ?kind, "facet has an unknown type, skipped");
            }
        }
    }

    batch.push(BatchEntry {
        key: RANGES_KEY.to_string(),
        statement: template.render(&ranges_select, ""),
    });
    batch
}

/// Runs every entry concurrently. The first failure aborts the whole batch.
pub async fn execute_batch(
    executor: &dyn SqlExecutor,
    batch: Vec<BatchEntry>,
    configs: &[FacetConfig],
) -> Result<FacetRows> {
    let results = try_join_all(batch.into_iter().map(|entry| async move {
        let rows = executor.fetch_all(&entry.statement).await?;
        Ok::<_, Error>((entry.key, rows))
    }))
    .await?;

    let range_keys: Vec<&str> = configs
        .iter()
        .filter(|c| c.kind == Some(FacetKind::Range))
        .map(|c| c.key.as_str())
        .collect();

    let mut ranges = None;
    let mut lists = HashMap::new();
    for (key, rows) in results {
        if key == RANGES_KEY {
            let row = rows
                .as_ref()
                .and_then(|rows| rows.first())
                .ok_or_else(|| Error::MissingAggregate(RANGES_KEY.to_string()))?;
            ranges = Some(RangeAggregateRow::parse(row, &range_keys)?);
            continue;
        }

        match rows {
            Some(rows) => {
                let parsed = rows
                    .into_iter()
                    .map(ListAggregateRow::try_from)
                    .collect::<Result<Vec<_>>>()?;
                lists.insert(key, parsed);
            }
            None => debug!(key = %key, "no result for list facet"),
        }
    }

    Ok(FacetRows {
        ranges: ranges.ok_or_else(|| Error::MissingAggregate(RANGES_KEY.to_string()))?,
        lists,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterOp;
    use crate::schema::AttributeType;
    use crate::value::SqlValue;

    fn product() -> EntityMeta {
        EntityMeta::new("api::product.product", "products")
            .attribute_with("id", "id", AttributeType::Integer)
            .attribute_with("name", "name", AttributeType::String)
            .attribute_with("unitPrice", "unit_price", AttributeType::Decimal)
            .attribute_with("publishedAt", "published_at", AttributeType::DateTime)
    }

    fn configs() -> Vec<FacetConfig> {
        vec![
            FacetConfig::list("name"),
            FacetConfig::range("unitPrice"),
            FacetConfig::new("name").with_kind(FacetKind::Other("tree".into())),
        ]
    }

    #[test]
    fn test_batch_shape() {
        let batch = build_queries(&product(), &configs(), None, None).unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].key, "name");
        assert_eq!(batch[1].key, RANGES_KEY);

        #[cfg(feature = "postgres")]
        {
            assert_eq!(
                batch[0].statement.sql,
                "SELECT t0.\"name\" AS \"value\", count(t0.\"name\") AS \"count\" FROM \"products\" AS t0 WHERE t0.\"published_at\" IS NOT NULL GROUP BY t0.\"name\""
            );
            assert_eq!(
                batch[1].statement.sql,
                "SELECT count(*) AS \"total\", max(t0.\"unit_price\") AS \"max_unitPrice\", min(t0.\"unit_price\") AS \"min_unitPrice\", count(t0.\"unit_price\") AS \"count_unitPrice\" FROM \"products\" AS t0 WHERE t0.\"published_at\" IS NOT NULL"
            );
        }
    }

    #[test]
    fn test_batch_shares_parameters() {
        let filters = Filters::new().with("unitPrice", FilterOp::Lt(SqlValue::Int(50)));
        let batch = build_queries(&product(), &configs(), Some(filters), Some(PublicationState::All)).unwrap();

        for entry in &batch {
            assert_eq!(entry.statement.parameters, vec![SqlValue::Int(50)]);
            assert!(!entry.statement.sql.contains("published_at"));
        }
    }

    #[test]
    fn test_ranges_entry_without_range_facets() {
        let batch = build_queries(&product(), &[FacetConfig::list("name")], None, None).unwrap();
        let ranges = batch.last().unwrap();
        assert_eq!(ranges.key, RANGES_KEY);
        assert!(ranges.statement.sql.starts_with("SELECT count(*) AS"));
        assert!(!ranges.statement.sql.contains("GROUP BY"));
    }
}
