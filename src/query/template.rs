//! Filtered base query with open select and group-by slots.

use std::fmt;

use super::{Fragment, QueryParts, Statement};
use crate::error::Result;
use crate::filter::Filters;
use crate::query::EntityQuery;
use crate::schema::EntityMeta;
use crate::value::SqlValue;

/// The shared FROM/WHERE of every facet query.
///
/// The WHERE clause comes from the generic builder, so arbitrary filter trees
/// compile exactly once per request; each facet only fills the select list
/// and the group-by clause. Every rendered statement carries the same
/// parameter list.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlTemplate {
    base: QueryParts,
}

impl SqlTemplate {
    /// Compiles `filters` against `meta` with no ordering or pagination.
    pub fn build(meta: &EntityMeta, filters: Filters) -> Result<Self> {
        let mut base = EntityQuery::new(meta).filters(filters).compile_parts()?;
        base.select = Fragment::default();
        base.group_by = Fragment::default();
        base.order_by.clear();
        base.limit = None;
        base.offset = None;
        Ok(Self { base })
    }

    pub fn parameters(&self) -> &[SqlValue] {
        &self.base.where_clause.parameters
    }

    /// Fills the slots. `group_by` is the GROUP BY body without the keyword;
    /// empty means no grouping.
    pub fn render(&self, select: &str, group_by: &str) -> Statement {
        let mut parts = self.base.clone();
        parts.select = Fragment::raw(select);
        parts.group_by = Fragment::raw(group_by);
        parts.render()
    }
}

impl fmt::Display for SqlTemplate {
    /// Marker form, e.g. `SELECT {{select}} FROM "products" AS t0 WHERE ...{{groupBy}}`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = self.base.clone();
        parts.select = Fragment::raw("{{select}}");
        let sql = parts.into_fragment().sql;
        write!(f, "{}{{{{groupBy}}}}", sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterOp;
    use crate::schema::AttributeType;

    fn product() -> EntityMeta {
        EntityMeta::new("api::product.product", "products")
            .attribute_with("id", "id", AttributeType::Integer)
            .attribute_with("name", "name", AttributeType::String)
            .attribute_with("price", "price", AttributeType::Decimal)
    }

    #[test]
    fn test_marker_form() {
        let filters = Filters::new().with("price", FilterOp::Gt(SqlValue::Int(1)));
        let template = SqlTemplate::build(&product(), filters).unwrap();

        #[cfg(feature = "postgres")]
        assert_eq!(
            template.to_string(),
            "SELECT {{select}} FROM \"products\" AS t0 WHERE t0.\"price\" > {}{{groupBy}}"
        );
        assert_eq!(template.parameters(), &[SqlValue::Int(1)]);
    }

    #[test]
    fn test_render_reuses_parameters() {
        let filters = Filters::new().with("name", FilterOp::Ne("x".into()));
        let template = SqlTemplate::build(&product(), filters).unwrap();

        let grouped = template.render("t0.\"name\" AS value", "t0.\"name\"");
        let plain = template.render("count(*) AS total", "");

        #[cfg(feature = "postgres")]
        {
            assert_eq!(
                grouped.sql,
                "SELECT t0.\"name\" AS value FROM \"products\" AS t0 WHERE t0.\"name\" <> $1 GROUP BY t0.\"name\""
            );
            assert_eq!(
                plain.sql,
                "SELECT count(*) AS total FROM \"products\" AS t0 WHERE t0.\"name\" <> $1"
            );
        }
        assert_eq!(grouped.parameters, plain.parameters);
    }

    #[test]
    fn test_no_filters_no_where() {
        let template = SqlTemplate::build(&product(), Filters::new()).unwrap();
        assert!(template.parameters().is_empty());
        assert!(!template.render("count(*) AS total", "").sql.contains("WHERE"));
    }
}
