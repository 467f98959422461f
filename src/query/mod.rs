//! Query compilation with an explicit intermediate representation.
//!
//! SQL is assembled from [`Fragment`]s that carry dialect-neutral `{}`
//! parameter markers together with their parameters. Markers are numbered
//! only when a complete statement is rendered, so a fragment spliced into
//! another (a subquery, a templated select list) keeps its bindings in
//! textual order.

mod builder;
mod template;

pub use builder::{group_by_columns, EntityQuery, OrderBy, QuerySpec, SortDirection};
pub use template::SqlTemplate;

use crate::value::SqlValue;
use crate::{get_db, prepare_where, quote_ident, DbType};

/// Table alias of the base query every facet and filter is compiled against.
pub(crate) const BASE_ALIAS: &str = "t0";

/// SQL text with `{}` markers and the parameters they stand for.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fragment {
    pub sql: String,
    pub parameters: Vec<SqlValue>,
}

impl Fragment {
    /// Fragment without parameters.
    pub fn raw(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            parameters: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    pub fn push_sql(&mut self, sql: &str) {
        self.sql.push_str(sql);
    }

    /// Appends a `{}` marker bound to `value`.
    pub fn push_param(&mut self, value: SqlValue) {
        self.sql.push_str("{}");
        self.parameters.push(value);
    }

    pub fn append(&mut self, other: Fragment) {
        self.sql.push_str(&other.sql);
        self.parameters.extend(other.parameters);
    }
}

/// A fully rendered statement ready for execution.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub parameters: Vec<SqlValue>,
}

impl From<Fragment> for Statement {
    fn from(fragment: Fragment) -> Self {
        Self {
            sql: prepare_where(&fragment.sql, 1),
            parameters: fragment.parameters,
        }
    }
}

/// Compiled SELECT, one slot per clause.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryParts {
    pub select: Fragment,
    /// `<table> AS <alias>`
    pub from: String,
    /// WHERE body without the keyword; empty means no WHERE clause.
    pub where_clause: Fragment,
    /// GROUP BY body without the keyword; empty means no GROUP BY clause.
    pub group_by: Fragment,
    pub order_by: Vec<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl QueryParts {
    /// Assembles the clauses in textual order without numbering markers.
    pub fn into_fragment(self) -> Fragment {
        let mut out = Fragment::raw("SELECT ");
        out.append(self.select);
        out.push_sql(" FROM ");
        out.push_sql(&self.from);
        if !self.where_clause.is_empty() {
            out.push_sql(" WHERE ");
            out.append(self.where_clause);
        }
        if !self.group_by.is_empty() {
            out.push_sql(" GROUP BY ");
            out.append(self.group_by);
        }
        if !self.order_by.is_empty() {
            out.push_sql(" ORDER BY ");
            out.push_sql(&self.order_by.join(", "));
        }
        match (self.limit, self.offset) {
            (Some(limit), offset) => {
                out.push_sql(" LIMIT ");
                out.push_param(row_count(limit));
                if let Some(offset) = offset {
                    out.push_sql(" OFFSET ");
                    out.push_param(row_count(offset));
                }
            }
            (None, Some(offset)) => {
                // MySQL and SQLite reject OFFSET without LIMIT
                match get_db() {
                    DbType::MySQL => out.push_sql(" LIMIT 18446744073709551615"),
                    DbType::SQLite => out.push_sql(" LIMIT -1"),
                    DbType::PostgreSQL => {}
                }
                out.push_sql(" OFFSET ");
                out.push_param(row_count(offset));
            }
            (None, None) => {}
        }
        out
    }

    pub fn render(self) -> Statement {
        Statement::from(self.into_fragment())
    }
}

/// LIMIT/OFFSET parameter, saturating at `i64::MAX`.
fn row_count(n: u64) -> SqlValue {
    SqlValue::Int(i64::try_from(n).unwrap_or(i64::MAX))
}

/// `alias."column"`
pub(crate) fn qualify(alias: &str, column: &str) -> String {
    format!("{}.{}", alias, quote_ident(column))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts() -> QueryParts {
        let mut where_clause = Fragment::raw("t0.\"price\" > ");
        where_clause.push_param(SqlValue::Int(10));
        QueryParts {
            select: Fragment::raw("t0.\"name\""),
            from: "\"products\" AS t0".to_string(),
            where_clause,
            group_by: Fragment::default(),
            order_by: vec!["t0.\"name\" ASC".to_string()],
            limit: Some(5),
            offset: Some(10),
        }
    }

    #[test]
    fn test_render_numbers_markers_in_textual_order() {
        let statement = parts().render();

        #[cfg(feature = "postgres")]
        assert_eq!(
            statement.sql,
            "SELECT t0.\"name\" FROM \"products\" AS t0 WHERE t0.\"price\" > $1 ORDER BY t0.\"name\" ASC LIMIT $2 OFFSET $3"
        );
        assert_eq!(
            statement.parameters,
            vec![SqlValue::Int(10), SqlValue::Int(5), SqlValue::Int(10)]
        );
    }

    #[test]
    fn test_offset_without_limit() {
        let mut parts = parts();
        parts.limit = None;
        let statement = parts.render();

        #[cfg(feature = "postgres")]
        assert!(statement.sql.ends_with("ORDER BY t0.\"name\" ASC OFFSET $2"));
        assert_eq!(statement.parameters.len(), 2);
    }

    #[test]
    fn test_huge_limit_saturates() {
        let mut parts = parts();
        parts.limit = Some(u64::MAX);
        parts.offset = Some(u64::MAX - 1);
        let statement = parts.render();

        assert_eq!(
            statement.parameters,
            vec![SqlValue::Int(10), SqlValue::Int(i64::MAX), SqlValue::Int(i64::MAX)]
        );
    }

    #[test]
    fn test_fragment_append_keeps_parameter_order() {
        let mut outer = Fragment::raw("a = ");
        outer.push_param(SqlValue::Int(1));
        let mut inner = Fragment::raw(" AND b = ");
        inner.push_param(SqlValue::Int(2));
        outer.append(inner);

        assert_eq!(outer.sql, "a = {} AND b = {}");
        assert_eq!(outer.parameters, vec![SqlValue::Int(1), SqlValue::Int(2)]);
    }
}
