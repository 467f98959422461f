//! Fluent query builder over entity metadata.
//!
//! Callers speak in logical attribute names; the builder resolves them to
//! physical columns and compiles a [`QueryParts`] that the facet and group-by
//! paths reshape before rendering.

use std::fmt;

use tracing::debug;

use super::{qualify, Fragment, QueryParts, BASE_ALIAS};
use crate::error::{Error, Result};
use crate::filter::Filters;
use crate::quote_ident;
use crate::schema::EntityMeta;

/// Sort direction of an ORDER BY term.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Asc => write!(f, "ASC"),
            SortDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// One ORDER BY term over a logical attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub attribute: String,
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn asc(attribute: &str) -> Self {
        Self {
            attribute: attribute.to_string(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(attribute: &str) -> Self {
        Self {
            attribute: attribute.to_string(),
            direction: SortDirection::Desc,
        }
    }

    /// Parses `"price"`, `"price:asc"` or `"price:DESC"`.
    pub fn parse(s: &str) -> Result<Self> {
        let (attribute, direction) = match s.split_once(':') {
            Some((attribute, direction)) => (attribute.trim(), direction.trim()),
            None => (s.trim(), "asc"),
        };
        if attribute.is_empty() {
            return Err(Error::InvalidSort(s.to_string()));
        }
        let direction = match direction.to_ascii_lowercase().as_str() {
            "asc" => SortDirection::Asc,
            "desc" => SortDirection::Desc,
            _ => return Err(Error::InvalidSort(s.to_string())),
        };
        Ok(Self {
            attribute: attribute.to_string(),
            direction,
        })
    }
}

/// Declarative description of a SELECT over one entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySpec {
    /// Attributes to select; empty selects every scalar attribute.
    pub select: Vec<String>,
    pub filters: Filters,
    /// Attribute names or raw SQL expressions.
    pub group_by: Vec<String>,
    /// Extra attributes to load alongside `select`.
    pub populate: Vec<String>,
    pub order_by: Vec<OrderBy>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
    /// Select `COUNT(*) AS count` instead of columns.
    pub count: bool,
}

/// Maps group-by keys to physical columns; unknown keys pass through
/// unchanged so raw SQL expressions keep working.
pub fn group_by_columns<S: AsRef<str>>(meta: &EntityMeta, keys: &[S]) -> Vec<String> {
    keys.iter()
        .map(|key| {
            let key = key.as_ref();
            meta.column_for(key).unwrap_or(key).to_string()
        })
        .collect()
}

/// Fluent builder compiling a [`QuerySpec`] against an entity.
///
/// # Example
///
/// ```ignore
/// let statement = EntityQuery::new(&meta)
///     .select(&["name", "price"])
///     .filters(filters)
///     .order_by(OrderBy::desc("price"))
///     .limit(10)
///     .compile()?;
/// ```
#[derive(Debug, Clone)]
pub struct EntityQuery<'m> {
    meta: &'m EntityMeta,
    alias: String,
    spec: QuerySpec,
}

impl<'m> EntityQuery<'m> {
    /// Creates a builder aliasing the entity table as `t0`.
    pub fn new(meta: &'m EntityMeta) -> Self {
        Self {
            meta,
            alias: BASE_ALIAS.to_string(),
            spec: QuerySpec::default(),
        }
    }

    /// Replaces the whole spec.
    pub fn init(mut self, spec: QuerySpec) -> Self {
        self.spec = spec;
        self
    }

    /// Changes the table alias, e.g. to nest this query around another one.
    pub fn alias(mut self, alias: &str) -> Self {
        self.alias = alias.to_string();
        self
    }

    pub fn select<S: AsRef<str>>(mut self, attributes: &[S]) -> Self {
        self.spec.select = attributes.iter().map(|s| s.as_ref().to_string()).collect();
        self
    }

    pub fn filters(mut self, filters: Filters) -> Self {
        self.spec.filters = filters;
        self
    }

    pub fn group_by(mut self, key: &str) -> Self {
        self.spec.group_by.push(key.to_string());
        self
    }

    pub fn populate(mut self, attribute: &str) -> Self {
        self.spec.populate.push(attribute.to_string());
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.spec.order_by.push(order);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.spec.offset = Some(n);
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.spec.limit = Some(n);
        self
    }

    /// Selects `COUNT(*) AS count`.
    pub fn count(mut self) -> Self {
        self.spec.count = true;
        self
    }

    /// Qualified reference to an attribute's column.
    pub fn column_ref(&self, attribute: &str) -> Result<String> {
        Ok(qualify(&self.alias, self.meta.require_column(attribute)?))
    }

    fn build_select(&self) -> Result<Fragment> {
        if self.spec.count {
            return Ok(Fragment::raw("COUNT(*) AS count"));
        }

        let mut columns: Vec<&str> = Vec::new();
        if self.spec.select.is_empty() {
            columns.extend(
                self.meta
                    .attributes
                    .iter()
                    .filter(|a| a.kind.is_scalar())
                    .map(|a| a.column.as_str()),
            );
        } else {
            for attribute in &self.spec.select {
                columns.push(self.meta.require_column(attribute)?);
            }
        }

        for attribute in &self.spec.populate {
            match self.meta.attribute(attribute) {
                Some(a) if a.kind.is_scalar() => {
                    if !columns.contains(&a.column.as_str()) {
                        columns.push(a.column.as_str());
                    }
                }
                _ => debug!(uid = %self.meta.uid, attribute = %attribute, "populate ignored"),
            }
        }

        let select = columns
            .iter()
            .map(|c| qualify(&self.alias, c))
            .collect::<Vec<_>>()
            .join(", ");
        Ok(Fragment::raw(select))
    }

    fn build_group_by(&self) -> Fragment {
        let columns = group_by_columns(self.meta, &self.spec.group_by);
        let terms = columns
            .iter()
            .zip(&self.spec.group_by)
            .map(|(column, key)| {
                if self.meta.has_attribute(key) {
                    qualify(&self.alias, column)
                } else {
                    column.clone()
                }
            })
            .collect::<Vec<_>>();
        Fragment::raw(terms.join(", "))
    }

    fn build_order_by(&self) -> Result<Vec<String>> {
        self.spec
            .order_by
            .iter()
            .map(|o| Ok(format!("{} {}", self.column_ref(&o.attribute)?, o.direction)))
            .collect()
    }

    /// Compiles the [`QuerySpec`] into clause slots.
    pub fn compile_parts(&self) -> Result<QueryParts> {
        Ok(QueryParts {
            select: self.build_select()?,
            from: format!("{} AS {}", quote_ident(&self.meta.table_name), self.alias),
            where_clause: self.spec.filters.to_fragment(self.meta, &self.alias)?,
            group_by: self.build_group_by(),
            order_by: self.build_order_by()?,
            limit: self.spec.limit,
            offset: self.spec.offset,
        })
    }

    /// Compiles and renders a complete statement.
    pub fn compile(&self) -> Result<super::Statement> {
        Ok(self.compile_parts()?.render())
    }
}
