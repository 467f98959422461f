//! Faceted aggregation over an sqlx-backed entity store.
//!
//! Three entry points live on [`FacetEngine`]:
//!
//! * [`FacetEngine::run_filters`] computes list/range facet summaries for the
//!   currently filtered set of an entity.
//! * [`FacetEngine::run_group_by`] fetches one representative row per distinct
//!   group, paginated.
//! * [`FacetEngine::run_group_by_count`] counts distinct groups.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sqlx_facets::{FacetEngine, FilterParams, StaticCatalog};
//!
//! let engine = FacetEngine::new(Arc::new(catalog), Arc::new(pool));
//! let facets = engine
//!     .run_filters("api::product.product", None, FilterParams::default())
//!     .await?;
//! ```

pub mod error;
pub mod schema;
pub mod value;
pub mod filter;
pub mod query;
pub mod executor;
pub mod facet;
pub mod group_by;
pub mod engine;

pub use engine::{EngineOptions, FacetEngine, FilterParams, GroupByCountParams, GroupByParams};
pub use error::{Error, Result};
pub use executor::SqlExecutor;
pub use facet::{FacetConfig, FacetKind, FacetResult};
pub use filter::{Filter, FilterOp, Filters, PublicationState};
pub use query::{EntityQuery, OrderBy, QueryParts, QuerySpec, SqlTemplate, Statement};
pub use schema::{AttributeMeta, AttributeType, EntityMeta, MetadataCatalog, StaticCatalog};
pub use value::{RawRow, SqlValue};

#[cfg(feature = "postgres")]
fn get_db() -> DbType {
    DbType::PostgreSQL
}

#[cfg(all(feature = "mysql", not(feature = "postgres")))]
fn get_db() -> DbType {
    DbType::MySQL
}

#[cfg(all(feature = "sqlite", not(feature = "postgres"), not(feature = "mysql")))]
fn get_db() -> DbType {
    DbType::SQLite
}

#[cfg(not(any(feature = "postgres", feature = "mysql", feature = "sqlite")))]
fn get_db() -> DbType {
    compile_error!("You must enable one of the database features: postgres, mysql, or sqlite")
}

/// Translates a parameter placeholder to the database-specific format.
///
/// - PostgreSQL: Returns the parameter as-is (e.g., "$1", "$2")
/// - MySQL/SQLite: Returns "?" for all parameters
fn param_trans(p: String) -> String {
    match get_db() {
        DbType::PostgreSQL => p,
        DbType::MySQL | DbType::SQLite => "?".to_string(),
    }
}

/// Replaces "{}" placeholders with database-specific parameter markers.
///
/// Markers are numbered in textual order starting at `field_count`, which is
/// what keeps the binding order of spliced subqueries correct.
///
/// ```ignore
/// prepare_where("name = {} AND age = {}", 1);
/// // PostgreSQL: "name = $1 AND age = $2"
/// // MySQL/SQLite: "name = ? AND age = ?"
/// ```
fn prepare_where(w: &str, field_count: i32) -> String {
    let param_count = w.matches("{}").count() as i32;
    let mut where_sql = w.to_string();

    let mut search_from = 0;
    for i in 0..param_count {
        let param = param_trans(format!("${}", i + field_count));
        if let Some(pos) = where_sql[search_from..].find("{}") {
            let pos = search_from + pos;
            where_sql.replace_range(pos..pos + 2, &param);
            search_from = pos + param.len();
        }
    }

    where_sql
}

/// Quotes an identifier for the active dialect, doubling embedded quotes.
fn quote_ident(ident: &str) -> String {
    match get_db() {
        DbType::MySQL => format!("`{}`", ident.replace('`', "``")),
        DbType::PostgreSQL | DbType::SQLite => format!("\"{}\"", ident.replace('"', "\"\"")),
    }
}

#[derive(Debug, Clone, Copy)]
#[allow(dead_code)]
enum DbType {
    PostgreSQL,
    MySQL,
    SQLite
}
