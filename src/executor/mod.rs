// Raw SQL execution
//
// `SqlExecutor` is the seam between the aggregation core and the database.
// Each dialect feature provides an implementation for its sqlx pool type
// that binds `SqlValue` parameters and decodes every column back into a
// `SqlValue`, keyed by column name.

use async_trait::async_trait;

use crate::error::Result;
use crate::query::Statement;
use crate::value::RawRow;

#[cfg(feature = "postgres")]
mod postgres;

#[cfg(feature = "mysql")]
mod mysql;

#[cfg(feature = "sqlite")]
mod sqlite;

/// Executes rendered statements.
///
/// `Ok(None)` means the backend produced no result object at all, which
/// callers distinguish from an empty row set.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    async fn fetch_all(&self, statement: &Statement) -> Result<Option<Vec<RawRow>>>;
}

#[async_trait]
impl<T: SqlExecutor + ?Sized> SqlExecutor for std::sync::Arc<T> {
    async fn fetch_all(&self, statement: &Statement) -> Result<Option<Vec<RawRow>>> {
        (**self).fetch_all(statement).await
    }
}

fn decode_error(column: &str, err: impl std::fmt::Display) -> crate::Error {
    crate::Error::Decode {
        column: column.to_string(),
        reason: err.to_string(),
    }
}
