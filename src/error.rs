//! Error type shared by every entry point.

/// Failures surfaced to callers.
///
/// Facet configuration mismatches and aggregate shape anomalies are not
/// errors: those facets are dropped from the output instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown entity type: {0}")]
    UnknownEntity(String),

    #[error("unknown attribute `{attribute}` on {uid}")]
    UnknownAttribute { uid: String, attribute: String },

    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    #[error("invalid sort: {0}")]
    InvalidSort(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("cannot decode column `{column}`: {reason}")]
    Decode { column: String, reason: String },

    #[error("aggregate query `{0}` returned no row")]
    MissingAggregate(String),
}

pub type Result<T> = std::result::Result<T, Error>;
