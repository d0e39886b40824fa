use thiserror::Error;

/// Failures raised by the store layer.
///
/// A failed query is always surfaced to the caller; it is never collapsed
/// into an empty result, so "zero records" can only mean the store really
/// holds none for that tenant.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("store query failed: {0}")]
    Query(#[from] sqlx::Error),

    #[error("{0} is not on the admin allow-list")]
    NotAuthorized(String),
}
