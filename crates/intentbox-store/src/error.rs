use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no model registered under {0:?}")]
    NotFound(String),

    #[cfg(feature = "duckdb")]
    #[error("duckdb error: {0}")]
    DuckDb(#[from] ::duckdb::Error),

    #[error("{0}")]
    Other(String),
}
