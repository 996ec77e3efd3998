//! Storage layer: local registry of downloaded model artifacts.

mod error;
mod record;
pub use error::StoreError;
pub use record::LocalModelRecord;

#[cfg(feature = "duckdb")]
mod duck;
#[cfg(feature = "duckdb")]
pub use duck::ModelStore;
