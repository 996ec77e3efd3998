//! Model acquisition: distribution service seam, HTTP client, and the
//! snapshot-publishing acquisition driver.

mod acquire;
mod error;

#[cfg(feature = "http")]
pub mod http;

pub use acquire::{DistributionService, RawStatus, acquire};
pub use error::SyncError;

#[cfg(feature = "http")]
pub use http::HttpDistribution;
