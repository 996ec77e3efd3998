use std::time::Duration;

use intentbox_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("invalid model name {0:?}")]
    InvalidName(String),

    #[error("acquisition of {0} failed")]
    Failed(String),

    #[error("distribution service returned {0} without reporting success")]
    Incomplete(String),

    #[error("acquisition of {model} timed out after {after:?}")]
    Timeout { model: String, after: Duration },
}
