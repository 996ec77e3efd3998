use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid model definition: {0}")]
    Config(String),

    #[error("model definition not found: {0}")]
    DefinitionNotFound(std::path::PathBuf),

    #[error("model definition json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("input has {actual} codes but the model accepts {width}")]
    InputTooLong { actual: usize, width: usize },

    #[error("output buffer is {actual} bytes, expected {expected}")]
    OutputSize { actual: usize, expected: usize },

    #[error("class index {index} has no catalog entry (catalog and model out of sync)")]
    CatalogMismatch { index: usize },

    #[error("unrecognized acquisition status code {0}")]
    UnknownStatus(i32),
}

impl CoreError {
    /// Whether this error invalidates the whole model rather than a single request.
    ///
    /// Configuration problems, catalog/engine desync and unknown acquisition
    /// statuses are fatal. Sizing and decode failures only reject the request
    /// that produced them.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::DefinitionNotFound(_)
                | Self::Json(_)
                | Self::Io(_)
                | Self::CatalogMismatch { .. }
                | Self::UnknownStatus(_)
        )
    }
}
