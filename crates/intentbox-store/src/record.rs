use std::path::PathBuf;

use chrono::{DateTime, Utc};

/// A model artifact available on local disk.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalModelRecord {
    pub name: String,
    pub path: PathBuf,
    pub registered_at: DateTime<Utc>,
}

impl LocalModelRecord {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            registered_at: Utc::now(),
        }
    }

    /// Whether the artifact still exists where it was recorded.
    pub fn is_present(&self) -> bool {
        self.path.exists()
    }
}
