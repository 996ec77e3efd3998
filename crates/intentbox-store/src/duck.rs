//! DuckDB registry of locally available model artifacts.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use duckdb::{Connection, params};
use tracing::info;

use crate::{LocalModelRecord, StoreError};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS local_models (
    name VARCHAR PRIMARY KEY,
    path VARCHAR NOT NULL,
    registered_at VARCHAR NOT NULL
)";

/// `(name, path)` records for downloaded models.
///
/// Supports both in-memory (ephemeral) and persistent (file-backed) modes.
/// Use [`open`](Self::open) for in-memory and [`open_persistent`](Self::open_persistent)
/// for a registry that survives across process restarts.
pub struct ModelStore {
    conn: Connection,
}

impl ModelStore {
    /// Open an in-memory registry.
    pub fn open() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    /// Open or create a persistent registry at the given path.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        Self::init(Connection::open(path)?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Insert a record, replacing any existing record with the same name.
    pub fn insert(&self, record: &LocalModelRecord) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO local_models (name, path, registered_at) VALUES (?, ?, ?)",
            params![
                record.name,
                record.path.to_string_lossy().into_owned(),
                record.registered_at.to_rfc3339(),
            ],
        )?;
        info!(name = %record.name, path = %record.path.display(), "registered model");
        Ok(())
    }

    /// Look up a model by exact name.
    pub fn get(&self, name: &str) -> Result<LocalModelRecord, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, path, registered_at FROM local_models WHERE name = ?")?;
        let mut rows = stmt.query_map(params![name], row_parts)?;
        match rows.next() {
            Some(parts) => into_record(parts?),
            None => Err(StoreError::NotFound(name.to_string())),
        }
    }

    /// All records, ordered by name.
    pub fn list(&self) -> Result<Vec<LocalModelRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, path, registered_at FROM local_models ORDER BY name")?;
        let rows = stmt.query_map([], row_parts)?;
        let mut records = Vec::new();
        for parts in rows {
            records.push(into_record(parts?)?);
        }
        Ok(records)
    }

    /// Remove a record. Returns whether one existed.
    pub fn remove(&self, name: &str) -> Result<bool, StoreError> {
        let n = self
            .conn
            .execute("DELETE FROM local_models WHERE name = ?", params![name])?;
        Ok(n > 0)
    }
}

type RowParts = (String, String, String);

fn row_parts(row: &duckdb::Row<'_>) -> duckdb::Result<RowParts> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn into_record((name, path, registered_at): RowParts) -> Result<LocalModelRecord, StoreError> {
    let registered_at = DateTime::parse_from_rfc3339(&registered_at)
        .map_err(|e| StoreError::Other(format!("bad timestamp for {name}: {e}")))?
        .with_timezone(&Utc);
    Ok(LocalModelRecord {
        name,
        path: PathBuf::from(path),
        registered_at,
    })
}
