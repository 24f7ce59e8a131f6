use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::debug;

use codebutler_core::types::WorktreeMapping;

use crate::db::init_db;
use crate::error::{MappingError, Result};

/// Store of branch ↔ thread bindings.
///
/// Insertion happens when a worktree is provisioned; the GC and the startup
/// reconciler read and prune. At most one mapping exists per branch.
pub trait MappingStore: Send + Sync {
    fn list_mappings(&self) -> Result<Vec<WorktreeMapping>>;

    fn get(&self, branch: &str) -> Result<Option<WorktreeMapping>>;

    /// Upsert: re-provisioning a branch replaces its binding.
    fn insert(&self, mapping: &WorktreeMapping) -> Result<()>;

    /// Idempotent: removing an absent mapping is a no-op.
    fn remove_mapping(&self, branch: &str) -> Result<()>;
}

/// SQLite-backed store.
///
/// Wraps a single connection in a `Mutex`; mapping traffic is a handful of
/// rows per GC pass, nowhere near needing a pool.
pub struct SqliteMappingStore {
    db: Mutex<Connection>,
}

impl SqliteMappingStore {
    /// Open (creating parent directories and schema as needed).
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }

    /// In-memory store for tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_db(&conn)?;
        Ok(Self {
            db: Mutex::new(conn),
        })
    }
}

impl MappingStore for SqliteMappingStore {
    fn list_mappings(&self) -> Result<Vec<WorktreeMapping>> {
        let db = self.db.lock().unwrap();
        let mut stmt = db.prepare(
            "SELECT branch, channel_id, thread_id, created_at
             FROM mappings ORDER BY created_at",
        )?;
        let rows = stmt.query_map([], row_to_mapping)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    fn get(&self, branch: &str) -> Result<Option<WorktreeMapping>> {
        let db = self.db.lock().unwrap();
        match db.query_row(
            "SELECT branch, channel_id, thread_id, created_at
             FROM mappings WHERE branch = ?1",
            [branch],
            row_to_mapping,
        ) {
            Ok(m) => Ok(Some(m)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(MappingError::Database(e)),
        }
    }

    fn insert(&self, mapping: &WorktreeMapping) -> Result<()> {
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT OR REPLACE INTO mappings (branch, channel_id, thread_id, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                mapping.branch,
                mapping.channel_id,
                mapping.thread_id,
                mapping.created_at.to_rfc3339(),
            ],
        )?;
        debug!(branch = %mapping.branch, thread_id = %mapping.thread_id, "mapping stored");
        Ok(())
    }

    fn remove_mapping(&self, branch: &str) -> Result<()> {
        let db = self.db.lock().unwrap();
        let removed = db.execute("DELETE FROM mappings WHERE branch = ?1", [branch])?;
        if removed > 0 {
            debug!(branch, "mapping removed");
        }
        Ok(())
    }
}

fn row_to_mapping(row: &rusqlite::Row<'_>) -> rusqlite::Result<WorktreeMapping> {
    let created_at: String = row.get(3)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?;
    Ok(WorktreeMapping {
        branch: row.get(0)?,
        channel_id: row.get(1)?,
        thread_id: row.get(2)?,
        created_at,
    })
}
