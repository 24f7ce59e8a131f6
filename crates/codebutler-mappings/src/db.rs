use rusqlite::Connection;

use crate::error::Result;

/// Create the schema if it does not exist yet. Safe to call on every open.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS mappings (
            branch      TEXT PRIMARY KEY,
            channel_id  TEXT NOT NULL,
            thread_id   TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_mappings_thread
            ON mappings (channel_id, thread_id);",
    )?;
    Ok(())
}
