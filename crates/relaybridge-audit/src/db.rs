use rusqlite::{Connection, OptionalExtension};

use crate::error::Result;

const SCHEMA_VERSION: i64 = 1;

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS audit_events (
            event_id TEXT PRIMARY KEY,
            session_id TEXT,
            prompt_id TEXT,
            event_type TEXT NOT NULL,
            payload_json TEXT NOT NULL,
            created_at TEXT NOT NULL,
            prev_hash TEXT,
            hash TEXT NOT NULL
         );
         CREATE INDEX IF NOT EXISTS idx_audit_events_created_at ON audit_events(created_at);
         CREATE INDEX IF NOT EXISTS idx_audit_events_session_id ON audit_events(session_id);

         CREATE TABLE IF NOT EXISTS workspace_trust (
            path TEXT PRIMARY KEY,
            actor TEXT NOT NULL,
            channel TEXT,
            session_id TEXT,
            trusted INTEGER NOT NULL,
            granted_at TEXT NOT NULL,
            revoked_at TEXT
         );

         CREATE TABLE IF NOT EXISTS provider_configs (
            provider_id TEXT PRIMARY KEY,
            key_prefix TEXT NOT NULL,
            created_at TEXT NOT NULL,
            revoked_at TEXT
         );",
    )?;
    migrate(conn)?;
    Ok(())
}

fn migrate(conn: &Connection) -> Result<()> {
    let current: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if current < SCHEMA_VERSION {
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    }
    Ok(())
}

/// The most recent event's hash, or `None` for a fresh, empty chain.
pub fn last_hash(conn: &Connection) -> Result<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT hash FROM audit_events ORDER BY created_at DESC, rowid DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?)
}
