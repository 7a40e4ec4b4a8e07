use rusqlite::Connection;

use crate::error::Result;

/// `PRAGMA user_version` this schema corresponds to. Forward-only: bump and
/// add a migration branch in `migrate`, never rewrite an existing one.
const SCHEMA_VERSION: i64 = 1;

/// Initialise the sessions table and run any pending migrations.
///
/// Safe to call on every startup — uses `IF NOT EXISTS` throughout.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS sessions (
            session_id          TEXT PRIMARY KEY,
            tool                TEXT NOT NULL,
            argv_json           TEXT NOT NULL,
            cwd                 TEXT NOT NULL,
            label               TEXT,
            pid                 INTEGER,
            status              TEXT NOT NULL,
            active_prompt_id    TEXT,
            channel_messages_json TEXT NOT NULL DEFAULT '{}',
            created_at          TEXT NOT NULL,
            updated_at          TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_sessions_status
            ON sessions(status, updated_at DESC);",
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
