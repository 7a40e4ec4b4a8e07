use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use crate::error::Result;

const MAX_ARCHIVES: u8 = 3;

/// Moves every event older than `cutoff` out of the live database and into a
/// fresh sibling archive, rotating older archives down one slot first
/// (`.2` -> `.3`, `.1` -> `.2`) and dropping whatever was in `.3`.
pub fn archive_audit_events(conn: &Connection, db_path: &Path, cutoff: DateTime<Utc>) -> Result<usize> {
    rotate_archives(db_path)?;
    let archive_path = sibling_archive_path(db_path, 1);

    conn.execute("ATTACH DATABASE ?1 AS archive", params![archive_path.to_string_lossy()])?;
    let attached = attach_and_migrate(conn);
    if let Err(e) = attached {
        let _ = conn.execute_batch("DETACH DATABASE archive");
        return Err(e);
    }

    let cutoff_str = cutoff.to_rfc3339();
    let moved = conn.execute(
        "INSERT INTO archive.audit_events
            (event_id, session_id, prompt_id, event_type, payload_json, created_at, prev_hash, hash)
         SELECT event_id, session_id, prompt_id, event_type, payload_json, created_at, prev_hash, hash
         FROM audit_events WHERE created_at < ?1",
        params![cutoff_str],
    )?;
    conn.execute("DELETE FROM audit_events WHERE created_at < ?1", params![cutoff_str])?;
    conn.execute_batch("DETACH DATABASE archive")?;

    Ok(moved)
}

fn attach_and_migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS archive.audit_events (
            event_id TEXT PRIMARY KEY,
            session_id TEXT,
            prompt_id TEXT,
            event_type TEXT NOT NULL,
            payload_json TEXT NOT NULL,
            created_at TEXT NOT NULL,
            prev_hash TEXT,
            hash TEXT NOT NULL
         );",
    )?;
    Ok(())
}

fn rotate_archives(db_path: &Path) -> Result<()> {
    let oldest = sibling_archive_path(db_path, MAX_ARCHIVES);
    if oldest.exists() {
        std::fs::remove_file(&oldest).map_err(|source| crate::error::AuditError::Io {
            path: oldest.display().to_string(),
            source,
        })?;
    }
    for n in (1..MAX_ARCHIVES).rev() {
        let from = sibling_archive_path(db_path, n);
        let to = sibling_archive_path(db_path, n + 1);
        if from.exists() {
            std::fs::rename(&from, &to).map_err(|source| crate::error::AuditError::Io {
                path: from.display().to_string(),
                source,
            })?;
        }
    }
    Ok(())
}

fn sibling_archive_path(db_path: &Path, n: u8) -> PathBuf {
    let parent = db_path.parent().unwrap_or_else(|| Path::new("."));
    parent.join(format!("audit_archive.{n}.db"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::AuditWriter;
    use chrono::Duration;
    use relaybridge_core::ids::SessionId;
    use tempfile::tempdir;

    #[test]
    fn archives_only_events_older_than_cutoff() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("audit.db");
        let conn = Connection::open(&db_path).unwrap();
        let writer = AuditWriter::new(conn).unwrap();
        writer.session_started(SessionId::new(), "claude", vec!["claude".into()], "/tmp").unwrap();

        let conn2 = Connection::open(&db_path).unwrap();
        let moved = archive_audit_events(&conn2, &db_path, Utc::now() + Duration::days(1)).unwrap();
        assert_eq!(moved, 1);
        assert!(sibling_archive_path(&db_path, 1).exists());

        let remaining: i64 = conn2.query_row("SELECT COUNT(*) FROM audit_events", [], |r| r.get(0)).unwrap();
        assert_eq!(remaining, 0);
    }

    #[test]
    fn rotation_shifts_existing_archives() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("audit.db");
        std::fs::write(sibling_archive_path(&db_path, 1), b"old-1").unwrap();
        std::fs::write(sibling_archive_path(&db_path, 2), b"old-2").unwrap();

        rotate_archives(&db_path).unwrap();

        assert!(!sibling_archive_path(&db_path, 1).exists());
        assert_eq!(std::fs::read(sibling_archive_path(&db_path, 2)).unwrap(), b"old-1");
        assert_eq!(std::fs::read(sibling_archive_path(&db_path, 3)).unwrap(), b"old-2");
    }
}
