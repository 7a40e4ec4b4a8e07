use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::instrument;

use crate::error::{AuditError, Result};

/// Per-workspace trust grants, keyed by canonical filesystem path so a
/// symlink can't be used to smuggle in an untrusted directory under a
/// trusted name.
pub struct WorkspaceTrustStore {
    db: Mutex<Connection>,
}

impl WorkspaceTrustStore {
    pub fn new(conn: Connection) -> Result<Self> {
        crate::db::init_db(&conn)?;
        Ok(Self { db: Mutex::new(conn) })
    }

    /// Grants trust for `path`, canonicalizing it first. `actor` identifies
    /// who granted it and must be non-empty — there is no such thing as an
    /// anonymous grant.
    #[instrument(skip(self, path))]
    pub fn grant(&self, path: impl AsRef<Path>, actor: &str, channel: Option<&str>, session_id: Option<&str>) -> Result<()> {
        if actor.trim().is_empty() {
            return Err(AuditError::AnonymousGrant);
        }
        let canonical = canonicalize(path.as_ref())?;
        let db = self.db.lock().unwrap_or_else(|p| p.into_inner());
        db.execute(
            "INSERT INTO workspace_trust (path, actor, channel, session_id, trusted, granted_at, revoked_at)
             VALUES (?1, ?2, ?3, ?4, 1, ?5, NULL)
             ON CONFLICT(path) DO UPDATE SET
                actor = excluded.actor,
                channel = excluded.channel,
                session_id = excluded.session_id,
                trusted = 1,
                granted_at = excluded.granted_at,
                revoked_at = NULL",
            params![canonical.to_string_lossy(), actor, channel, session_id, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    #[instrument(skip(self, path))]
    pub fn revoke(&self, path: impl AsRef<Path>) -> Result<()> {
        let canonical = canonicalize(path.as_ref())?;
        let db = self.db.lock().unwrap_or_else(|p| p.into_inner());
        db.execute(
            "UPDATE workspace_trust SET trusted = 0, revoked_at = ?1 WHERE path = ?2",
            params![Utc::now().to_rfc3339(), canonical.to_string_lossy()],
        )?;
        Ok(())
    }

    #[instrument(skip(self, path))]
    pub fn get_trust(&self, path: impl AsRef<Path>) -> Result<bool> {
        let canonical = canonicalize(path.as_ref())?;
        let db = self.db.lock().unwrap_or_else(|p| p.into_inner());
        let trusted: Option<bool> = db
            .query_row(
                "SELECT trusted FROM workspace_trust WHERE path = ?1",
                params![canonical.to_string_lossy()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(trusted.unwrap_or(false))
    }
}

fn canonicalize(path: &Path) -> Result<PathBuf> {
    std::fs::canonicalize(path).map_err(|source| AuditError::Io {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> WorkspaceTrustStore {
        WorkspaceTrustStore::new(Connection::open_in_memory().unwrap()).unwrap()
    }

    #[test]
    fn grant_requires_a_non_empty_actor() {
        let store = store();
        let dir = tempfile::tempdir().unwrap();
        let err = store.grant(dir.path(), "", None, None).unwrap_err();
        assert!(matches!(err, AuditError::AnonymousGrant));
    }

    #[test]
    fn grant_then_get_trust_roundtrips() {
        let store = store();
        let dir = tempfile::tempdir().unwrap();
        assert!(!store.get_trust(dir.path()).unwrap());
        store.grant(dir.path(), "alice", Some("telegram"), None).unwrap();
        assert!(store.get_trust(dir.path()).unwrap());
    }

    #[test]
    fn revoke_then_regrant_re_trusts() {
        let store = store();
        let dir = tempfile::tempdir().unwrap();
        store.grant(dir.path(), "alice", None, None).unwrap();
        store.revoke(dir.path()).unwrap();
        assert!(!store.get_trust(dir.path()).unwrap());
        store.grant(dir.path(), "bob", None, None).unwrap();
        assert!(store.get_trust(dir.path()).unwrap());
    }
}
