use rusqlite::Connection;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::canon::canonical_bytes;
use crate::error::Result;
use crate::event::HashableEvent;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IntegrityReport {
    pub valid: bool,
    pub entries_checked: u64,
    pub first_broken_at: Option<String>,
    pub error: Option<String>,
}

impl IntegrityReport {
    fn ok(entries_checked: u64) -> Self {
        Self {
            valid: true,
            entries_checked,
            first_broken_at: None,
            error: None,
        }
    }

    fn broken(entries_checked: u64, event_id: String, error: String) -> Self {
        Self {
            valid: false,
            entries_checked,
            first_broken_at: Some(event_id),
            error: Some(error),
        }
    }
}

/// Walks every row in chain order, recomputing each hash from its stored
/// fields and checking it matches both the stored `hash` and the previous
/// row's `hash`. A single mismatch — from an edited payload, a spliced row,
/// or a truncated `prev_hash` — is enough to fail the whole chain.
pub fn verify_audit_integrity(conn: &Connection) -> Result<IntegrityReport> {
    let mut stmt = conn.prepare(
        "SELECT event_id, session_id, prompt_id, event_type, payload_json, created_at, prev_hash, hash
         FROM audit_events
         ORDER BY created_at ASC, rowid ASC",
    )?;

    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, Option<String>>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, String>(5)?,
            row.get::<_, Option<String>>(6)?,
            row.get::<_, String>(7)?,
        ))
    })?;

    let mut checked: u64 = 0;
    let mut expected_prev: Option<String> = None;

    for row in rows {
        let (event_id, session_id, prompt_id, event_type, payload_json, created_at, prev_hash, hash) = row?;
        checked += 1;

        if prev_hash != expected_prev {
            return Ok(IntegrityReport::broken(
                checked,
                event_id,
                "prev_hash does not match the preceding event's hash".to_string(),
            ));
        }

        let payload: serde_json::Value = serde_json::from_str(&payload_json)?;
        let hashable = HashableEvent {
            event_id: &event_id,
            session_id: session_id.as_deref(),
            prompt_id: prompt_id.as_deref(),
            event_type: &event_type,
            payload: &payload,
            created_at: created_at.clone(),
            prev_hash: prev_hash.as_deref(),
        };
        let recomputed = hex::encode(Sha256::digest(canonical_bytes(&hashable)?));

        if recomputed != hash {
            return Ok(IntegrityReport::broken(
                checked,
                event_id,
                "stored hash does not match recomputed hash".to_string(),
            ));
        }

        expected_prev = Some(hash);
    }

    Ok(IntegrityReport::ok(checked))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_chain_is_valid() {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_db(&conn).unwrap();
        let report = verify_audit_integrity(&conn).unwrap();
        assert!(report.valid);
        assert_eq!(report.entries_checked, 0);
    }

    #[test]
    fn tampered_payload_breaks_the_chain() {
        let raw = Connection::open_in_memory().unwrap();
        crate::db::init_db(&raw).unwrap();
        raw.execute(
            "INSERT INTO audit_events (event_id, session_id, prompt_id, event_type, payload_json, created_at, prev_hash, hash)
             VALUES ('e1', NULL, NULL, 'daemon_restarted', '{}', '2025-01-01T00:00:00Z', NULL, 'deadbeef')",
            [],
        )
        .unwrap();
        let report = verify_audit_integrity(&raw).unwrap();
        assert!(!report.valid);
        assert_eq!(report.first_broken_at.as_deref(), Some("e1"));
    }
}
