use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection};
use sha2::{Digest, Sha256};
use tracing::instrument;

use relaybridge_core::ids::{AuditEventId, PromptId, SessionId};
use relaybridge_detect::redact;

use crate::canon::canonical_bytes;
use crate::error::Result;
use crate::event::{AgentSorKind, AuditAction, AuditEvent, HashableEvent};

/// Appends tamper-evident rows to the audit chain. Every write reads the
/// previous row's hash and folds it into the new row's hash, so altering any
/// historical row breaks every hash after it — see [`crate::verify`].
///
/// One connection behind one mutex: SQLite only allows a single writer, and
/// the chain itself requires writes be strictly ordered, so there is nothing
/// to gain from a pool here.
pub struct AuditWriter {
    db: Mutex<Connection>,
}

impl AuditWriter {
    pub fn new(conn: Connection) -> Result<Self> {
        crate::db::init_db(&conn)?;
        Ok(Self { db: Mutex::new(conn) })
    }

    #[instrument(skip(self, action), fields(event_type = action.kind()))]
    pub fn record(
        &self,
        session_id: Option<SessionId>,
        prompt_id: Option<PromptId>,
        action: AuditAction,
    ) -> Result<AuditEvent> {
        let db = self.db.lock().unwrap_or_else(|p| p.into_inner());
        let event_id = AuditEventId::new();
        let created_at = Utc::now();
        let prev_hash = crate::db::last_hash(&db)?;
        let event_type = action.kind();
        let payload = payload_value(&action)?;

        let hashable = HashableEvent {
            event_id: event_id.as_str(),
            session_id: session_id.as_ref().map(SessionId::as_str),
            prompt_id: prompt_id.as_ref().map(PromptId::as_str),
            event_type,
            payload: &payload,
            created_at: created_at.to_rfc3339(),
            prev_hash: prev_hash.as_deref(),
        };
        let hash = hex::encode(Sha256::digest(canonical_bytes(&hashable)?));

        db.execute(
            "INSERT INTO audit_events
                (event_id, session_id, prompt_id, event_type, payload_json, created_at, prev_hash, hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                event_id.as_str(),
                session_id.as_ref().map(SessionId::as_str),
                prompt_id.as_ref().map(PromptId::as_str),
                event_type,
                serde_json::to_string(&payload)?,
                created_at.to_rfc3339(),
                prev_hash,
                hash,
            ],
        )?;

        Ok(AuditEvent {
            event_id,
            session_id,
            prompt_id,
            action,
            created_at,
            prev_hash,
            hash,
        })
    }

    pub fn session_started(&self, session_id: SessionId, tool: &str, argv: Vec<String>, cwd: &str) -> Result<AuditEvent> {
        self.record(
            Some(session_id),
            None,
            AuditAction::SessionStarted {
                tool: tool.to_string(),
                argv,
                cwd: cwd.to_string(),
            },
        )
    }

    pub fn session_ended(&self, session_id: SessionId, reason: &str, exit_code: Option<i32>) -> Result<AuditEvent> {
        self.record(
            Some(session_id),
            None,
            AuditAction::SessionEnded {
                reason: reason.to_string(),
                exit_code,
            },
        )
    }

    pub fn prompt_detected(
        &self,
        session_id: SessionId,
        prompt_id: PromptId,
        prompt_type: &str,
        confidence: &str,
        excerpt: &str,
    ) -> Result<AuditEvent> {
        self.record(
            Some(session_id),
            Some(prompt_id),
            AuditAction::PromptDetected {
                prompt_type: prompt_type.to_string(),
                confidence: confidence.to_string(),
                excerpt: redact(excerpt),
            },
        )
    }

    pub fn prompt_routed(
        &self,
        session_id: SessionId,
        prompt_id: PromptId,
        channel: &str,
        policy_hash: &str,
        decision: &str,
    ) -> Result<AuditEvent> {
        self.record(
            Some(session_id),
            Some(prompt_id),
            AuditAction::PromptRouted {
                channel: channel.to_string(),
                policy_hash: policy_hash.to_string(),
                decision: decision.to_string(),
            },
        )
    }

    pub fn prompt_expired(&self, session_id: SessionId, prompt_id: PromptId, timeout_secs: u64) -> Result<AuditEvent> {
        self.record(Some(session_id), Some(prompt_id), AuditAction::PromptExpired { timeout_secs })
    }

    pub fn reply_received(&self, session_id: SessionId, prompt_id: PromptId, channel: &str, identity: &str) -> Result<AuditEvent> {
        self.record(
            Some(session_id),
            Some(prompt_id),
            AuditAction::ReplyReceived {
                channel: channel.to_string(),
                identity: identity.to_string(),
            },
        )
    }

    pub fn response_injected(&self, session_id: SessionId, prompt_id: PromptId, bytes_written: usize) -> Result<AuditEvent> {
        self.record(Some(session_id), Some(prompt_id), AuditAction::ResponseInjected { bytes_written })
    }

    pub fn duplicate_callback_ignored(&self, session_id: SessionId, prompt_id: PromptId, nonce: &str) -> Result<AuditEvent> {
        self.record(
            Some(session_id),
            Some(prompt_id),
            AuditAction::DuplicateCallbackIgnored { nonce: nonce.to_string() },
        )
    }

    pub fn late_reply_rejected(&self, prompt_id: PromptId) -> Result<AuditEvent> {
        self.record(
            None,
            Some(prompt_id.clone()),
            AuditAction::LateReplyRejected {
                prompt_id: prompt_id.as_str().to_string(),
            },
        )
    }

    pub fn invalid_callback(&self, reason: &str) -> Result<AuditEvent> {
        self.record(None, None, AuditAction::InvalidCallback { reason: redact(reason) })
    }

    pub fn channel_polling_failed(&self, channel: &str, error: &str) -> Result<AuditEvent> {
        self.record(
            None,
            None,
            AuditAction::ChannelPollingFailed {
                channel: channel.to_string(),
                error: redact(error),
            },
        )
    }

    pub fn channel_message_accepted(&self, channel: &str, identity: &str) -> Result<AuditEvent> {
        self.record(
            None,
            None,
            AuditAction::ChannelMessageAccepted {
                channel: channel.to_string(),
                identity: identity.to_string(),
            },
        )
    }

    pub fn channel_message_rejected(&self, channel: &str, identity: &str, reason: &str) -> Result<AuditEvent> {
        self.record(
            None,
            None,
            AuditAction::ChannelMessageRejected {
                channel: channel.to_string(),
                identity: identity.to_string(),
                reason: redact(reason),
            },
        )
    }

    pub fn daemon_restarted(&self, previous_pid: Option<u32>) -> Result<AuditEvent> {
        self.record(None, None, AuditAction::DaemonRestarted { previous_pid })
    }

    /// Recompute and check the whole chain against this writer's own store.
    pub fn verify(&self) -> Result<crate::verify::IntegrityReport> {
        let db = self.db.lock().unwrap_or_else(|p| p.into_inner());
        crate::verify::verify_audit_integrity(&db)
    }

    pub fn agent_sor_event(
        &self,
        session_id: SessionId,
        kind: AgentSorKind,
        detail: serde_json::Value,
    ) -> Result<AuditEvent> {
        self.record(Some(session_id), None, AuditAction::AgentSor { kind, detail })
    }
}

fn payload_value(action: &AuditAction) -> Result<serde_json::Value> {
    let mut value = serde_json::to_value(action)?;
    if let serde_json::Value::Object(map) = &mut value {
        map.remove("type");
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn writer() -> AuditWriter {
        AuditWriter::new(Connection::open_in_memory().unwrap()).unwrap()
    }

    #[test]
    fn first_event_has_no_prev_hash() {
        let w = writer();
        let event = w.session_started(SessionId::new(), "claude", vec!["claude".into()], "/tmp").unwrap();
        assert!(event.prev_hash.is_none());
        assert_eq!(event.hash.len(), 64);
    }

    #[test]
    fn second_event_chains_to_the_first() {
        let w = writer();
        let first = w.daemon_restarted(None).unwrap();
        let second = w.daemon_restarted(Some(42)).unwrap();
        assert_eq!(second.prev_hash.as_deref(), Some(first.hash.as_str()));
        assert_ne!(first.hash, second.hash);
    }

    #[test]
    fn untampered_chain_verifies() {
        let w = writer();
        w.daemon_restarted(None).unwrap();
        w.session_started(SessionId::new(), "claude", vec!["claude".into()], "/tmp").unwrap();
        let report = w.verify().unwrap();
        assert!(report.valid);
        assert_eq!(report.entries_checked, 2);
    }

    #[test]
    fn excerpt_is_redacted_before_storage() {
        let w = writer();
        let event = w
            .prompt_detected(SessionId::new(), PromptId::new(), "yes_no", "high", "use key sk-ant-REDACTED")
            .unwrap();
        match event.action {
            AuditAction::PromptDetected { excerpt, .. } => assert!(!excerpt.contains("sk-ant")),
            _ => panic!("wrong action"),
        }
    }
}
