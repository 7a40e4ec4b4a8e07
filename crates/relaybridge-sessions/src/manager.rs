use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::instrument;

use relaybridge_core::ids::{PromptId, SessionId};
use relaybridge_core::session::{Session, SessionStatus};

use crate::error::{Result, SessionsError};

/// Persists `Session` rows and their status transitions.
///
/// Wraps a single SQLite connection in a `Mutex`; sqlite only allows one
/// writer at a time regardless, so a pool buys nothing here.
pub struct SessionManager {
    db: Mutex<Connection>,
}

impl SessionManager {
    /// Wrap an already-open connection, running schema setup if needed.
    pub fn new(conn: Connection) -> Result<Self> {
        crate::db::init_db(&conn)?;
        Ok(Self { db: Mutex::new(conn) })
    }

    #[instrument(skip(self, session), fields(session_id = %session.session_id))]
    pub fn create(&self, session: &Session) -> Result<()> {
        let db = self.db.lock().unwrap_or_else(|p| p.into_inner());
        db.execute(
            "INSERT INTO sessions
                (session_id, tool, argv_json, cwd, label, pid, status,
                 active_prompt_id, channel_messages_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                session.session_id.as_str(),
                session.tool,
                serde_json::to_string(&session.argv)?,
                session.cwd,
                session.label,
                session.pid,
                status_to_str(session.status),
                session.active_prompt_id.as_ref().map(PromptId::as_str),
                serde_json::to_string(&session.channel_message_ids)?,
                session.created_at.to_rfc3339(),
                session.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn get(&self, session_id: &SessionId) -> Result<Session> {
        let db = self.db.lock().unwrap_or_else(|p| p.into_inner());
        db.query_row(
            "SELECT session_id, tool, argv_json, cwd, label, pid, status,
                    active_prompt_id, channel_messages_json, created_at, updated_at
             FROM sessions WHERE session_id = ?1",
            params![session_id.as_str()],
            row_to_session,
        )
        .optional()?
        .ok_or_else(|| SessionsError::NotFound {
            session_id: session_id.as_str().to_string(),
        })
    }

    /// Sessions not yet in a terminal state, most recently touched first.
    #[instrument(skip(self))]
    pub fn list_active(&self) -> Result<Vec<Session>> {
        let db = self.db.lock().unwrap_or_else(|p| p.into_inner());
        let mut stmt = db.prepare(
            "SELECT session_id, tool, argv_json, cwd, label, pid, status,
                    active_prompt_id, channel_messages_json, created_at, updated_at
             FROM sessions
             WHERE status NOT IN ('completed', 'crashed', 'canceled')
             ORDER BY updated_at DESC",
        )?;
        let rows = stmt.query_map([], row_to_session)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Persist a status/pid/prompt-binding change already validated in memory
    /// by `Session::transition`/`bind_prompt`/`clear_active_prompt`.
    #[instrument(skip(self, session), fields(session_id = %session.session_id))]
    pub fn save(&self, session: &Session) -> Result<()> {
        let db = self.db.lock().unwrap_or_else(|p| p.into_inner());
        let changed = db.execute(
            "UPDATE sessions SET status = ?1, pid = ?2, active_prompt_id = ?3,
                channel_messages_json = ?4, updated_at = ?5
             WHERE session_id = ?6",
            params![
                status_to_str(session.status),
                session.pid,
                session.active_prompt_id.as_ref().map(PromptId::as_str),
                serde_json::to_string(&session.channel_message_ids)?,
                session.updated_at.to_rfc3339(),
                session.session_id.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(SessionsError::NotFound {
                session_id: session.session_id.as_str().to_string(),
            });
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub fn delete(&self, session_id: &SessionId) -> Result<()> {
        let db = self.db.lock().unwrap_or_else(|p| p.into_inner());
        let changed = db.execute(
            "DELETE FROM sessions WHERE session_id = ?1",
            params![session_id.as_str()],
        )?;
        if changed == 0 {
            return Err(SessionsError::NotFound {
                session_id: session_id.as_str().to_string(),
            });
        }
        Ok(())
    }
}

fn status_to_str(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Starting => "starting",
        SessionStatus::Running => "running",
        SessionStatus::AwaitingReply => "awaiting_reply",
        SessionStatus::Paused => "paused",
        SessionStatus::Completed => "completed",
        SessionStatus::Crashed => "crashed",
        SessionStatus::Canceled => "canceled",
    }
}

fn status_from_str(s: &str) -> SessionStatus {
    match s {
        "running" => SessionStatus::Running,
        "awaiting_reply" => SessionStatus::AwaitingReply,
        "paused" => SessionStatus::Paused,
        "completed" => SessionStatus::Completed,
        "crashed" => SessionStatus::Crashed,
        "canceled" => SessionStatus::Canceled,
        _ => SessionStatus::Starting,
    }
}

fn row_to_session(row: &Row<'_>) -> rusqlite::Result<Session> {
    let argv_json: String = row.get(2)?;
    let channel_messages_json: String = row.get(8)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;
    let active_prompt_id: Option<String> = row.get(7)?;

    Ok(Session {
        session_id: SessionId::from(row.get::<_, String>(0)?),
        tool: row.get(1)?,
        argv: serde_json::from_str(&argv_json).unwrap_or_default(),
        cwd: row.get(3)?,
        label: row.get(4)?,
        pid: row.get(5)?,
        status: status_from_str(&row.get::<_, String>(6)?),
        active_prompt_id: active_prompt_id.map(PromptId::from),
        channel_message_ids: serde_json::from_str(&channel_messages_json).unwrap_or_default(),
        created_at: parse_rfc3339(&created_at),
        updated_at: parse_rfc3339(&updated_at),
    })
}

fn parse_rfc3339(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
