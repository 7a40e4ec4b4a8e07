use anyhow::Result;
use rusqlite::Connection;
use serde_json::{json, Value};

use relaybridge_core::ids::SessionId;
use relaybridge_sessions::SessionManager;

use crate::output::{emit, ExitCode};

fn open_sessions(db_path: &str) -> Result<SessionManager> {
    let conn = Connection::open(db_path)?;
    Ok(SessionManager::new(conn)?)
}

fn session_json(session: &relaybridge_core::session::Session) -> Value {
    json!({
        "session_id": session.session_id.as_str(),
        "tool": session.tool,
        "argv": session.argv,
        "cwd": session.cwd,
        "label": session.label,
        "pid": session.pid,
        "status": session.status,
        "active_prompt_id": session.active_prompt_id.as_ref().map(|p| p.as_str().to_string()),
        "created_at": session.created_at.to_rfc3339(),
        "updated_at": session.updated_at.to_rfc3339(),
    })
}

pub fn list(db_path: &str, json_out: bool) -> ExitCode {
    let manager = match open_sessions(db_path) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::OperationFailed;
        }
    };
    match manager.list_active() {
        Ok(sessions) => {
            let rows: Vec<Value> = sessions.iter().map(session_json).collect();
            emit(&json!({ "sessions": rows }), json_out, |v| {
                for row in v["sessions"].as_array().into_iter().flatten() {
                    println!(
                        "{}  {}  {}  {}",
                        row["session_id"].as_str().unwrap_or("?"),
                        row["tool"].as_str().unwrap_or("?"),
                        row["status"].as_str().unwrap_or("?"),
                        row["cwd"].as_str().unwrap_or("?")
                    );
                }
            });
            ExitCode::Success
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::OperationFailed
        }
    }
}

pub fn show(db_path: &str, session_id: &str, json_out: bool) -> ExitCode {
    let manager = match open_sessions(db_path) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::OperationFailed;
        }
    };
    match manager.get(&SessionId::from(session_id)) {
        Ok(session) => {
            emit(&session_json(&session), json_out, |v| println!("{v:#}"));
            ExitCode::Success
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::OperationFailed
        }
    }
}

/// Walks the audit log for every row tagged with this session, in chain order.
pub fn trace(audit_db_path: &str, session_id: &str, json_out: bool) -> ExitCode {
    let conn = match Connection::open_with_flags(
        audit_db_path,
        rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
    ) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error opening audit db: {e}");
            return ExitCode::OperationFailed;
        }
    };

    let mut stmt = match conn.prepare(
        "SELECT event_id, event_type, payload_json, created_at FROM audit_events
         WHERE session_id = ?1 ORDER BY created_at ASC, rowid ASC",
    ) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::OperationFailed;
        }
    };

    let rows = stmt.query_map([session_id], |row| {
        Ok(json!({
            "event_id": row.get::<_, String>(0)?,
            "event_type": row.get::<_, String>(1)?,
            "payload": serde_json::from_str::<Value>(&row.get::<_, String>(2)?).unwrap_or(Value::Null),
            "created_at": row.get::<_, String>(3)?,
        }))
    });

    let rows = match rows {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::OperationFailed;
        }
    };

    let events: Vec<Value> = rows.filter_map(|r| r.ok()).collect();
    emit(&json!({ "events": events }), json_out, |v| {
        for event in v["events"].as_array().into_iter().flatten() {
            println!(
                "{}  {}  {}",
                event["created_at"].as_str().unwrap_or("?"),
                event["event_type"].as_str().unwrap_or("?"),
                event["payload"]
            );
        }
    });
    ExitCode::Success
}

pub fn pause(db_path: &str, session_id: &str) -> ExitCode {
    transition(db_path, session_id, relaybridge_core::session::SessionStatus::Paused)
}

pub fn resume(db_path: &str, session_id: &str) -> ExitCode {
    transition(db_path, session_id, relaybridge_core::session::SessionStatus::Running)
}

pub fn stop(db_path: &str, session_id: &str) -> ExitCode {
    transition(db_path, session_id, relaybridge_core::session::SessionStatus::Canceled)
}

fn transition(
    db_path: &str,
    session_id: &str,
    next: relaybridge_core::session::SessionStatus,
) -> ExitCode {
    let manager = match open_sessions(db_path) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::OperationFailed;
        }
    };
    let id = SessionId::from(session_id);
    let mut session = match manager.get(&id) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::OperationFailed;
        }
    };
    if let Err(e) = session.transition(next) {
        eprintln!("error: {e}");
        return ExitCode::OperationFailed;
    }
    match manager.save(&session) {
        Ok(()) => {
            println!("session {session_id} -> {next:?}");
            ExitCode::Success
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::OperationFailed
        }
    }
}
